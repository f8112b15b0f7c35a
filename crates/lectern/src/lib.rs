//! Paper recommendations grounded in a personal research library.
//!
//! `lectern` looks at the papers you already keep and produces two ranked lists:
//!
//! - **New papers**: recent submissions to the arXiv topics you follow
//! - **Related papers**: papers the Semantic Scholar graph connects to ones you own
//!
//! Every recommendation comes with a relevance score in `[0, 10]`, a short justification, the
//! authors you already read, and (for related papers) a citation count.
//!
//! # Features
//!
//! - **Fault tolerant fan-out**: both candidate sources run concurrently and retry with bounded
//!   exponential backoff; a source that stays down only removes its own candidates
//! - **Deduplication**: candidates already in the library, or already surfaced by a fresh
//!   batch, are never scored twice
//! - **Lenient scoring**: the text-generation oracle is parsed leniently and clamped; anything
//!   unusable falls back to a neutral score instead of dropping the paper
//! - **Stale-while-revalidate cache**: reads return immediately, regenerations are single-flight
//!   and detached from the caller that started them
//!
//! # Getting Started
//!
//! ```no_run
//! use lectern::{cache::RecommendationCache, configuration::Config, pipeline::Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!   let config = Config::load(Config::default_path())?;
//!   let pipeline = Pipeline::from_config(&config).await?;
//!   let cache = RecommendationCache::new(pipeline, config.freshness());
//!
//!   let recommendations = cache.get_recommendations(false).await?;
//!   for paper in &recommendations.batch.new_papers {
//!     println!("{:>4.1}  {}", paper.relevance_score, paper.candidate.title);
//!   }
//!   Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`paper`]: Library, candidate and scored paper types plus identity rules
//! - [`database`]: SQLite-backed library store
//! - [`library`]: The snapshot capability the pipeline reads the library through
//! - [`client`]: arXiv and Semantic Scholar candidate sources
//! - [`dedupe`]: Pure candidate deduplication
//! - [`oracle`]: Text-generation scoring capability and its reply parser
//! - [`scorer`]: Concurrent, deadline-bounded scoring of candidates
//! - [`affinity`]: Author cross-referencing against the library
//! - [`pipeline`]: A single regeneration run
//! - [`cache`]: Freshness, single-flight refresh and the public read API
//! - [`configuration`]: TOML configuration

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::{
  collections::{BTreeMap, HashMap, HashSet},
  fmt::Display,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};
#[cfg(test)]
use {tempfile::tempdir, tracing_test::traced_test};

pub mod affinity;
pub mod cache;
pub mod client;
pub mod configuration;
pub mod database;
pub mod dedupe;
pub mod error;
pub mod library;
pub mod oracle;
pub mod paper;
pub mod pipeline;
pub mod scorer;

use crate::{
  affinity::*, client::*, configuration::*, dedupe::*, error::*, library::*, oracle::*, paper::*,
  scorer::*,
};

/// Common traits and types for ergonomic imports.
///
/// ```no_run
/// use lectern::prelude::*;
///
/// async fn first_title(cache: &RecommendationCache) -> Result<Option<String>, LecternError> {
///   let recommendations = cache.get_recommendations(false).await?;
///   Ok(recommendations.batch.new_papers.first().map(|p| p.candidate.title.clone()))
/// }
/// ```
pub mod prelude {
  pub use crate::{
    cache::{CacheState, RecommendationCache, Recommendations},
    client::{CitationGraph, PaperIndex},
    error::LecternError,
    library::LibrarySource,
    oracle::RelevanceOracle,
    paper::{CandidatePaper, LibraryPaper, RecommendationBatch, ScoredPaper, SourceKind},
    pipeline::Regenerator,
  };
}
