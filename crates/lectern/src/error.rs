//! Error types for the lectern library.
//!
//! Most failures inside a regeneration run are absorbed where they happen: a candidate source
//! that keeps failing yields an empty list, an oracle that cannot be parsed yields the neutral
//! score. The variants here are what remains visible to callers, plus the detailed causes that
//! get logged on the way.
//!
//! # Examples
//!
//! ```no_run
//! use lectern::{cache::RecommendationCache, error::LecternError};
//!
//! # async fn example(cache: RecommendationCache) -> Result<(), LecternError> {
//! match cache.get_recommendations(false).await {
//!   Ok(recommendations) => println!("{} new papers", recommendations.batch.new_papers.len()),
//!   Err(LecternError::Refresh(cause)) => println!("First run failed: {cause}"),
//!   Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use thiserror::Error;

/// Error type alias used for the [`lectern`](crate) crate.
pub type Result<T> = core::result::Result<T, LecternError>;

/// Errors that can occur while producing recommendations.
#[derive(Error, Debug)]
pub enum LecternError {
  /// A network request failed before a response arrived.
  ///
  /// Connection resets, DNS failures and client-side timeouts all land here and are
  /// retried by the candidate source clients.
  #[error(transparent)]
  Network(#[from] reqwest::Error),

  /// A remote service answered with a non-success status code.
  ///
  /// `429` and `5xx` are considered transient, everything else is not.
  #[error("Remote service answered with HTTP {0}")]
  HttpStatus(u16),

  /// A remote service answered, but with content we could not make sense of.
  #[error("API error: {0}")]
  ApiError(String),

  /// An operation did not finish within its allotted time.
  #[error("Timed out: {0}")]
  Timeout(String),

  /// The scoring oracle replied with text that does not contain a usable score.
  #[error("Could not parse a relevance score from: {0:?}")]
  UnparseableScore(String),

  /// A model was not specified for the LLM request.
  #[error("No model was chosen for the LLM.")]
  LLMMissingModel,

  /// No messages were provided in the LLM request.
  #[error("No messages were supplied to send to the LLM.")]
  LLMMissingMessage,

  /// The library snapshot could not be read.
  ///
  /// This aborts the regeneration attempt that hit it; the cache keeps its previous batch.
  #[error("Library snapshot unavailable: {0}")]
  LibraryUnavailable(String),

  /// Every candidate source and every scoring call failed during a regeneration.
  #[error("Regeneration failed: {0}")]
  RegenerationFailed(String),

  /// A shared regeneration failed.
  ///
  /// Regenerations are single-flight, so the same failure is handed to every caller that
  /// awaited it; hence the shared pointer.
  #[error(transparent)]
  Refresh(Arc<LecternError>),

  /// A SQLite operation failed.
  #[error(transparent)]
  Sqlite(#[from] rusqlite::Error),

  /// An async SQLite operation failed.
  #[error(transparent)]
  AsyncSqlite(#[from] tokio_rusqlite::Error),

  /// A file system operation failed.
  #[error(transparent)]
  Path(#[from] std::io::Error),

  /// A JSON document could not be decoded.
  #[error(transparent)]
  Json(#[from] serde_json::Error),

  /// The configuration file could not be parsed.
  #[error(transparent)]
  TomlDe(#[from] toml::de::Error),

  /// The configuration could not be serialized.
  #[error(transparent)]
  TomlSer(#[from] toml::ser::Error),

  /// Invalid or missing configuration.
  #[error("{0}")]
  Config(String),
}

impl LecternError {
  /// Whether retrying the operation that produced this error might succeed.
  pub fn is_transient(&self) -> bool {
    match self {
      Self::Network(e) => !e.is_builder() && !e.is_decode(),
      Self::HttpStatus(code) => *code == 429 || (500..600).contains(code),
      Self::Timeout(_) => true,
      _ => false,
    }
  }
}
