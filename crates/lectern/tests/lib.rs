use std::{
  error::Error,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
  time::Duration,
};

use async_trait::async_trait;
use lectern::{
  cache::{CacheState, RecommendationCache},
  client::{CandidateSources, CitationGraph, PaperIndex},
  configuration::Config,
  database::Database,
  error::{LecternError, Result},
  library::LibrarySource,
  oracle::{
    stub::{StubOracle, StubReply},
    Assessment, RelevanceOracle,
  },
  paper::{CandidatePaper, LibraryPaper, SourceKind},
  pipeline::{Pipeline, PipelineSettings},
  scorer::{LibraryDigest, RelevanceScorer, ScoringSettings},
};
use tempfile::{tempdir, TempDir};
use tokio::time::Instant;
use tracing_test::traced_test;

mod network;
mod scenarios;

pub type TestResult<T> = std::result::Result<T, Box<dyn Error>>;

/// Flips every stub service between working and down.
#[derive(Clone, Default)]
pub struct Outage(Arc<AtomicBool>);

impl Outage {
  pub fn start(&self) { self.0.store(true, Ordering::SeqCst) }

  pub fn end(&self) { self.0.store(false, Ordering::SeqCst) }

  fn check(&self) -> Result<()> {
    if self.0.load(Ordering::SeqCst) {
      Err(LecternError::HttpStatus(503))
    } else {
      Ok(())
    }
  }
}

/// Paper index returning a fixed list unless an outage is on.
pub struct StubIndex {
  pub papers: Vec<CandidatePaper>,
  pub outage: Outage,
}

#[async_trait]
impl PaperIndex for StubIndex {
  async fn fetch_new(&self, _: &[String], limit: usize) -> Result<Vec<CandidatePaper>> {
    self.outage.check()?;
    Ok(self.papers.iter().take(limit).cloned().collect())
  }
}

/// Citation graph returning a fixed list unless an outage is on.
pub struct StubGraph {
  pub papers: Vec<CandidatePaper>,
  pub outage: Outage,
}

#[async_trait]
impl CitationGraph for StubGraph {
  async fn fetch_related(
    &self,
    anchors: &[LibraryPaper],
    limit: usize,
    _: Instant,
  ) -> Result<Vec<CandidatePaper>> {
    self.outage.check()?;
    if anchors.is_empty() {
      return Ok(Vec::new());
    }
    Ok(self.papers.iter().take(limit).cloned().collect())
  }
}

/// Oracle that fails during an outage and otherwise defers to a stub.
pub struct OutageOracle {
  pub inner:  StubOracle,
  pub outage: Outage,
}

#[async_trait]
impl RelevanceOracle for OutageOracle {
  async fn assess(&self, candidate: &CandidatePaper, digest: &LibraryDigest) -> Result<Assessment> {
    self.outage.check()?;
    self.inner.assess(candidate, digest).await
  }
}

pub fn attention() -> LibraryPaper {
  LibraryPaper::new("Attention Is All You Need", vec!["Vaswani".into(), "Shazeer".into()])
    .with_arxiv_id("1706.03762")
}

pub fn new_candidate(title: &str, arxiv_id: &str, author: &str) -> CandidatePaper {
  CandidatePaper::new(title, vec![author.to_string()], SourceKind::New)
    .with_arxiv_id(arxiv_id)
    .with_abstract(format!("An abstract about {title}."))
}

pub fn related_candidate(title: &str, citations: u64) -> CandidatePaper {
  CandidatePaper::new(title, vec!["Jared Kaplan".into()], SourceKind::Related)
    .with_citation_count(citations)
    .with_anchor("Attention Is All You Need")
}

/// A pipeline over stub services sharing one outage switch.
pub fn stub_pipeline(
  library: Vec<LibraryPaper>,
  new: Vec<CandidatePaper>,
  related: Vec<CandidatePaper>,
  oracle: StubOracle,
  outage: &Outage,
) -> Pipeline {
  Pipeline::new(
    Arc::new(library),
    CandidateSources::new(
      Arc::new(StubIndex { papers: new, outage: outage.clone() }),
      Arc::new(StubGraph { papers: related, outage: outage.clone() }),
    ),
    RelevanceScorer::new(
      Arc::new(OutageOracle { inner: oracle, outage: outage.clone() }),
      ScoringSettings::default(),
    ),
    PipelineSettings::default(),
  )
}

/// A database in a fresh temporary directory.
pub async fn setup_test_db() -> (Database, TempDir) {
  let dir = tempdir().unwrap();
  let db = Database::open(dir.path().join("lectern.db")).await.unwrap();
  (db, dir)
}
