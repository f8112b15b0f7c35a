//! Candidate source clients.
//!
//! Two independent sources feed the pipeline:
//!
//! - a [`PaperIndex`] listing recent submissions in the followed topics ([`ArxivClient`])
//! - a [`CitationGraph`] finding papers connected to library papers ([`SemanticScholarClient`])
//!
//! Both clients retry individual requests according to a [`RetryPolicy`]. Whatever still fails
//! after that reaches [`CandidateSources`], which turns it into an empty candidate list plus a
//! failure flag so the rest of the run can go on with partial data.

use reqwest::{RequestBuilder, Response};
use tokio::time::Instant;

use super::*;

pub mod arxiv;
pub mod retry;
pub mod semantic_scholar;

pub use self::{arxiv::ArxivClient, retry::RetryPolicy, semantic_scholar::SemanticScholarClient};

/// Lists recent papers in a set of topics.
#[async_trait]
pub trait PaperIndex: Send + Sync {
  /// Returns up to `limit` recent submissions in any of `topics`, newest first.
  async fn fetch_new(&self, topics: &[String], limit: usize) -> Result<Vec<CandidatePaper>>;
}

/// Finds papers connected to a set of anchor papers.
#[async_trait]
pub trait CitationGraph: Send + Sync {
  /// Returns up to `limit` papers related to `anchors`. No anchors means no results.
  ///
  /// Work still pending at `deadline` is abandoned; whatever completed before it is returned.
  async fn fetch_related(
    &self,
    anchors: &[LibraryPaper],
    limit: usize,
    deadline: Instant,
  ) -> Result<Vec<CandidatePaper>>;
}

#[async_trait]
impl<T: PaperIndex + ?Sized> PaperIndex for Arc<T> {
  async fn fetch_new(&self, topics: &[String], limit: usize) -> Result<Vec<CandidatePaper>> {
    (**self).fetch_new(topics, limit).await
  }
}

#[async_trait]
impl<T: CitationGraph + ?Sized> CitationGraph for Arc<T> {
  async fn fetch_related(
    &self,
    anchors: &[LibraryPaper],
    limit: usize,
    deadline: Instant,
  ) -> Result<Vec<CandidatePaper>> {
    (**self).fetch_related(anchors, limit, deadline).await
  }
}

/// What one source contributed to a regeneration run.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFetch {
  /// Which source this is
  pub kind:       SourceKind,
  /// Well-formed candidates, tagged with `kind`
  pub candidates: Vec<CandidatePaper>,
  /// Whether the source failed; `candidates` is then empty
  pub failed:     bool,
  /// Whether the source was asked at all
  pub attempted:  bool,
}

impl SourceFetch {
  /// A successful fetch.
  fn succeeded(kind: SourceKind, candidates: Vec<CandidatePaper>) -> Self {
    Self { kind, candidates, failed: false, attempted: true }
  }

  /// A failed fetch.
  fn failed(kind: SourceKind) -> Self {
    Self { kind, candidates: Vec::new(), failed: true, attempted: true }
  }

  /// A source with nothing to do.
  fn skipped(kind: SourceKind) -> Self {
    Self { kind, candidates: Vec::new(), failed: false, attempted: false }
  }
}

/// Both candidate sources behind a failure-absorbing front.
#[derive(Clone)]
pub struct CandidateSources {
  /// Recent submissions
  index: Arc<dyn PaperIndex>,
  /// Citation graph
  graph: Arc<dyn CitationGraph>,
}

impl CandidateSources {
  /// Wraps the two sources.
  pub fn new(index: Arc<dyn PaperIndex>, graph: Arc<dyn CitationGraph>) -> Self {
    Self { index, graph }
  }

  /// Fetches new papers, giving up at `deadline`.
  pub async fn fetch_new(&self, topics: &[String], limit: usize, deadline: Instant) -> SourceFetch {
    if topics.is_empty() {
      debug!("No topics configured, skipping new papers");
      return SourceFetch::skipped(SourceKind::New);
    }
    let result = tokio::time::timeout_at(deadline, self.index.fetch_new(topics, limit)).await;
    absorb(SourceKind::New, result, limit)
  }

  /// Fetches papers related to `anchors`, keeping whatever the graph finished by `deadline`.
  pub async fn fetch_related(
    &self,
    anchors: &[LibraryPaper],
    limit: usize,
    deadline: Instant,
  ) -> SourceFetch {
    if anchors.is_empty() {
      debug!("No anchor papers, skipping related papers");
      return SourceFetch::skipped(SourceKind::Related);
    }
    let result =
      tokio::time::timeout_at(deadline, self.graph.fetch_related(anchors, limit, deadline)).await;
    absorb(SourceKind::Related, result, limit)
  }
}

/// Turns a source result into a [`SourceFetch`], dropping malformed candidates.
fn absorb(
  kind: SourceKind,
  result: std::result::Result<Result<Vec<CandidatePaper>>, tokio::time::error::Elapsed>,
  limit: usize,
) -> SourceFetch {
  match result {
    Ok(Ok(candidates)) => {
      let total = candidates.len();
      let mut candidates: Vec<_> = candidates
        .into_iter()
        .filter(CandidatePaper::is_well_formed)
        .map(|mut candidate| {
          candidate.source = kind;
          candidate
        })
        .collect();
      if candidates.len() < total {
        debug!("Discarded {} malformed {kind} candidates", total - candidates.len());
      }
      candidates.truncate(limit);
      info!("Fetched {} {kind} candidates", candidates.len());
      SourceFetch::succeeded(kind, candidates)
    },
    Ok(Err(e)) => {
      warn!("Source for {kind} papers unavailable: {e}");
      SourceFetch::failed(kind)
    },
    Err(_) => {
      warn!("Source for {kind} papers did not finish before the regeneration deadline");
      SourceFetch::failed(kind)
    },
  }
}

/// Builds the HTTP client shared by the source clients.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
  Ok(
    reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!("lectern/", env!("CARGO_PKG_VERSION")))
      .build()?,
  )
}

/// Sends a request and turns non-success statuses into [`LecternError::HttpStatus`].
pub(crate) async fn send_checked(request: RequestBuilder) -> Result<Response> {
  let response = request.send().await?;
  let status = response.status();
  if !status.is_success() {
    return Err(LecternError::HttpStatus(status.as_u16()));
  }
  Ok(response)
}
