//! One regeneration run, from library snapshot to finished batch.
//!
//! 1. Read a library snapshot. Failure here aborts the run.
//! 2. Pick anchor papers and fetch new and related candidates concurrently.
//! 3. Drop candidates already in the library or repeated across sources, new papers first.
//! 4. Papers the still-fresh previous batch already ranked keep their old judgment; the rest
//!    are scored.
//! 5. Annotate author affinity and code links, split by source, sort and truncate.
//!
//! The whole run is bounded by [`PipelineSettings::deadline`]. The citation graph keeps the
//! anchors it finished before the deadline; a source with nothing finished counts as failed.
//! Candidates still being scored at the deadline are left out.
//!
//! A run is a total failure, and returns [`LecternError::RegenerationFailed`] instead of a batch,
//! only when every source it asked failed. An unreachable oracle alone never fails a run; its
//! candidates get the neutral fallback score.

use tokio::time::Instant;

use super::*;

/// Produces recommendation batches. The cache drives one of these.
#[async_trait]
pub trait Regenerator: Send + Sync + 'static {
  /// Builds a new batch. `previous` is only passed while it is still fresh.
  async fn regenerate(
    &self,
    previous: Option<Arc<RecommendationBatch>>,
  ) -> Result<RecommendationBatch>;
}

/// Sizes and limits for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
  /// arXiv categories followed
  pub topics:         Vec<String>,
  /// Candidates requested from the paper index
  pub new_limit:      usize,
  /// Candidates requested from the citation graph
  pub related_limit:  usize,
  /// Anchors handed to the citation graph
  pub max_anchors:    usize,
  /// Length of each ranked list
  pub max_results:    usize,
  /// Library papers in the digest
  pub digest_size:    usize,
  /// Abstract length in the digest and prompts
  pub abstract_chars: usize,
  /// Outer bound on a whole run
  pub deadline:       Duration,
}

impl Default for PipelineSettings {
  fn default() -> Self { Self::from(&Config::default()) }
}

impl From<&Config> for PipelineSettings {
  fn from(config: &Config) -> Self {
    Self {
      topics:         config.topics.clone(),
      new_limit:      config.new_limit,
      related_limit:  config.related_limit,
      max_anchors:    config.max_anchors,
      max_results:    config.max_results,
      digest_size:    config.digest_size,
      abstract_chars: config.abstract_chars,
      deadline:       Duration::from_secs(config.regeneration_deadline_secs),
    }
  }
}

/// The full recommendation pipeline.
#[derive(Clone)]
pub struct Pipeline {
  /// Where the library comes from
  library:  Arc<dyn LibrarySource>,
  /// Candidate sources
  sources:  CandidateSources,
  /// Oracle-backed scorer
  scorer:   RelevanceScorer,
  /// Limits
  settings: PipelineSettings,
}

impl Pipeline {
  /// Assembles a pipeline from its parts.
  pub fn new(
    library: Arc<dyn LibrarySource>,
    sources: CandidateSources,
    scorer: RelevanceScorer,
    settings: PipelineSettings,
  ) -> Self {
    Self { library, sources, scorer, settings }
  }

  /// Opens the library database and builds the network clients described by `config`.
  pub async fn from_config(config: &Config) -> Result<Self> {
    let library = database::Database::open(&config.database_path).await?;
    let index = ArxivClient::from_config(config)?;
    let graph = SemanticScholarClient::from_config(config)?;
    let oracle = LlmOracle::from_config(config);
    Ok(Self::new(
      Arc::new(library),
      CandidateSources::new(Arc::new(index), Arc::new(graph)),
      RelevanceScorer::new(Arc::new(oracle), config.scoring()),
      PipelineSettings::from(config),
    ))
  }

  /// The settings in use.
  pub fn settings(&self) -> &PipelineSettings { &self.settings }

  /// Runs the pipeline once.
  pub async fn run(&self, previous: Option<&RecommendationBatch>) -> Result<RecommendationBatch> {
    let started = Instant::now();
    let deadline = started + self.settings.deadline;
    info!("Regenerating recommendations");

    let library = self.library.get_library_snapshot().await.map_err(|e| match e {
      LecternError::LibraryUnavailable(_) => e,
      other => LecternError::LibraryUnavailable(other.to_string()),
    })?;
    let anchors = select_anchors(&library, self.settings.max_anchors);
    debug!("Library has {} papers, {} used as anchors", library.len(), anchors.len());

    let (new, related) = tokio::join!(
      self.sources.fetch_new(&self.settings.topics, self.settings.new_limit, deadline),
      self.sources.fetch_related(&anchors, self.settings.related_limit, deadline),
    );
    let degraded_sources: Vec<SourceKind> =
      [&new, &related].into_iter().filter(|fetch| fetch.failed).map(|fetch| fetch.kind).collect();
    let asked = [&new, &related].into_iter().filter(|fetch| fetch.attempted).count();
    if asked > 0 && degraded_sources.len() == asked {
      warn!("Regeneration failed: sources {degraded_sources:?} unavailable");
      return Err(LecternError::RegenerationFailed(format!(
        "candidate sources unavailable ({})",
        degraded_sources.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
      )));
    }

    let merged: Vec<_> = new.candidates.into_iter().chain(related.candidates).collect();
    let unseen = dedupe(merged, &library, None);
    let carried = carry_over(&unseen, &library, previous);
    let to_score = dedupe(unseen, &library, previous);
    if !carried.is_empty() {
      debug!("Carrying over {} papers from the previous batch", carried.len());
    }

    let digest =
      LibraryDigest::build(&library, self.settings.digest_size, self.settings.abstract_chars);
    let scored = self.scorer.score_until(to_score, &digest, Some(deadline)).await;
    let fallbacks = scored.iter().filter(|paper| paper.fallback).count();
    if fallbacks > 0 {
      debug!("{fallbacks} of {} papers got the fallback score", scored.len());
    }

    let authors = AuthorIndex::build(&library);
    let mut new_papers = Vec::new();
    let mut related_papers = Vec::new();
    for mut paper in scored.into_iter().chain(carried) {
      paper.author_affinity = match_authors(&paper.candidate, &authors);
      paper.code_url = extract_code_url(paper.candidate.abstract_text.as_deref());
      match paper.candidate.source {
        SourceKind::New => new_papers.push(paper),
        SourceKind::Related => related_papers.push(paper),
      }
    }
    rank(&mut new_papers, self.settings.max_results);
    rank(&mut related_papers, self.settings.max_results);

    let batch = RecommendationBatch {
      new_papers,
      related_papers,
      generated_at: Utc::now(),
      degraded_sources,
    };
    info!(
      "Regenerated {} new and {} related recommendations in {}ms",
      batch.new_papers.len(),
      batch.related_papers.len(),
      started.elapsed().as_millis()
    );
    Ok(batch)
  }
}

#[async_trait]
impl Regenerator for Pipeline {
  async fn regenerate(
    &self,
    previous: Option<Arc<RecommendationBatch>>,
  ) -> Result<RecommendationBatch> {
    self.run(previous.as_deref()).await
  }
}

/// Previous judgments for candidates the previous batch already contained, one per paper.
///
/// A previous judgment for a paper the library now holds is dropped.
fn carry_over(
  candidates: &[CandidatePaper],
  library: &[LibraryPaper],
  previous: Option<&RecommendationBatch>,
) -> Vec<ScoredPaper> {
  let Some(previous) = previous else {
    return Vec::new();
  };
  let mut seen: IdentitySet = library.iter().map(LibraryPaper::identity).collect();
  let mut carried = Vec::new();
  for candidate in candidates {
    if let Some(scored) = previous.find(candidate) {
      let identity = scored.identity();
      if !seen.contains(&identity) {
        seen.insert(identity);
        carried.push(scored.clone());
      }
    }
  }
  carried
}

/// Sorts most relevant first, keeping input order among equal scores, and truncates.
fn rank(papers: &mut Vec<ScoredPaper>, max: usize) {
  papers.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
  papers.truncate(max);
}
