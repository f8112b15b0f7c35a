//! Relevance scoring of deduplicated candidates.
//!
//! One oracle call per candidate, at most [`ScoringSettings::concurrency`] in flight, each bounded
//! by [`ScoringSettings::call_timeout`]. A call that fails, times out or replies with something
//! unreadable gives its candidate the neutral score instead of dropping it. Scores are clamped
//! into `[0, 10]`.
//!
//! The whole batch can additionally be bounded by a deadline; candidates whose call has not
//! finished by then are left out.

use futures::{stream, StreamExt};
use tokio::time::Instant;

use super::*;

/// Score given when the oracle could not be used.
pub const NEUTRAL_SCORE: f64 = 5.0;

/// Explanation attached to the neutral score.
pub const FALLBACK_EXPLANATION: &str =
  "Relevance scoring was unavailable for this paper, so it was given a neutral score.";

/// One library paper as the oracle sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestEntry {
  /// Title
  pub title:   String,
  /// Truncated abstract
  pub snippet: Option<String>,
}

/// Bounded summary of the library handed to the oracle with every candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryDigest {
  /// Most recently added papers first
  entries:        Vec<DigestEntry>,
  /// Abstracts are cut to this many characters
  abstract_chars: usize,
}

impl Default for LibraryDigest {
  fn default() -> Self { Self { entries: Vec::new(), abstract_chars: 500 } }
}

impl LibraryDigest {
  /// Summarizes the `size` most recently added papers.
  pub fn build(library: &[LibraryPaper], size: usize, abstract_chars: usize) -> Self {
    let mut recent: Vec<_> = library.iter().collect();
    recent.sort_by(|a, b| b.added_at.cmp(&a.added_at));
    let entries = recent
      .into_iter()
      .take(size)
      .map(|paper| DigestEntry {
        title:   paper.title.clone(),
        snippet: paper
          .abstract_text
          .as_deref()
          .map(|text| truncate_chars(text, abstract_chars))
          .filter(|s| !s.is_empty()),
      })
      .collect();
    Self { entries, abstract_chars }
  }

  /// The summarized papers.
  pub fn entries(&self) -> &[DigestEntry] { &self.entries }

  /// Number of summarized papers.
  pub fn len(&self) -> usize { self.entries.len() }

  /// Whether the library was empty.
  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  /// Cuts a candidate abstract to the same length as library abstracts.
  pub fn truncate_abstract(&self, text: &str) -> String { truncate_chars(text, self.abstract_chars) }

  /// Renders the digest as a bulleted list.
  pub fn render(&self) -> String {
    let mut out = String::new();
    for entry in &self.entries {
      out.push_str("- ");
      out.push_str(&entry.title);
      out.push('\n');
      if let Some(snippet) = &entry.snippet {
        out.push_str("  ");
        out.push_str(snippet);
        out.push('\n');
      }
    }
    out
  }
}

/// Cuts `text` to at most `max` characters, marking the cut.
fn truncate_chars(text: &str, max: usize) -> String {
  let text = text.trim();
  match text.char_indices().nth(max) {
    Some((end, _)) => format!("{}...", text[..end].trim_end()),
    None => text.to_string(),
  }
}

/// Knobs for [`RelevanceScorer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringSettings {
  /// Oracle calls allowed in flight at once
  pub concurrency:  usize,
  /// Timeout for a single oracle call
  pub call_timeout: Duration,
}

impl Default for ScoringSettings {
  fn default() -> Self {
    Self { concurrency: 4, call_timeout: Duration::from_secs(60) }
  }
}

/// Scores candidates through a [`RelevanceOracle`].
#[derive(Clone)]
pub struct RelevanceScorer {
  /// The oracle
  oracle:   Arc<dyn RelevanceOracle>,
  /// Limits
  settings: ScoringSettings,
}

impl RelevanceScorer {
  /// Creates a scorer.
  pub fn new(oracle: Arc<dyn RelevanceOracle>, settings: ScoringSettings) -> Self {
    Self { oracle, settings }
  }

  /// The settings in use.
  pub fn settings(&self) -> &ScoringSettings { &self.settings }

  /// Scores every candidate, in input order.
  pub async fn score(
    &self,
    candidates: Vec<CandidatePaper>,
    digest: &LibraryDigest,
  ) -> Vec<ScoredPaper> {
    self.score_until(candidates, digest, None).await
  }

  /// Scores candidates until `deadline`, in input order.
  ///
  /// Candidates still waiting for the oracle at the deadline are left out.
  pub async fn score_until(
    &self,
    candidates: Vec<CandidatePaper>,
    digest: &LibraryDigest,
    deadline: Option<Instant>,
  ) -> Vec<ScoredPaper> {
    let total = candidates.len();
    let scoring = stream::iter(candidates.into_iter().enumerate())
      .map(|(index, candidate)| async move { (index, self.score_one(candidate, digest).await) })
      .buffer_unordered(self.settings.concurrency.max(1));

    let mut scored: Vec<(usize, ScoredPaper)> = match deadline {
      Some(deadline) => scoring.take_until(tokio::time::sleep_until(deadline)).collect().await,
      None => scoring.collect().await,
    };
    if scored.len() < total {
      warn!("Deadline reached with {} of {total} candidates scored", scored.len());
    }

    scored.sort_by_key(|(index, _)| *index);
    let scored: Vec<_> = scored.into_iter().map(|(_, paper)| paper).collect();
    debug!(
      "Scored {} candidates, {} with the neutral fallback",
      scored.len(),
      scored.iter().filter(|p| p.fallback).count()
    );
    scored
  }

  /// Scores one candidate, falling back to the neutral score on any failure.
  async fn score_one(&self, candidate: CandidatePaper, digest: &LibraryDigest) -> ScoredPaper {
    let assessment =
      match tokio::time::timeout(self.settings.call_timeout, self.oracle.assess(&candidate, digest))
        .await
      {
        Ok(result) => result,
        Err(_) => Err(LecternError::Timeout(format!(
          "scoring took longer than {}s",
          self.settings.call_timeout.as_secs_f64()
        ))),
      };

    match assessment {
      Ok(assessment) => {
        let citation_count = match candidate.source {
          SourceKind::Related => candidate.citation_count.or(assessment.citation_count),
          SourceKind::New => None,
        };
        let explanation = if assessment.explanation.trim().is_empty() {
          format!("Rated {:.1} with no rationale given.", assessment.score)
        } else {
          assessment.explanation
        };
        ScoredPaper {
          relevance_score: clamp_score(assessment.score),
          explanation,
          citation_count,
          author_affinity: Vec::new(),
          code_url: None,
          fallback: false,
          candidate,
        }
      },
      Err(e) => {
        warn!("Scoring \"{}\" failed, using the neutral score: {e}", candidate.title);
        fallback(candidate)
      },
    }
  }
}

/// The neutral-score stand-in for a candidate the oracle could not judge.
pub fn fallback(candidate: CandidatePaper) -> ScoredPaper {
  let citation_count = match candidate.source {
    SourceKind::Related => candidate.citation_count,
    SourceKind::New => None,
  };
  ScoredPaper {
    relevance_score: NEUTRAL_SCORE,
    explanation: FALLBACK_EXPLANATION.to_string(),
    citation_count,
    author_affinity: Vec::new(),
    code_url: None,
    fallback: true,
    candidate,
  }
}

/// Clamps into `[0, 10]`; anything that is not a number becomes the neutral score.
pub fn clamp_score(score: f64) -> f64 {
  if score.is_finite() {
    score.clamp(0.0, 10.0)
  } else {
    NEUTRAL_SCORE
  }
}
