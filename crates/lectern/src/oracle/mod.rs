//! The relevance oracle: something that reads a candidate next to a digest of the library and
//! says how relevant it is.
//!
//! The real oracle is a text-generation model, so its replies are free text. [`parse_verdict`]
//! reads them leniently; anything it cannot read becomes [`LecternError::UnparseableScore`],
//! which the scorer turns into the neutral fallback. Values are not clamped here.
//!
//! Accepted reply shapes include
//!
//! ```text
//! SCORE: 7.5
//! EXPLANATION: Extends the attention work already in your library.
//! CITATIONS: 1200
//! ```
//!
//! as well as `7|Extends the attention work`, `0|7|Extends the attention work` (an item index
//! first) and `I'd rate this 7/10 because ...`.

use super::*;

pub mod llm;
pub mod stub;

pub use self::{llm::LlmOracle, stub::StubOracle};

lazy_static! {
  /// `score: 7`, `Score = 7.5`, `relevance score: 8`
  static ref SCORE_LABEL: Regex =
    Regex::new(r"(?i)\bscore\b\s*[:=]?\s*\**\s*(-?\d+(?:\.\d+)?)").unwrap();
  /// `7/10`, `7.5 / 10`
  static ref SCORE_FRACTION: Regex = Regex::new(r"(-?\d+(?:\.\d+)?)\s*/\s*10\b").unwrap();
  /// `7|explanation`, or `0|7|explanation` with a leading item index
  static ref SCORE_PIPE: Regex =
    Regex::new(r"^\s*(?:\d+\s*\|\s*)?(-?\d+(?:\.\d+)?)\s*\|\s*(.*)$").unwrap();
  /// `explanation: ...`, `reason: ...`, `rationale: ...`
  static ref EXPLANATION_LABEL: Regex =
    Regex::new(r"(?is)\b(?:explanation|reason|rationale|justification)\b\s*[:=]\s*(.+?)(?:\n\s*\w+\s*[:=]|\z)")
      .unwrap();
  /// `citations: 1200`, `citation count = 15`
  static ref CITATIONS_LABEL: Regex =
    Regex::new(r"(?i)\bcitations?(?:\s+count)?\b\s*[:=]\s*(\d+)").unwrap();
}

/// What the oracle had to say about one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
  /// Raw score; callers clamp it into `[0, 10]`
  pub score:          f64,
  /// Short rationale, never empty
  pub explanation:    String,
  /// Citation count, if the oracle claimed to know it
  pub citation_count: Option<u64>,
}

/// Scores candidates against the library.
#[async_trait]
pub trait RelevanceOracle: Send + Sync {
  /// Judges `candidate` against `digest`.
  async fn assess(&self, candidate: &CandidatePaper, digest: &LibraryDigest) -> Result<Assessment>;
}

#[async_trait]
impl<T: RelevanceOracle + ?Sized> RelevanceOracle for Arc<T> {
  async fn assess(&self, candidate: &CandidatePaper, digest: &LibraryDigest) -> Result<Assessment> {
    (**self).assess(candidate, digest).await
  }
}

/// Reads a score, a rationale and optionally a citation count out of a free-text reply.
pub fn parse_verdict(reply: &str) -> Result<Assessment> {
  let text = reply.trim();

  let piped = text.lines().find_map(|line| SCORE_PIPE.captures(line));
  let (score, piped_explanation) = match piped {
    Some(caps) => (caps[1].parse::<f64>().ok(), Some(caps[2].trim().to_string())),
    None => {
      let score = SCORE_LABEL
        .captures(text)
        .or_else(|| SCORE_FRACTION.captures(text))
        .and_then(|caps| caps[1].parse::<f64>().ok());
      (score, None)
    },
  };
  let Some(score) = score.filter(|s| s.is_finite()) else {
    return Err(LecternError::UnparseableScore(text.chars().take(200).collect()));
  };

  let explanation = piped_explanation
    .filter(|e| !e.is_empty())
    .or_else(|| {
      EXPLANATION_LABEL
        .captures(text)
        .map(|caps| collapse(&caps[1]))
        .filter(|e| !e.is_empty())
    })
    .or_else(|| {
      let rest: Vec<_> = text
        .lines()
        .filter(|line| !SCORE_LABEL.is_match(line) && !CITATIONS_LABEL.is_match(line))
        .collect();
      Some(collapse(&rest.join(" "))).filter(|e| !e.is_empty())
    })
    .unwrap_or_else(|| format!("Rated {score} with no rationale given."));

  let citation_count = CITATIONS_LABEL.captures(text).and_then(|caps| caps[1].parse().ok());

  Ok(Assessment { score, explanation, citation_count })
}

/// Collapses whitespace.
fn collapse(text: &str) -> String { text.split_whitespace().collect::<Vec<_>>().join(" ") }
