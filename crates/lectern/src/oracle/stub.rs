//! A deterministic oracle for tests and offline runs.
//!
//! Replies are canned text that still goes through [`parse_verdict`], so the stub exercises the
//! same parsing path as the real model.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;

/// What the stub does when asked about a paper.
#[derive(Debug, Clone, PartialEq)]
pub enum StubReply {
  /// Reply with this text
  Text(String),
  /// Fail as if the service were down
  Unavailable,
  /// Never answer
  Hang,
}

impl StubReply {
  /// A well-formed reply with `score`.
  pub fn score(score: f64) -> Self {
    Self::Text(format!("SCORE: {score}\nEXPLANATION: Stub judgment of {score} out of 10."))
  }
}

/// [`RelevanceOracle`] answering from a fixed table.
#[derive(Debug)]
pub struct StubOracle {
  /// Reply for any paper without an override
  default:   StubReply,
  /// Replies keyed by normalized title
  overrides: HashMap<String, StubReply>,
  /// Number of `assess` calls so far
  calls:     AtomicUsize,
}

impl StubOracle {
  /// A stub giving `reply` for every paper.
  pub fn new(reply: StubReply) -> Self {
    Self { default: reply, overrides: HashMap::new(), calls: AtomicUsize::new(0) }
  }

  /// A stub scoring every paper `score`.
  pub fn scoring(score: f64) -> Self { Self::new(StubReply::score(score)) }

  /// Gives `reply` for the paper titled `title`.
  pub fn with_reply_for(mut self, title: &str, reply: StubReply) -> Self {
    self.overrides.insert(normalize_title(title), reply);
    self
  }

  /// How many times the stub has been asked.
  pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl RelevanceOracle for StubOracle {
  async fn assess(&self, candidate: &CandidatePaper, _: &LibraryDigest) -> Result<Assessment> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let reply = self.overrides.get(&normalize_title(&candidate.title)).unwrap_or(&self.default);
    match reply {
      StubReply::Text(text) => parse_verdict(text),
      StubReply::Unavailable => Err(LecternError::HttpStatus(503)),
      StubReply::Hang => std::future::pending().await,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_stub_replies() {
    let oracle = StubOracle::scoring(6.0)
      .with_reply_for("Broken", StubReply::Text("no idea".into()))
      .with_reply_for("Down", StubReply::Unavailable);
    let digest = LibraryDigest::build(&[], 10, 100);
    let paper = |title: &str| CandidatePaper::new(title, vec!["A".into()], SourceKind::New);

    assert_eq!(oracle.assess(&paper("Anything"), &digest).await.unwrap().score, 6.0);
    assert!(matches!(
      oracle.assess(&paper("broken"), &digest).await,
      Err(LecternError::UnparseableScore(_))
    ));
    assert!(oracle.assess(&paper("Down"), &digest).await.is_err());
    assert_eq!(oracle.calls(), 3);
  }
}
