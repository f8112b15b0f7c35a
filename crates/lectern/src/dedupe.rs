//! Candidate deduplication.
//!
//! Everything here is pure: no I/O, no clocks. The caller decides whether the previous batch is
//! still fresh and only hands it over if it is.
//!
//! A candidate is dropped when it is the same paper (see [`PaperIdentity::matches`]) as
//! - a paper in the library,
//! - a paper in the still-fresh previous batch, or
//! - a candidate kept earlier in the same input.
//!
//! Output order follows input order, but callers should not rely on it for ranking.
//!
//! # Examples
//!
//! ```
//! use lectern::{
//!   dedupe::dedupe,
//!   paper::{CandidatePaper, LibraryPaper, SourceKind},
//! };
//!
//! let library = vec![LibraryPaper::new("Attention Is All You Need", vec!["Vaswani".into()])
//!   .with_arxiv_id("1706.03762")];
//! let candidates = vec![
//!   CandidatePaper::new("Attention!", vec!["X".into()], SourceKind::New).with_arxiv_id("1706.03762"),
//!   CandidatePaper::new("Something New", vec!["Y".into()], SourceKind::New),
//! ];
//!
//! let kept = dedupe(candidates, &library, None);
//! assert_eq!(kept.len(), 1);
//! assert_eq!(kept[0].title, "Something New");
//! ```

use super::*;

/// A set of paper identities answering "is this the same paper as any of these?".
#[derive(Debug, Clone, Default)]
pub struct IdentitySet {
  /// arXiv ids of every member that has one
  arxiv_ids:       HashSet<String>,
  /// Normalized titles of members without an arXiv id
  untagged_titles: HashSet<String>,
  /// Normalized titles of every member
  all_titles:      HashSet<String>,
}

impl IdentitySet {
  /// Creates an empty set.
  pub fn new() -> Self { Self::default() }

  /// Adds an identity.
  pub fn insert(&mut self, identity: PaperIdentity) {
    if !identity.title.is_empty() {
      if identity.arxiv_id.is_none() {
        self.untagged_titles.insert(identity.title.clone());
      }
      self.all_titles.insert(identity.title);
    }
    if let Some(id) = identity.arxiv_id {
      self.arxiv_ids.insert(id);
    }
  }

  /// Whether any member is the same paper as `identity`.
  pub fn contains(&self, identity: &PaperIdentity) -> bool {
    let title_hit = |titles: &HashSet<String>| {
      !identity.title.is_empty() && titles.contains(&identity.title)
    };
    match &identity.arxiv_id {
      Some(id) => self.arxiv_ids.contains(id) || title_hit(&self.untagged_titles),
      None => title_hit(&self.all_titles),
    }
  }
}

impl FromIterator<PaperIdentity> for IdentitySet {
  fn from_iter<T: IntoIterator<Item = PaperIdentity>>(iter: T) -> Self {
    let mut set = Self::new();
    for identity in iter {
      set.insert(identity);
    }
    set
  }
}

/// Removes candidates already known to the user.
///
/// `previous` must only be passed while that batch is within its freshness window.
pub fn dedupe(
  candidates: Vec<CandidatePaper>,
  library: &[LibraryPaper],
  previous: Option<&RecommendationBatch>,
) -> Vec<CandidatePaper> {
  let mut known: IdentitySet = library.iter().map(LibraryPaper::identity).collect();
  if let Some(batch) = previous {
    for paper in batch.papers() {
      known.insert(paper.identity());
    }
  }

  let total = candidates.len();
  let mut kept = Vec::with_capacity(total);
  for candidate in candidates {
    let identity = candidate.identity();
    if known.contains(&identity) {
      trace!("Dropping duplicate candidate \"{}\"", candidate.title);
      continue;
    }
    known.insert(identity);
    kept.push(candidate);
  }

  debug!("Deduplication kept {} of {} candidates", kept.len(), total);
  kept
}
