//! Author cross-referencing between candidates and the library.
//!
//! The index is rebuilt from the library snapshot on every regeneration run and consulted
//! without any external call. Matching is exact on the normalized name: case-insensitive,
//! trimmed, internal whitespace collapsed. "A. Smith" and "a.  smith" match; "A. Smith" and
//! "Alice Smith" do not.
//!
//! The annotation is purely informational and never feeds back into scores or ordering.

use super::*;

/// A candidate author who also wrote papers in the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorMatch {
  /// The author's name as the candidate spells it
  pub author:         String,
  /// Titles of library papers by this author
  pub library_titles: Vec<String>,
}

/// Normalized author name to the titles of library papers they wrote.
#[derive(Debug, Clone, Default)]
pub struct AuthorIndex {
  /// Index keyed by [`normalize_author`] output
  authors: BTreeMap<String, Vec<String>>,
}

impl AuthorIndex {
  /// Builds the index from a library snapshot.
  pub fn build(library: &[LibraryPaper]) -> Self {
    let mut authors: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for paper in library {
      for author in &paper.authors {
        let key = normalize_author(author);
        if key.is_empty() {
          continue;
        }
        let titles = authors.entry(key).or_default();
        if !titles.contains(&paper.title) {
          titles.push(paper.title.clone());
        }
      }
    }
    trace!("Built author index with {} authors", authors.len());
    Self { authors }
  }

  /// Library titles written by `author`, if any.
  pub fn titles_by(&self, author: &str) -> Option<&[String]> {
    self.authors.get(&normalize_author(author)).map(Vec::as_slice)
  }

  /// Number of distinct authors in the library.
  pub fn len(&self) -> usize { self.authors.len() }

  /// Whether the library has no authors at all.
  pub fn is_empty(&self) -> bool { self.authors.is_empty() }
}

/// Lists the candidate's authors who already appear in the library, in the candidate's order.
pub fn match_authors(candidate: &CandidatePaper, index: &AuthorIndex) -> Vec<AuthorMatch> {
  let mut seen = HashSet::new();
  candidate
    .authors
    .iter()
    .filter(|author| seen.insert(normalize_author(author)))
    .filter_map(|author| {
      index.titles_by(author).map(|titles| AuthorMatch {
        author:         author.trim().to_string(),
        library_titles: titles.to_vec(),
      })
    })
    .collect()
}

/// Lowercases, trims and collapses whitespace.
pub fn normalize_author(name: &str) -> String {
  name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
