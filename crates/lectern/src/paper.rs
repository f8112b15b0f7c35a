//! Paper types flowing through the recommendation pipeline.
//!
//! Three shapes of paper exist, each with a different owner and lifetime:
//!
//! - [`LibraryPaper`]: a paper the user saved. Owned by the library store; the pipeline only ever
//!   holds a read-only snapshot of these.
//! - [`CandidatePaper`]: something a candidate source returned during one regeneration run.
//! - [`ScoredPaper`]: a candidate after the relevance oracle and the author matcher had their
//!   say. Batches of these are what the cache hands out.
//!
//! Identity is shared by all three and follows one rule, see [`PaperIdentity`].
//!
//! # Examples
//!
//! ```
//! use lectern::paper::{normalize_title, PaperIdentity};
//!
//! assert_eq!(normalize_title("  Attention Is\nAll You Need! "), "attention is all you need");
//!
//! let saved = PaperIdentity::new(Some("https://arxiv.org/abs/1706.03762v7"), "Attention");
//! let found = PaperIdentity::new(Some("1706.03762"), "Attention Is All You Need");
//! let untagged = PaperIdentity::new(None, "attention");
//! assert!(saved.matches(&found));
//! assert!(saved.matches(&untagged));
//! assert!(!found.matches(&untagged));
//! ```

use super::*;

lazy_static! {
  /// New style identifiers (`2301.07041`), with an optional version suffix.
  static ref ARXIV_NEW: Regex = Regex::new(r"(\d{4}\.\d{4,5})(?:v\d+)?").unwrap();
  /// Old style identifiers (`math.AG/0601001`, `hep-th/9901001`).
  static ref ARXIV_OLD: Regex =
    Regex::new(r"([a-zA-Z-]+(?:\.[A-Za-z]{2})?/\d{7})(?:v\d+)?").unwrap();
  /// GitHub repository links as they appear in abstracts.
  static ref GITHUB_URL: Regex =
    Regex::new(r"(?i)https?://(?:www\.)?github\.com/[\w\-.]+/[\w\-.]+").unwrap();
}

/// A paper saved in the user's library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryPaper {
  /// The paper's full title
  pub title:            String,
  /// Authors in the order the paper lists them
  pub authors:          Vec<String>,
  /// Abstract, if the store has one
  pub abstract_text:    Option<String>,
  /// arXiv identifier without version suffix
  pub arxiv_id:         Option<String>,
  /// Publication date, if known
  pub publication_date: Option<DateTime<Utc>>,
  /// When the paper entered the library
  pub added_at:         DateTime<Utc>,
}

impl LibraryPaper {
  /// Creates a library paper added right now, with no abstract or dates.
  pub fn new(title: impl Into<String>, authors: Vec<String>) -> Self {
    Self {
      title: title.into(),
      authors,
      abstract_text: None,
      arxiv_id: None,
      publication_date: None,
      added_at: Utc::now(),
    }
  }

  /// Sets the arXiv identifier, accepting either a bare id or an arXiv URL.
  pub fn with_arxiv_id(mut self, id: &str) -> Self {
    self.arxiv_id = extract_arxiv_id(id);
    self
  }

  /// Sets the abstract.
  pub fn with_abstract(mut self, text: impl Into<String>) -> Self {
    self.abstract_text = Some(text.into());
    self
  }

  /// Sets the time the paper was added to the library.
  pub fn with_added_at(mut self, added_at: DateTime<Utc>) -> Self {
    self.added_at = added_at;
    self
  }

  /// The identity this paper is deduplicated under.
  pub fn identity(&self) -> PaperIdentity {
    PaperIdentity::new(self.arxiv_id.as_deref(), &self.title)
  }
}

/// Which candidate source produced a paper, and therefore which list it ends up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
  /// Recent submissions from the paper index
  New,
  /// Papers connected to the library through the citation graph
  Related,
}

impl Display for SourceKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      SourceKind::New => write!(f, "new"),
      SourceKind::Related => write!(f, "related"),
    }
  }
}

/// A paper returned by a candidate source, not yet deduplicated or scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePaper {
  /// The paper's title, never empty
  pub title:            String,
  /// Author names, at least one
  pub authors:          Vec<String>,
  /// Abstract, when the source supplies one
  pub abstract_text:    Option<String>,
  /// arXiv identifier without version suffix
  pub arxiv_id:         Option<String>,
  /// Landing page: the arXiv abstract page when there is one, otherwise the source's own page
  pub url:              Option<String>,
  /// Publication date, when the source supplies one
  pub publication_date: Option<DateTime<Utc>>,
  /// Which source produced this candidate
  pub source:           SourceKind,
  /// Raw citation count as reported by the citation graph
  pub citation_count:   Option<u64>,
  /// Title of the library paper this candidate was discovered from
  pub anchor:           Option<String>,
}

impl CandidatePaper {
  /// Creates a candidate with only the required fields set.
  pub fn new(title: impl Into<String>, authors: Vec<String>, source: SourceKind) -> Self {
    Self {
      title: title.into(),
      authors,
      abstract_text: None,
      arxiv_id: None,
      url: None,
      publication_date: None,
      source,
      citation_count: None,
      anchor: None,
    }
  }

  /// Sets the arXiv identifier (bare id or URL) and points `url` at its abstract page.
  pub fn with_arxiv_id(mut self, id: &str) -> Self {
    self.arxiv_id = extract_arxiv_id(id);
    if let Some(id) = &self.arxiv_id {
      self.url = Some(arxiv_abs_url(id));
    }
    self
  }

  /// Sets the abstract.
  pub fn with_abstract(mut self, text: impl Into<String>) -> Self {
    self.abstract_text = Some(text.into());
    self
  }

  /// Sets the raw citation count.
  pub fn with_citation_count(mut self, count: u64) -> Self {
    self.citation_count = Some(count);
    self
  }

  /// Sets the library paper this candidate was discovered from.
  pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
    self.anchor = Some(anchor.into());
    self
  }

  /// The identity this candidate is deduplicated under.
  pub fn identity(&self) -> PaperIdentity {
    PaperIdentity::new(self.arxiv_id.as_deref(), &self.title)
  }

  /// Whether the candidate carries the minimum every source must supply.
  pub fn is_well_formed(&self) -> bool {
    !self.title.trim().is_empty() && self.authors.iter().any(|a| !a.trim().is_empty())
  }
}

/// A candidate annotated with its relevance judgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPaper {
  /// The candidate that was scored
  pub candidate:       CandidatePaper,
  /// Relevance in `[0, 10]`
  pub relevance_score: f64,
  /// Why the paper is (or is not) relevant, never empty
  pub explanation:     String,
  /// Citation count for related papers, when the source or the oracle knew it
  pub citation_count:  Option<u64>,
  /// Authors of this paper that also wrote papers in the library
  #[serde(default)]
  pub author_affinity: Vec<AuthorMatch>,
  /// Code repository linked from the abstract
  pub code_url:        Option<String>,
  /// True when the score is the neutral fallback rather than an oracle judgment
  #[serde(default)]
  pub fallback:        bool,
}

impl ScoredPaper {
  /// The identity this paper is deduplicated under.
  pub fn identity(&self) -> PaperIdentity { self.candidate.identity() }
}

/// The unit the cache stores and serves: both ranked lists from one regeneration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationBatch {
  /// Recent papers, most relevant first
  pub new_papers:       Vec<ScoredPaper>,
  /// Papers related to the library, most relevant first
  pub related_papers:   Vec<ScoredPaper>,
  /// When the run that produced this batch finished
  pub generated_at:     DateTime<Utc>,
  /// Sources that failed during the run, so their list may be thin or empty
  #[serde(default)]
  pub degraded_sources: Vec<SourceKind>,
}

impl RecommendationBatch {
  /// Iterates over both lists, new papers first.
  pub fn papers(&self) -> impl Iterator<Item = &ScoredPaper> {
    self.new_papers.iter().chain(self.related_papers.iter())
  }

  /// Finds a paper in either list that shares `candidate`'s identity.
  pub fn find(&self, candidate: &CandidatePaper) -> Option<&ScoredPaper> {
    let identity = candidate.identity();
    self.papers().find(|p| p.identity().matches(&identity))
  }

  /// Whether both lists are empty.
  pub fn is_empty(&self) -> bool { self.new_papers.is_empty() && self.related_papers.is_empty() }
}

/// How papers are told apart.
///
/// Two papers are the same if both carry an arXiv identifier and those match. If either one
/// lacks an identifier, they are the same when their normalized titles match (and are not
/// empty).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaperIdentity {
  /// arXiv identifier without version suffix
  pub arxiv_id: Option<String>,
  /// Normalized title, see [`normalize_title`]
  pub title:    String,
}

impl PaperIdentity {
  /// Builds an identity from an optional arXiv id (or URL) and a title.
  pub fn new(arxiv_id: Option<&str>, title: &str) -> Self {
    Self { arxiv_id: arxiv_id.and_then(extract_arxiv_id), title: normalize_title(title) }
  }

  /// Whether two identities denote the same paper.
  pub fn matches(&self, other: &PaperIdentity) -> bool {
    match (&self.arxiv_id, &other.arxiv_id) {
      (Some(a), Some(b)) => a == b,
      _ => !self.title.is_empty() && self.title == other.title,
    }
  }
}

/// Lowercases, strips punctuation and collapses whitespace.
pub fn normalize_title(title: &str) -> String {
  title
    .to_lowercase()
    .chars()
    .filter(|c| c.is_alphanumeric() || c.is_whitespace())
    .collect::<String>()
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
}

/// Pulls an arXiv identifier out of a bare id or any URL containing one, dropping the version.
pub fn extract_arxiv_id(input: &str) -> Option<String> {
  let input = input.trim();
  if input.is_empty() {
    return None;
  }
  ARXIV_NEW
    .captures(input)
    .or_else(|| ARXIV_OLD.captures(input))
    .and_then(|cap| cap.get(1))
    .map(|m| m.as_str().to_string())
}

/// The abstract page for an arXiv identifier.
pub fn arxiv_abs_url(arxiv_id: &str) -> String { format!("https://arxiv.org/abs/{arxiv_id}") }

/// Finds the first GitHub repository linked from an abstract.
pub fn extract_code_url(abstract_text: Option<&str>) -> Option<String> {
  let text = abstract_text?;
  GITHUB_URL
    .find(text)
    .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', ')']).to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_normalize_title() {
    assert_eq!(normalize_title("Attention Is All You Need"), "attention is all you need");
    assert_eq!(normalize_title("  Attention   is\tall\nyou need. "), "attention is all you need");
    assert_eq!(normalize_title("BERT: Pre-training of Deep"), "bert pretraining of deep");
    assert_eq!(normalize_title("!!!"), "");
  }

  #[test]
  fn test_extract_arxiv_id() {
    assert_eq!(extract_arxiv_id("2301.07041"), Some("2301.07041".to_string()));
    assert_eq!(extract_arxiv_id("2301.07041v3"), Some("2301.07041".to_string()));
    assert_eq!(
      extract_arxiv_id("http://arxiv.org/abs/1706.03762v7"),
      Some("1706.03762".to_string())
    );
    assert_eq!(extract_arxiv_id("https://arxiv.org/pdf/2301.07041"), Some("2301.07041".into()));
    assert_eq!(extract_arxiv_id("math.AG/0601001"), Some("math.AG/0601001".to_string()));
    assert_eq!(extract_arxiv_id("hep-th/9901001v2"), Some("hep-th/9901001".to_string()));
    assert_eq!(extract_arxiv_id("not an id"), None);
    assert_eq!(extract_arxiv_id(""), None);
  }

  #[test]
  fn test_identity_rule() {
    let library = LibraryPaper::new("Attention Is All You Need", vec!["Vaswani".into()])
      .with_arxiv_id("1706.03762");
    let same_id_other_title =
      CandidatePaper::new("Transformers", vec![], SourceKind::New).with_arxiv_id("1706.03762v5");
    let same_title_no_id =
      CandidatePaper::new("attention is all you need!", vec![], SourceKind::New);
    let same_title_other_id = CandidatePaper::new("Attention Is All You Need", vec![], SourceKind::New)
      .with_arxiv_id("2001.00001");

    assert!(library.identity().matches(&same_id_other_title.identity()));
    assert!(library.identity().matches(&same_title_no_id.identity()));
    assert!(!library.identity().matches(&same_title_other_id.identity()));
  }

  #[test]
  fn test_empty_titles_never_match() {
    let a = PaperIdentity::new(None, "???");
    let b = PaperIdentity::new(None, "!!!");
    assert!(!a.matches(&b));
  }

  #[test]
  fn test_candidate_with_arxiv_id_sets_url() {
    let candidate =
      CandidatePaper::new("A", vec!["B".into()], SourceKind::New).with_arxiv_id("2401.00001v2");
    assert_eq!(candidate.arxiv_id.as_deref(), Some("2401.00001"));
    assert_eq!(candidate.url.as_deref(), Some("https://arxiv.org/abs/2401.00001"));
  }

  #[test]
  fn test_well_formed() {
    assert!(CandidatePaper::new("Title", vec!["Author".into()], SourceKind::New).is_well_formed());
    assert!(!CandidatePaper::new("  ", vec!["Author".into()], SourceKind::New).is_well_formed());
    assert!(!CandidatePaper::new("Title", vec![" ".into()], SourceKind::New).is_well_formed());
  }

  #[test]
  fn test_extract_code_url() {
    let text = "We release code at https://github.com/org/repo. Enjoy.";
    assert_eq!(extract_code_url(Some(text)), Some("https://github.com/org/repo".into()));

    let text = "(see HTTPS://www.GitHub.com/some-org/some.repo)";
    assert_eq!(
      extract_code_url(Some(text)),
      Some("HTTPS://www.GitHub.com/some-org/some.repo".into())
    );

    assert_eq!(extract_code_url(Some("no links here")), None);
    assert_eq!(extract_code_url(None), None);
  }

  #[test]
  fn test_batch_find() {
    let scored = ScoredPaper {
      candidate:       CandidatePaper::new("Some Paper", vec!["A".into()], SourceKind::Related),
      relevance_score: 6.0,
      explanation:     "close to your work".into(),
      citation_count:  Some(3),
      author_affinity: Vec::new(),
      code_url:        None,
      fallback:        false,
    };
    let batch = RecommendationBatch {
      new_papers:       Vec::new(),
      related_papers:   vec![scored],
      generated_at:     Utc::now(),
      degraded_sources: Vec::new(),
    };

    let query = CandidatePaper::new("some paper", vec![], SourceKind::New);
    assert!(batch.find(&query).is_some());
    let query = CandidatePaper::new("other paper", vec![], SourceKind::New);
    assert!(batch.find(&query).is_none());
    assert!(!batch.is_empty());
  }
}
