//! Related papers from the Semantic Scholar graph.
//!
//! For every anchor paper the client first resolves its arXiv id to a graph paper id, then asks
//! the recommendations endpoint for papers like it. Every candidate remembers which anchor it
//! came from. Anchors are processed one after another to stay under the public rate limit, and
//! anchors still pending at the run deadline are dropped while earlier ones are kept.

use super::*;

/// Public Semantic Scholar API root.
pub const DEFAULT_SEMANTIC_SCHOLAR_URL: &str = "https://api.semanticscholar.org";

/// Fields requested for every recommended paper.
const PAPER_FIELDS: &str = "title,authors,abstract,year,publicationDate,citationCount,url,externalIds";

/// Authors kept per candidate.
const MAX_AUTHORS: usize = 5;

/// Client for the Semantic Scholar graph and recommendations APIs.
#[derive(Debug, Clone)]
pub struct SemanticScholarClient {
  /// Underlying HTTP client
  http:     reqwest::Client,
  /// API root
  base_url: String,
  /// Optional key for higher rate limits
  api_key:  Option<String>,
  /// Backoff for each request
  retry:    RetryPolicy,
}

/// Graph lookup response, only the id is requested.
#[derive(Debug, Deserialize)]
struct PaperLookup {
  /// Graph paper id
  #[serde(rename = "paperId")]
  paper_id: Option<String>,
}

/// Recommendations response.
#[derive(Debug, Deserialize)]
struct RecommendationsResponse {
  /// Recommended papers, best first
  #[serde(rename = "recommendedPapers", default)]
  recommended_papers: Vec<GraphPaper>,
}

/// A paper as the graph describes it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphPaper {
  /// Title
  title:            Option<String>,
  /// Authors in order
  #[serde(default)]
  authors:          Vec<GraphAuthor>,
  /// Abstract
  #[serde(rename = "abstract")]
  abstract_text:    Option<String>,
  /// Publication year
  year:             Option<i32>,
  /// `YYYY-MM-DD`
  publication_date: Option<String>,
  /// Citation count
  citation_count:   Option<u64>,
  /// Semantic Scholar page
  url:              Option<String>,
  /// Ids in other systems; values are strings or numbers
  external_ids:     Option<HashMap<String, serde_json::Value>>,
}

/// An author as the graph describes them.
#[derive(Debug, Deserialize)]
struct GraphAuthor {
  /// Display name
  name: Option<String>,
}

impl GraphPaper {
  /// Converts into a candidate discovered from `anchor`.
  fn into_candidate(self, anchor: &str) -> CandidatePaper {
    let authors = self
      .authors
      .into_iter()
      .filter_map(|a| a.name)
      .filter(|name| !name.trim().is_empty())
      .take(MAX_AUTHORS)
      .collect();
    let mut candidate = CandidatePaper::new(
      self.title.unwrap_or_default().trim(),
      authors,
      SourceKind::Related,
    )
    .with_anchor(anchor);

    if let Some(text) = self.abstract_text.filter(|t| !t.trim().is_empty()) {
      candidate = candidate.with_abstract(text);
    }
    if let Some(count) = self.citation_count {
      candidate = candidate.with_citation_count(count);
    }
    let arxiv_id = self
      .external_ids
      .as_ref()
      .and_then(|ids| ids.get("ArXiv"))
      .and_then(serde_json::Value::as_str);
    match arxiv_id {
      Some(id) => candidate = candidate.with_arxiv_id(id),
      None => candidate.url = self.url,
    }
    candidate.publication_date = publication_date(self.publication_date.as_deref(), self.year);
    candidate
  }
}

/// Parses `YYYY-MM-DD`, falling back to January 1st of `year`.
fn publication_date(date: Option<&str>, year: Option<i32>) -> Option<DateTime<Utc>> {
  date
    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    .or_else(|| year.and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1)))
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .map(|d| Utc.from_utc_datetime(&d))
}

impl SemanticScholarClient {
  /// Creates a client against `base_url` with default timeouts and retries and no key.
  pub fn new(base_url: impl Into<String>) -> Result<Self> {
    Ok(Self {
      http:     http_client(Duration::from_secs(30))?,
      base_url: base_url.into(),
      api_key:  None,
      retry:    RetryPolicy::default(),
    })
  }

  /// Creates a client from the configuration.
  pub fn from_config(config: &Config) -> Result<Self> {
    Ok(Self {
      http:     http_client(config.request_timeout())?,
      base_url: config.semantic_scholar_url.clone(),
      api_key:  config.semantic_scholar_api_key(),
      retry:    config.retry_policy(),
    })
  }

  /// Sets the API key sent as `x-api-key`.
  pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
    self.api_key = Some(key.into());
    self
  }

  /// Sets the retry policy.
  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  /// GETs `url` with retries and decodes the JSON body.
  async fn get_json<T: serde::de::DeserializeOwned>(
    &self,
    label: &str,
    url: &str,
    query: &[(&str, String)],
  ) -> Result<T> {
    let body = self
      .retry
      .run(label, || async move {
        let mut request = self.http.get(url).query(query);
        if let Some(key) = &self.api_key {
          request = request.header("x-api-key", key);
        }
        Ok(send_checked(request).await?.bytes().await?)
      })
      .await?;
    Ok(serde_json::from_slice(&body)?)
  }

  /// Resolves an arXiv id to the graph's own paper id.
  async fn resolve(&self, arxiv_id: &str) -> Result<String> {
    let url = format!("{}/graph/v1/paper/arXiv:{arxiv_id}", self.base_url);
    let lookup: PaperLookup =
      self.get_json("semantic scholar lookup", &url, &[("fields", "paperId".into())]).await?;
    lookup
      .paper_id
      .ok_or_else(|| LecternError::ApiError(format!("No graph id for arXiv:{arxiv_id}")))
  }

  /// Fetches recommendations for one anchor.
  async fn related_to(&self, anchor: &LibraryPaper, limit: usize) -> Result<Vec<CandidatePaper>> {
    let Some(arxiv_id) = anchor.arxiv_id.as_deref() else {
      return Ok(Vec::new());
    };
    let paper_id = self.resolve(arxiv_id).await?;
    let url = format!("{}/recommendations/v1/papers/forpaper/{paper_id}", self.base_url);
    let response: RecommendationsResponse = self
      .get_json("semantic scholar recommendations", &url, &[
        ("limit", limit.to_string()),
        ("fields", PAPER_FIELDS.to_string()),
      ])
      .await?;
    trace!(
      "Semantic Scholar recommended {} papers for \"{}\"",
      response.recommended_papers.len(),
      anchor.title
    );
    Ok(response.recommended_papers.into_iter().map(|p| p.into_candidate(&anchor.title)).collect())
  }
}

#[async_trait]
impl CitationGraph for SemanticScholarClient {
  async fn fetch_related(
    &self,
    anchors: &[LibraryPaper],
    limit: usize,
    deadline: Instant,
  ) -> Result<Vec<CandidatePaper>> {
    if anchors.is_empty() || limit == 0 {
      return Ok(Vec::new());
    }

    let per_anchor = limit.div_ceil(anchors.len()).max(1);
    let mut candidates = Vec::new();
    let mut last_error = None;
    let mut succeeded = 0;
    for (done, anchor) in anchors.iter().enumerate() {
      match tokio::time::timeout_at(deadline, self.related_to(anchor, per_anchor)).await {
        Ok(Ok(found)) => {
          succeeded += 1;
          candidates.extend(found);
        },
        Ok(Err(e)) => {
          warn!("Related papers for \"{}\" unavailable: {e}", anchor.title);
          last_error = Some(e);
        },
        Err(_) => {
          warn!("Deadline reached with {} of {} anchors left", anchors.len() - done, anchors.len());
          last_error = Some(LecternError::Timeout("related papers".into()));
          break;
        },
      }
    }

    match last_error {
      Some(e) if succeeded == 0 => Err(e),
      _ => {
        candidates.truncate(limit);
        Ok(candidates)
      },
    }
  }
}
