//! Recent submissions from the arXiv query API.
//!
//! The API answers with an Atom feed; entries are read straight off the `quick-xml` event
//! stream. Listings are sorted by submission date, so asking for twice the wanted amount and
//! then dropping entries older than the lookback window keeps the result both recent and full.

use quick_xml::{events::Event, Reader};

use super::*;

/// Public arXiv query endpoint.
pub const DEFAULT_ARXIV_URL: &str = "https://export.arxiv.org/api/query";

/// Client for the arXiv query API.
#[derive(Debug, Clone)]
pub struct ArxivClient {
  /// Underlying HTTP client
  http:          reqwest::Client,
  /// Query endpoint
  base_url:      String,
  /// Entries older than this many days are dropped
  lookback_days: u32,
  /// Backoff for each request
  retry:         RetryPolicy,
}

impl ArxivClient {
  /// Creates a client against `base_url` with default timeouts, lookback and retries.
  pub fn new(base_url: impl Into<String>) -> Result<Self> {
    Ok(Self {
      http:          http_client(Duration::from_secs(30))?,
      base_url:      base_url.into(),
      lookback_days: 3,
      retry:         RetryPolicy::default(),
    })
  }

  /// Creates a client from the configuration.
  pub fn from_config(config: &Config) -> Result<Self> {
    Ok(Self {
      http:          http_client(config.request_timeout())?,
      base_url:      config.arxiv_url.clone(),
      lookback_days: config.lookback_days,
      retry:         config.retry_policy(),
    })
  }

  /// Sets the lookback window in days.
  pub fn with_lookback_days(mut self, days: u32) -> Self {
    self.lookback_days = days;
    self
  }

  /// Sets the retry policy.
  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }
}

#[async_trait]
impl PaperIndex for ArxivClient {
  async fn fetch_new(&self, topics: &[String], limit: usize) -> Result<Vec<CandidatePaper>> {
    if topics.is_empty() || limit == 0 {
      return Ok(Vec::new());
    }

    let query = topics.iter().map(|t| format!("cat:{t}")).collect::<Vec<_>>().join(" OR ");
    let max_results = (limit * 2).to_string();
    debug!("Querying arXiv for {query} ({max_results} results)");

    let (http, base_url, query, max_results) = (&self.http, &self.base_url, &query, &max_results);
    let body = self
      .retry
      .run("arxiv", || async move {
        let request = http.get(base_url).query(&[
          ("search_query", query.as_str()),
          ("start", "0"),
          ("max_results", max_results.as_str()),
          ("sortBy", "submittedDate"),
          ("sortOrder", "descending"),
        ]);
        Ok(send_checked(request).await?.bytes().await?)
      })
      .await?;

    let cutoff = Utc::now() - chrono::Duration::days(i64::from(self.lookback_days));
    let mut candidates: Vec<_> = parse_feed(&body)?
      .into_iter()
      .filter(|c| c.publication_date.map_or(true, |date| date >= cutoff))
      .collect();
    candidates.truncate(limit);
    Ok(candidates)
  }
}

/// Fields of one Atom entry collected while reading.
#[derive(Default)]
struct EntryFields {
  /// `<id>`, the abstract page URL
  id:        String,
  /// `<title>`
  title:     String,
  /// `<summary>`
  summary:   String,
  /// `<published>`
  published: String,
  /// `<author><name>` values
  authors:   Vec<String>,
}

impl EntryFields {
  /// Turns the collected text into a candidate.
  fn into_candidate(self) -> CandidatePaper {
    let mut candidate =
      CandidatePaper::new(collapse_whitespace(&self.title), self.authors, SourceKind::New);
    let summary = collapse_whitespace(&self.summary);
    if !summary.is_empty() {
      candidate = candidate.with_abstract(summary);
    }
    candidate = candidate.with_arxiv_id(&self.id);
    if candidate.url.is_none() && !self.id.trim().is_empty() {
      candidate.url = Some(self.id.trim().to_string());
    }
    candidate.publication_date = DateTime::parse_from_rfc3339(self.published.trim())
      .map(|dt| dt.with_timezone(&Utc))
      .ok();
    candidate
  }
}

/// Parses an arXiv Atom feed into candidates, in feed order.
///
/// An error feed (arXiv reports bad queries as a single entry pointing at its error docs) is
/// returned as [`LecternError::ApiError`].
pub fn parse_feed(xml: &[u8]) -> Result<Vec<CandidatePaper>> {
  let mut reader = Reader::from_reader(xml);
  reader.config_mut().trim_text(true);

  let mut candidates = Vec::new();
  let mut path: Vec<String> = Vec::new();
  let mut entry: Option<EntryFields> = None;
  let mut buf = Vec::new();

  loop {
    match reader.read_event_into(&mut buf) {
      Ok(Event::Start(e)) => {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        if name == "entry" {
          entry = Some(EntryFields::default());
        }
        path.push(name);
      },
      Ok(Event::Text(e)) =>
        if let Some(fields) = entry.as_mut() {
          let text = e
            .unescape()
            .map_err(|e| LecternError::ApiError(format!("Malformed arXiv feed: {e}")))?;
          let parent = path.len().checked_sub(2).and_then(|i| path.get(i)).map(String::as_str);
          match (parent, path.last().map(String::as_str)) {
            (Some("entry"), Some("id")) => fields.id.push_str(&text),
            (Some("entry"), Some("title")) => fields.title.push_str(&text),
            (Some("entry"), Some("summary")) => fields.summary.push_str(&text),
            (Some("entry"), Some("published")) => fields.published.push_str(&text),
            (Some("author"), Some("name")) => fields.authors.push(text.trim().to_string()),
            _ => (),
          }
        },
      Ok(Event::End(e)) => {
        if e.local_name().as_ref() == b"entry" {
          if let Some(fields) = entry.take() {
            if fields.id.contains("/api/errors") {
              return Err(LecternError::ApiError(format!(
                "arXiv rejected the query: {}",
                collapse_whitespace(&fields.summary)
              )));
            }
            candidates.push(fields.into_candidate());
          }
        }
        path.pop();
      },
      Ok(Event::Eof) => break,
      Ok(_) => (),
      Err(e) => return Err(LecternError::ApiError(format!("Malformed arXiv feed: {e}"))),
    }
    buf.clear();
  }

  trace!("Parsed {} entries from arXiv feed", candidates.len());
  Ok(candidates)
}

/// Collapses runs of whitespace (arXiv wraps long titles) into single spaces.
fn collapse_whitespace(text: &str) -> String { text.split_whitespace().collect::<Vec<_>>().join(" ") }
