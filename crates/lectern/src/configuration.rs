//! TOML configuration for the recommendation pipeline.
//!
//! Every field has a default, so an empty file (or no file at all) is a valid configuration.
//!
//! ```toml
//! topics = ["cs.LG", "cs.CL"]
//! freshness_secs = 86400
//!
//! [retry]
//! attempts = 3
//! base_delay_ms = 500
//!
//! [llm]
//! host = "http://localhost:11434"
//! model = "llama3.2:3b"
//! ```

use super::*;

/// Environment variable consulted when no Semantic Scholar key is configured.
pub const SEMANTIC_SCHOLAR_KEY_ENV: &str = "SEMANTIC_SCHOLAR_API_KEY";

/// Full configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Where the library database lives
  pub database_path:              PathBuf,
  /// arXiv categories followed for new papers
  pub topics:                     Vec<String>,
  /// How far back a submission still counts as new
  pub lookback_days:              u32,
  /// Maximum candidates requested from the paper index
  pub new_limit:                  usize,
  /// Maximum candidates requested from the citation graph
  pub related_limit:              usize,
  /// Library papers used to seed the citation graph
  pub max_anchors:                usize,
  /// Length of each ranked list
  pub max_results:                usize,
  /// How long a batch counts as fresh
  pub freshness_secs:             u64,
  /// Backoff for candidate source requests
  pub retry:                      RetryConfig,
  /// Timeout for a single candidate source request
  pub request_timeout_secs:       u64,
  /// Timeout for a single scoring call
  pub scoring_timeout_secs:       u64,
  /// Outer deadline for a whole regeneration run
  pub regeneration_deadline_secs: u64,
  /// Scoring calls allowed in flight at once
  pub scoring_concurrency:        usize,
  /// Library papers summarized for the oracle
  pub digest_size:                usize,
  /// Abstract length kept in prompts
  pub abstract_chars:             usize,
  /// arXiv query endpoint
  pub arxiv_url:                  String,
  /// Semantic Scholar API root
  pub semantic_scholar_url:       String,
  /// Semantic Scholar API key for higher rate limits
  pub semantic_scholar_api_key:   Option<String>,
  /// Text-generation service used for scoring
  pub llm:                        LlmConfig,
}

/// Retry settings for candidate sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
  /// Total attempts, including the first
  pub attempts:      u32,
  /// Delay before the first retry; doubles afterwards
  pub base_delay_ms: u64,
}

/// Text-generation service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
  /// Ollama host
  pub host:  String,
  /// Model name as Ollama knows it
  pub model: String,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      database_path:              database::Database::default_path(),
      topics:                     ["cs.LG", "cs.CL", "cs.AI", "stat.ML"]
        .into_iter()
        .map(String::from)
        .collect(),
      lookback_days:              3,
      new_limit:                  50,
      related_limit:              30,
      max_anchors:                10,
      max_results:                20,
      freshness_secs:             3600,
      retry:                      RetryConfig::default(),
      request_timeout_secs:       30,
      scoring_timeout_secs:       60,
      regeneration_deadline_secs: 180,
      scoring_concurrency:        4,
      digest_size:                50,
      abstract_chars:             500,
      arxiv_url:                  client::arxiv::DEFAULT_ARXIV_URL.to_string(),
      semantic_scholar_url:       client::semantic_scholar::DEFAULT_SEMANTIC_SCHOLAR_URL
        .to_string(),
      semantic_scholar_api_key:   None,
      llm:                        LlmConfig::default(),
    }
  }
}

impl Default for RetryConfig {
  fn default() -> Self { Self { attempts: 3, base_delay_ms: 500 } }
}

impl Default for LlmConfig {
  fn default() -> Self {
    Self { host: oracle::llm::DEFAULT_HOST.to_string(), model: oracle::llm::DEFAULT_MODEL.into() }
  }
}

impl Config {
  /// Returns the default path for the configuration file.
  ///
  /// `<config_dir>/lectern/config.toml`, falling back to `./lectern/config.toml`.
  pub fn default_path() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("lectern").join("config.toml")
  }

  /// Loads a configuration file, using defaults if the file does not exist.
  ///
  /// # Errors
  ///
  /// Fails if the file exists but cannot be read or parsed, or if it parses into values that
  /// cannot work (see [`Config::validate`]).
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let config = if path.exists() {
      debug!("Loading configuration from {}", path.display());
      toml::from_str(&std::fs::read_to_string(path)?)?
    } else {
      debug!("No configuration at {}, using defaults", path.display());
      Self::default()
    };
    config.validate()?;
    Ok(config)
  }

  /// Writes this configuration as TOML, creating parent directories.
  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(self)?)?;
    Ok(())
  }

  /// Rejects values the pipeline cannot run with.
  pub fn validate(&self) -> Result<()> {
    if self.retry.attempts == 0 {
      return Err(LecternError::Config("retry.attempts must be at least 1".into()));
    }
    if self.scoring_concurrency == 0 {
      return Err(LecternError::Config("scoring_concurrency must be at least 1".into()));
    }
    if self.max_results == 0 {
      return Err(LecternError::Config("max_results must be at least 1".into()));
    }
    if self.llm.model.trim().is_empty() {
      return Err(LecternError::Config("llm.model must not be empty".into()));
    }
    Ok(())
  }

  /// How long a batch stays fresh.
  pub fn freshness(&self) -> Duration { Duration::from_secs(self.freshness_secs) }

  /// The configured Semantic Scholar key, or the one in the environment.
  pub fn semantic_scholar_api_key(&self) -> Option<String> {
    self
      .semantic_scholar_api_key
      .clone()
      .or_else(|| std::env::var(SEMANTIC_SCHOLAR_KEY_ENV).ok())
      .filter(|key| !key.trim().is_empty())
  }

  /// Backoff policy for candidate sources.
  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy::new(self.retry.attempts, Duration::from_millis(self.retry.base_delay_ms))
  }

  /// Timeout for a single candidate source request.
  pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.request_timeout_secs) }

  /// Scoring settings derived from this configuration.
  pub fn scoring(&self) -> ScoringSettings {
    ScoringSettings {
      concurrency:  self.scoring_concurrency,
      call_timeout: Duration::from_secs(self.scoring_timeout_secs),
    }
  }
}
