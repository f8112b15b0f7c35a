//! Relevance oracle backed by a locally running Ollama model.
//!
//! Requests go to Ollama's chat endpoint without streaming. The prompt carries the library
//! digest, the candidate and a fixed answer format; the reply is read by [`parse_verdict`].
//!
//! # Examples
//!
//! ```no_run
//! use lectern::oracle::llm::LlamaRequest;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let response = LlamaRequest::new()
//!   .with_host("http://localhost:11434")
//!   .with_model("llama3.2:3b")
//!   .with_message("What is quantum computing?")
//!   .send(&reqwest::Client::new())
//!   .await?;
//! println!("Response: {}", response.message.content);
//! # Ok(())
//! # }
//! ```

use super::*;

/// Where Ollama listens unless configured otherwise.
pub const DEFAULT_HOST: &str = "http://localhost:11434";

/// Model used unless configured otherwise.
pub const DEFAULT_MODEL: &str = "llama3.2:3b";

/// Path of the chat endpoint.
const CHAT_ENDPOINT: &str = "api/chat";

/// System prompt fixing the answer format.
const SYSTEM_PROMPT: &str = "You rate how relevant research papers are to a researcher, given \
                             the papers in their library. Answer in exactly this format:\n\
                             SCORE: <number from 0 to 10>\n\
                             EXPLANATION: <one short paragraph>\n\
                             CITATIONS: <citation count, only if you know it>";

/// Request builder for the Ollama chat API.
#[derive(Debug, Serialize, Default)]
pub struct LlamaRequest {
  /// The model to use. Sending without one is an error.
  pub model: Option<String>,

  /// Conversation messages, in order. Sending without any is an error.
  pub messages: Vec<Message>,

  /// Always false; the reply is read as a whole.
  pub stream: bool,

  /// Sampling parameters.
  pub options: Options,

  /// Ollama host. Skipped during serialization.
  #[serde(skip)]
  pub host: Option<String>,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
  /// `system`, `user` or `assistant`
  pub role:    String,
  /// Message text
  pub content: String,
}

/// Sampling options.
#[derive(Debug, Serialize, Deserialize)]
pub struct Options {
  /// Maximum number of tokens to generate
  num_predict: u64,
  /// Top-k sampling parameter
  top_k:       u64,
  /// Top-p (nucleus) sampling parameter
  top_p:       f64,
  /// Temperature for controlling randomness in generation
  temperature: f64,
}

// Verdicts are short and should be as repeatable as the model allows.
impl Default for Options {
  fn default() -> Self { Self { num_predict: 512, top_k: 40, top_p: 0.9, temperature: 0.2 } }
}

/// Reply from the chat endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct LlamaResponse {
  /// Name of the model used
  #[serde(default)]
  pub model:      String,
  /// Timestamp of response creation
  #[serde(default)]
  pub created_at: String,
  /// Generated message
  pub message:    Message,
  /// Whether generation is complete
  #[serde(default)]
  pub done:       bool,
}

impl LlamaRequest {
  /// Creates an empty request.
  pub fn new() -> Self { Self::default() }

  /// Sets the Ollama host.
  pub fn with_host(mut self, host: &str) -> Self {
    self.host = Some(host.to_string());
    self
  }

  /// Sets the model.
  pub fn with_model(mut self, model: &str) -> Self {
    self.model = Some(model.to_string());
    self
  }

  /// Adds a system message.
  pub fn with_system(mut self, content: &str) -> Self {
    self.messages.push(Message { role: "system".to_string(), content: content.to_string() });
    self
  }

  /// Adds a user message.
  pub fn with_message(mut self, content: &str) -> Self {
    self.messages.push(Message { role: "user".to_string(), content: content.to_string() });
    self
  }

  /// The chat endpoint URL for the configured host.
  fn url(&self) -> Result<Url> {
    let host = self.host.as_deref().unwrap_or_else(|| {
      warn!("No host set, using {DEFAULT_HOST}");
      DEFAULT_HOST
    });
    let base = Url::parse(host)
      .map_err(|e| LecternError::Config(format!("Invalid LLM host {host:?}: {e}")))?;
    base
      .join(CHAT_ENDPOINT)
      .map_err(|e| LecternError::Config(format!("Invalid LLM host {host:?}: {e}")))
  }

  /// Sends the request.
  ///
  /// # Errors
  ///
  /// Fails if no model or no message was set, the host is not a URL, the request fails or
  /// the reply cannot be decoded.
  pub async fn send(&self, http: &reqwest::Client) -> Result<LlamaResponse> {
    if self.model.is_none() {
      return Err(LecternError::LLMMissingModel);
    }
    if self.messages.is_empty() {
      return Err(LecternError::LLMMissingMessage);
    }

    let response = http.post(self.url()?).json(&self).send().await?;
    let status = response.status();
    if !status.is_success() {
      return Err(LecternError::HttpStatus(status.as_u16()));
    }
    Ok(response.json().await?)
  }
}

/// [`RelevanceOracle`] asking an Ollama model.
#[derive(Debug, Clone)]
pub struct LlmOracle {
  /// HTTP client; per-call timeouts are enforced by the scorer
  http:  reqwest::Client,
  /// Ollama host
  host:  String,
  /// Model name
  model: String,
}

impl LlmOracle {
  /// Creates an oracle for `model` on `host`.
  pub fn new(host: impl Into<String>, model: impl Into<String>) -> Self {
    Self { http: reqwest::Client::new(), host: host.into(), model: model.into() }
  }

  /// Creates an oracle from the configuration.
  pub fn from_config(config: &Config) -> Self { Self::new(&config.llm.host, &config.llm.model) }
}

#[async_trait]
impl RelevanceOracle for LlmOracle {
  async fn assess(&self, candidate: &CandidatePaper, digest: &LibraryDigest) -> Result<Assessment> {
    let prompt = build_prompt(candidate, digest);
    trace!("Scoring \"{}\" with {}", candidate.title, self.model);
    let response = LlamaRequest::new()
      .with_host(&self.host)
      .with_model(&self.model)
      .with_system(SYSTEM_PROMPT)
      .with_message(&prompt)
      .send(&self.http)
      .await?;
    parse_verdict(&response.message.content)
  }
}

/// Builds the user prompt for one candidate.
///
/// With an empty library the model is asked to judge general novelty and significance instead.
pub fn build_prompt(candidate: &CandidatePaper, digest: &LibraryDigest) -> String {
  let mut prompt = String::new();
  if digest.is_empty() {
    prompt.push_str(
      "The researcher's library is empty. Rate the paper on its novelty and likely significance \
       for someone starting to read in its field.\n\n",
    );
  } else {
    prompt.push_str("Papers in the researcher's library:\n");
    prompt.push_str(&digest.render());
    prompt.push('\n');
  }

  prompt.push_str("Candidate paper:\n");
  prompt.push_str(&format!("Title: {}\n", candidate.title));
  prompt.push_str(&format!("Authors: {}\n", candidate.authors.join(", ")));
  if let Some(text) = &candidate.abstract_text {
    prompt.push_str(&format!("Abstract: {}\n", digest.truncate_abstract(text)));
  }
  if candidate.source == SourceKind::Related {
    if let Some(anchor) = &candidate.anchor {
      prompt.push_str(&format!("Found because it relates to: {anchor}\n"));
    }
  }
  prompt
}
