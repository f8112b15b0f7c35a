//! The assembled pipeline against mocked arXiv, Semantic Scholar and Ollama endpoints.

use chrono::Utc;
use serde_json::json;
use wiremock::{
  matchers::{method, path, query_param},
  Mock, MockServer, ResponseTemplate,
};

use super::*;

fn arxiv_feed() -> String {
  let now = Utc::now().to_rfc3339();
  format!(
    r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <id>http://arxiv.org/api/query</id>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <published>{now}</published>
    <title>Attention Is All You Need</title>
    <summary>The dominant sequence transduction models.</summary>
    <author><name>Ashish Vaswani</name></author>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2403.01234v1</id>
    <published>{now}</published>
    <title>Sparse Mixtures of Attention Heads</title>
    <summary>We route tokens to heads. Code: https://github.com/acme/smah.</summary>
    <author><name>Noam Shazeer</name></author>
    <author><name>Shazeer</name></author>
  </entry>
</feed>"#
  )
}

fn chat_reply(content: &str) -> serde_json::Value {
  json!({
    "model": "llama3.2:3b",
    "message": { "role": "assistant", "content": content },
    "done": true
  })
}

async fn mount_sources(server: &MockServer) {
  Mock::given(method("GET"))
    .and(path("/api/query"))
    .and(query_param("sortBy", "submittedDate"))
    .respond_with(ResponseTemplate::new(200).set_body_string(arxiv_feed()))
    .mount(server)
    .await;
  Mock::given(method("GET"))
    .and(path("/graph/v1/paper/arXiv:1706.03762"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "paperId": "s2-attention" })))
    .mount(server)
    .await;
  Mock::given(method("GET"))
    .and(path("/recommendations/v1/papers/forpaper/s2-attention"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "recommendedPapers": [{
        "title": "Scaling Laws for Neural Language Models",
        "authors": [{ "name": "Jared Kaplan" }, { "name": "Sam McCandlish" }],
        "abstract": "We study empirical scaling laws.",
        "year": 2020,
        "publicationDate": "2020-01-23",
        "citationCount": 1500,
        "url": "https://www.semanticscholar.org/paper/s2-scaling",
        "externalIds": { "ArXiv": "2001.08361", "CorpusId": 210861095 }
      }]
    })))
    .mount(server)
    .await;
}

async fn config_for(server: &MockServer, dir: &TempDir) -> Config {
  let mut config = Config {
    database_path: dir.path().join("lectern.db"),
    topics: vec!["cs.LG".to_string()],
    arxiv_url: format!("{}/api/query", server.uri()),
    semantic_scholar_url: server.uri(),
    ..Config::default()
  };
  config.retry.base_delay_ms = 1;
  config.llm.host = server.uri();

  let db = Database::open(&config.database_path).await.unwrap();
  db.save_paper(&attention()).await.unwrap();
  config
}

#[tokio::test]
async fn test_recommendations_from_live_shaped_services() -> TestResult<()> {
  let server = MockServer::start().await;
  mount_sources(&server).await;
  Mock::given(method("POST"))
    .and(path("/api/chat"))
    .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(
      "SCORE: 8\nEXPLANATION: Extends the transformer work in your library.\nCITATIONS: 99",
    )))
    .expect(2)
    .mount(&server)
    .await;
  let dir = tempdir()?;
  let config = config_for(&server, &dir).await;

  let cache = RecommendationCache::new(Pipeline::from_config(&config).await?, config.freshness());
  let recommendations = cache.get_recommendations(false).await?;
  let batch = &recommendations.batch;

  assert_eq!(batch.new_papers.len(), 1);
  let new = &batch.new_papers[0];
  assert_eq!(new.candidate.title, "Sparse Mixtures of Attention Heads");
  assert_eq!(new.relevance_score, 8.0);
  assert_eq!(new.citation_count, None);
  assert_eq!(new.code_url.as_deref(), Some("https://github.com/acme/smah"));
  assert_eq!(new.author_affinity.len(), 1);
  assert_eq!(new.author_affinity[0].author, "Shazeer");

  assert_eq!(batch.related_papers.len(), 1);
  let related = &batch.related_papers[0];
  assert_eq!(related.candidate.arxiv_id.as_deref(), Some("2001.08361"));
  assert_eq!(related.candidate.anchor.as_deref(), Some("Attention Is All You Need"));
  assert_eq!(related.citation_count, Some(1500));
  assert!(batch.degraded_sources.is_empty());

  // Served from the slot, no further calls.
  let again = cache.get_recommendations(false).await?;
  assert!(Arc::ptr_eq(&again.batch, &recommendations.batch));
  Ok(())
}

#[tokio::test]
async fn test_model_outage_falls_back_to_neutral_scores() -> TestResult<()> {
  let server = MockServer::start().await;
  mount_sources(&server).await;
  Mock::given(method("POST"))
    .and(path("/api/chat"))
    .respond_with(ResponseTemplate::new(500))
    .mount(&server)
    .await;
  let dir = tempdir()?;
  let config = config_for(&server, &dir).await;

  let batch = Pipeline::from_config(&config).await?.run(None).await?;

  assert_eq!(batch.new_papers.len(), 1);
  assert_eq!(batch.related_papers.len(), 1);
  for paper in batch.papers() {
    assert!(paper.fallback);
    assert_eq!(paper.relevance_score, 5.0);
    assert!(!paper.explanation.is_empty());
  }
  Ok(())
}

#[tokio::test]
async fn test_every_service_down_on_first_run() -> TestResult<()> {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/api/query"))
    .respond_with(ResponseTemplate::new(503))
    .expect(3)
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path("/graph/v1/paper/arXiv:1706.03762"))
    .respond_with(ResponseTemplate::new(404))
    .expect(1)
    .mount(&server)
    .await;
  Mock::given(method("POST"))
    .and(path("/api/chat"))
    .respond_with(ResponseTemplate::new(500))
    .expect(0)
    .mount(&server)
    .await;
  let dir = tempdir()?;
  let config = config_for(&server, &dir).await;

  let cache = RecommendationCache::new(Pipeline::from_config(&config).await?, config.freshness());
  let err = cache.get_recommendations(false).await.unwrap_err();
  assert!(
    matches!(&err, LecternError::Refresh(cause) if matches!(**cause, LecternError::RegenerationFailed(_)))
  );
  assert_eq!(cache.state(), CacheState::Empty);
  Ok(())
}
