//! End-to-end runs over stub services.

use lectern::{affinity::{match_authors, AuthorIndex}, dedupe::dedupe};

use super::*;

#[traced_test]
#[tokio::test]
async fn test_new_paper_already_in_library_is_dropped() -> TestResult<()> {
  let outage = Outage::default();
  let pipeline = stub_pipeline(
    vec![attention()],
    vec![
      new_candidate("Attention Is All You Need (v7)", "1706.03762v7", "Ashish Vaswani"),
      new_candidate("Linear Attention Without Tears", "2402.01234", "A. Smith"),
    ],
    Vec::new(),
    StubOracle::scoring(6.5),
    &outage,
  );
  let cache = RecommendationCache::new(pipeline, Duration::from_secs(3600));

  let recommendations = cache.get_recommendations(false).await?;
  let new_papers = &recommendations.batch.new_papers;
  assert_eq!(new_papers.len(), 1);
  assert_eq!(new_papers[0].candidate.title, "Linear Attention Without Tears");
  assert!((0.0..=10.0).contains(&new_papers[0].relevance_score));
  assert!(!new_papers[0].explanation.is_empty());
  assert!(recommendations.warning.is_none());
  Ok(())
}

#[tokio::test]
async fn test_related_paper_keeps_source_citation_count() -> TestResult<()> {
  let outage = Outage::default();
  let pipeline = stub_pipeline(
    vec![attention()],
    Vec::new(),
    vec![related_candidate("Scaling Laws for Neural Language Models", 1500)],
    StubOracle::scoring(7.0),
    &outage,
  );
  let batch = pipeline.run(None).await?;

  assert_eq!(batch.related_papers.len(), 1);
  let related = &batch.related_papers[0];
  assert_eq!(related.citation_count, Some(1500));
  assert_eq!(related.relevance_score, 7.0);
  assert_eq!(related.candidate.anchor.as_deref(), Some("Attention Is All You Need"));
  Ok(())
}

#[tokio::test]
async fn test_outage_during_forced_refresh_serves_previous_batch() -> TestResult<()> {
  let outage = Outage::default();
  let pipeline = stub_pipeline(
    vec![attention()],
    vec![new_candidate("Linear Attention Without Tears", "2402.01234", "A. Smith")],
    vec![related_candidate("Scaling Laws for Neural Language Models", 1500)],
    StubOracle::scoring(6.0),
    &outage,
  );
  let cache = RecommendationCache::new(pipeline, Duration::from_secs(3600));
  let first = cache.get_recommendations(false).await?;
  assert_eq!(cache.state(), CacheState::Fresh);

  outage.start();
  let forced = cache.get_recommendations(true).await?;
  assert_eq!(forced.batch.generated_at, first.batch.generated_at);
  assert_eq!(forced.batch.new_papers.len(), 1);
  assert!(matches!(forced.warning.as_deref(), Some(LecternError::RegenerationFailed(_))));
  assert!(cache.last_failure().is_some());

  outage.end();
  let recovered = cache.get_recommendations(true).await?;
  assert!(recovered.warning.is_none());
  assert!(recovered.batch.generated_at >= first.batch.generated_at);
  Ok(())
}

#[tokio::test]
async fn test_outage_on_first_run_is_an_error() {
  let outage = Outage::default();
  outage.start();
  let pipeline = stub_pipeline(
    vec![attention()],
    vec![new_candidate("Linear Attention Without Tears", "2402.01234", "A. Smith")],
    Vec::new(),
    StubOracle::scoring(6.0),
    &outage,
  );
  let cache = RecommendationCache::new(pipeline, Duration::from_secs(3600));

  let err = cache.get_recommendations(false).await.unwrap_err();
  assert!(matches!(err, LecternError::Refresh(_)));
  assert_eq!(cache.state(), CacheState::Empty);
}

#[tokio::test]
async fn test_concurrent_forced_refreshes_share_one_run() -> TestResult<()> {
  let outage = Outage::default();
  let oracle = Arc::new(StubOracle::scoring(6.0));
  let pipeline = Pipeline::new(
    Arc::new(vec![attention()]),
    CandidateSources::new(
      Arc::new(StubIndex {
        papers: vec![new_candidate("Linear Attention Without Tears", "2402.01234", "A. Smith")],
        outage: outage.clone(),
      }),
      Arc::new(StubGraph { papers: Vec::new(), outage }),
    ),
    RelevanceScorer::new(oracle.clone(), ScoringSettings::default()),
    PipelineSettings::default(),
  );
  let cache = RecommendationCache::new(pipeline, Duration::from_secs(3600));

  let (a, b) = tokio::join!(cache.get_recommendations(true), cache.get_recommendations(true));
  let (a, b) = (a?, b?);
  assert!(Arc::ptr_eq(&a.batch, &b.batch));
  assert_eq!(oracle.calls(), 1);
  Ok(())
}

#[tokio::test]
async fn test_oracle_noise_never_drops_papers() -> TestResult<()> {
  let outage = Outage::default();
  let oracle = StubOracle::scoring(6.0)
    .with_reply_for("Rambling", StubReply::Text("What a lovely paper. Truly.".into()))
    .with_reply_for("Overexcited", StubReply::Text("SCORE: 42\nEXPLANATION: best ever".into()))
    .with_reply_for("Offline", StubReply::Unavailable);
  let pipeline = stub_pipeline(
    vec![attention()],
    vec![
      new_candidate("Rambling", "2402.00001", "A"),
      new_candidate("Overexcited", "2402.00002", "B"),
      new_candidate("Offline", "2402.00003", "C"),
    ],
    Vec::new(),
    oracle,
    &outage,
  );
  let batch = pipeline.run(None).await?;

  assert_eq!(batch.new_papers.len(), 3);
  assert_eq!(batch.new_papers[0].candidate.title, "Overexcited");
  assert_eq!(batch.new_papers[0].relevance_score, 10.0);
  for paper in &batch.new_papers[1..] {
    assert_eq!(paper.relevance_score, 5.0);
    assert!(paper.fallback);
    assert!(!paper.explanation.is_empty());
  }
  Ok(())
}

#[tokio::test]
async fn test_library_from_database() -> TestResult<()> {
  let (db, _dir) = setup_test_db().await;
  db.save_paper(&attention()).await?;
  assert_eq!(db.get_library_snapshot().await?.len(), 1);

  let outage = Outage::default();
  let pipeline = Pipeline::new(
    Arc::new(db),
    CandidateSources::new(
      Arc::new(StubIndex {
        papers: vec![
          new_candidate("Attention Is All You Need", "1706.03762", "Vaswani"),
          new_candidate("Sparse Transformers", "1904.10509", "shazeer"),
        ],
        outage: outage.clone(),
      }),
      Arc::new(StubGraph { papers: Vec::new(), outage }),
    ),
    RelevanceScorer::new(Arc::new(StubOracle::scoring(8.0)), ScoringSettings::default()),
    PipelineSettings::default(),
  );
  let batch = pipeline.run(None).await?;

  assert_eq!(batch.new_papers.len(), 1);
  let paper = &batch.new_papers[0];
  assert_eq!(paper.author_affinity.len(), 1);
  assert_eq!(paper.author_affinity[0].library_titles, vec!["Attention Is All You Need"]);
  Ok(())
}

#[test]
fn test_author_matcher_ignores_case_and_spacing() {
  let library = vec![LibraryPaper::new("Graph Things", vec!["A. Smith".into()])];
  let candidate = CandidatePaper::new("Candidate", vec!["a.  smith".into()], SourceKind::New);

  let matches = match_authors(&candidate, &AuthorIndex::build(&library));
  assert_eq!(matches.len(), 1);
  assert_eq!(matches[0].library_titles, vec!["Graph Things"]);
}

#[test]
fn test_dedupe_excludes_library_and_is_idempotent() {
  let library = vec![
    attention(),
    LibraryPaper::new("Deep Residual Learning for Image Recognition", vec!["He".into()]),
  ];
  let titles = [
    "Deep residual learning for image recognition!",
    "Attention is all you need",
    "Mixture of Experts",
    "mixture   of experts",
    "Sparse Transformers",
  ];
  let candidates: Vec<_> = titles
    .iter()
    .enumerate()
    .flat_map(|(i, title)| {
      let untagged = CandidatePaper::new(*title, vec!["X".into()], SourceKind::New);
      let tagged = untagged.clone().with_arxiv_id(&format!("2403.{:05}", i));
      [untagged, tagged]
    })
    .collect();

  let once = dedupe(candidates, &library, None);
  for candidate in &once {
    assert!(library.iter().all(|paper| !paper.identity().matches(&candidate.identity())));
  }
  assert_eq!(dedupe(once.clone(), &library, None), once);
}
