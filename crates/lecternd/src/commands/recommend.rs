//! Module for showing recommendations drawn from the configured services.

use serde_json::json;

use super::*;

/// Options for `lectern recommend`.
#[derive(Args, Clone)]
pub struct RecommendOptions {
  /// Regenerate instead of accepting a fresh batch
  #[arg(long)]
  pub refresh: bool,

  /// Print the batch as JSON
  #[arg(long)]
  pub json: bool,
}

/// Function for the [`Commands::Recommend`] in the CLI.
pub async fn recommend(cli: &Cli, options: &RecommendOptions) -> Result<()> {
  let config = Config::load(cli.config_path())?;
  if !config.database_path.exists() {
    return Err(LecterndError::NotInitialized(config.database_path));
  }

  let pipeline = Pipeline::from_config(&config).await?;
  let cache = RecommendationCache::new(pipeline, config.freshness());
  if !options.json {
    println!("{} Gathering recommendations...", style(INFO_PREFIX).cyan());
  }
  let recommendations = cache.get_recommendations(options.refresh).await?;
  let batch = &recommendations.batch;

  if let Some(warning) = &recommendations.warning {
    eprintln!(
      "{} Showing recommendations from {}: {warning}",
      style(WARNING_PREFIX).yellow(),
      batch.generated_at.format("%Y-%m-%d %H:%M UTC"),
    );
  }

  if options.json {
    let output = json!({
      "batch": &**batch,
      "warning": recommendations.warning.as_ref().map(ToString::to_string),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    return Ok(());
  }

  for source in &batch.degraded_sources {
    eprintln!("{} The {source} paper source was unavailable", style(WARNING_PREFIX).yellow());
  }
  print_list("New papers", &batch.new_papers);
  print_list("Related papers", &batch.related_papers);
  Ok(())
}

/// Prints one ranked list.
fn print_list(heading: &str, papers: &[ScoredPaper]) {
  println!("\n{}", style(heading).bold());
  if papers.is_empty() {
    println!("{} Nothing to recommend", style(INFO_PREFIX).cyan());
    return;
  }

  for paper in papers {
    let score = format!("{:>4.1}", paper.relevance_score);
    let score = if paper.fallback { style(score).dim() } else { style(score).green() };
    println!("{score}  {}", style(&paper.candidate.title).white().bold());

    let mut details = vec![paper.explanation.clone()];
    if let Some(url) = &paper.candidate.url {
      details.push(url.clone());
    }
    if let Some(anchor) = &paper.candidate.anchor {
      details.push(format!("Related to: {anchor}"));
    }
    if let Some(count) = paper.citation_count {
      details.push(format!("Citations: {count}"));
    }
    for matched in &paper.author_affinity {
      details.push(format!(
        "{} also wrote: {}",
        matched.author,
        matched.library_titles.join("; ")
      ));
    }
    if let Some(code) = &paper.code_url {
      details.push(format!("Code: {code}"));
    }

    let last = details.len() - 1;
    for (i, line) in details.iter().enumerate() {
      let branch = if i == last { TREE_LEAF } else { TREE_BRANCH };
      println!("      {} {}", style(branch).dim(), line);
    }
  }
}
