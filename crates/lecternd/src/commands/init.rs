//! Module for setting up a lectern environment

use super::*;

/// Options for `lectern init`.
#[derive(Args, Clone)]
pub struct InitOptions {
  /// Where to keep the library database
  #[arg(long)]
  pub db_path: Option<PathBuf>,

  /// Overwrite an existing configuration file
  #[arg(long, action = ArgAction::SetTrue)]
  pub force: bool,
}

/// Function for the [`Commands::Init`] in the CLI.
pub async fn init(cli: &Cli, options: &InitOptions) -> Result<()> {
  let config_path = cli.config_path();
  if config_path.exists() && !options.force {
    println!(
      "{} Configuration already exists at {:?}; pass --force to overwrite it",
      style(INFO_PREFIX).cyan(),
      config_path
    );
    return Ok(());
  }

  let mut config = Config::default();
  if let Some(db_path) = &options.db_path {
    config.database_path = db_path.clone();
  }
  config.save(&config_path)?;
  debug!("Wrote configuration to {}", config_path.display());

  Database::open(&config.database_path).await?;
  println!(
    "{} Created lectern configuration with\n{} Config path: {:?}\n{} Database path: {:?}",
    style(SUCCESS_PREFIX).green(),
    TREE_BRANCH,
    config_path,
    TREE_LEAF,
    config.database_path,
  );
  Ok(())
}
