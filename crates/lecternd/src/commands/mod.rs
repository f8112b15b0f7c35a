//! Subcommands of the `lectern` CLI, one module per command.

use super::*;

pub mod init;
pub mod recommend;

pub use init::{init, InitOptions};
pub use recommend::{recommend, RecommendOptions};

/// Available commands for the CLI
#[derive(Subcommand, Clone)]
pub enum Commands {
  /// Write a configuration file and create the library database
  Init(InitOptions),

  /// Show recommended papers
  Recommend(RecommendOptions),
}
