//! Errors surfaced by the command line front end.

use std::path::PathBuf;

use lectern::error::LecternError;
use thiserror::Error;

/// Error type alias used for the CLI.
pub type Result<T> = core::result::Result<T, LecterndError>;

/// Errors that end a CLI invocation.
#[derive(Error, Debug)]
pub enum LecterndError {
  /// Anything the library reports.
  #[error(transparent)]
  Lectern(#[from] LecternError),

  /// There is no library database yet.
  #[error("No library database at {0:?}. Run `lectern init` first.")]
  NotInitialized(PathBuf),

  /// Output could not be encoded.
  #[error(transparent)]
  Json(#[from] serde_json::Error),
}
