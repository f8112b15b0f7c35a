//! Local SQLite store holding the user's library.
//!
//! Recommendation code only ever reads from here through [`LibrarySource`]. Writing is limited
//! to [`Database::save_paper`], which seeds the store from the CLI and from tests; editing,
//! tagging and removing papers belong to the application around this crate.
//!
//! The schema is created when the database is opened, if it does not exist yet.
//!
//! # Examples
//!
//! ```no_run
//! use lectern::{database::Database, library::LibrarySource, paper::LibraryPaper};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::open(Database::default_path()).await?;
//! db.save_paper(&LibraryPaper::new("Attention Is All You Need", vec!["Vaswani".into()]))
//!   .await?;
//!
//! let snapshot = db.get_library_snapshot().await?;
//! println!("{} papers in the library", snapshot.len());
//! # Ok(())
//! # }
//! ```

use rusqlite::params;
use tokio_rusqlite::Connection;

use super::*;

/// Handle for the library database.
pub struct Database {
  /// Async SQLite connection handle
  conn: Connection,
}

impl Database {
  /// Opens an existing database or creates a new one at the specified path.
  ///
  /// Parent directories are created as needed and the schema is applied.
  ///
  /// # Errors
  ///
  /// Returns a [`LecternError`] if the directory or file cannot be created, or the schema
  /// cannot be applied.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
      if !parent.as_os_str().is_empty() {
        std::fs::create_dir_all(parent)?;
      }
    }
    debug!("Opening library database at {}", path.display());
    let conn = Connection::open(path).await?;

    conn
      .call(|conn| {
        conn.execute_batch(include_str!(concat!(
          env!("CARGO_MANIFEST_DIR"),
          "/migrations/init.sql"
        )))?;
        Ok(())
      })
      .await?;

    Ok(Self { conn })
  }

  /// Returns the default path for the database file.
  ///
  /// - On Unix: `~/.local/share/lectern/lectern.db`
  /// - On macOS: `~/Library/Application Support/lectern/lectern.db`
  /// - On Windows: `%APPDATA%\lectern\lectern.db`
  /// - Fallback: `./lectern/lectern.db`
  pub fn default_path() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("lectern").join("lectern.db")
  }

  /// Saves a paper and its authors, returning the new row id.
  ///
  /// Authors keep their order. A paper whose arXiv id is already stored is rejected by the
  /// schema's uniqueness constraint.
  pub async fn save_paper(&self, paper: &LibraryPaper) -> Result<i64> {
    let paper = paper.clone();
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let paper_id = {
          let mut stmt = tx.prepare_cached(
            "INSERT INTO papers (title, abstract_text, arxiv_id, publication_date, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id",
          )?;
          stmt.query_row(
            params![
              &paper.title,
              &paper.abstract_text,
              &paper.arxiv_id,
              &paper.publication_date,
              &paper.added_at,
            ],
            |row| row.get::<_, i64>(0),
          )?
        };

        {
          let mut stmt = tx.prepare_cached(
            "INSERT INTO authors (paper_id, position, name) VALUES (?1, ?2, ?3)",
          )?;
          for (position, name) in paper.authors.iter().enumerate() {
            stmt.execute(params![paper_id, position as i64, name])?;
          }
        }

        tx.commit()?;
        Ok(paper_id)
      })
      .await
      .map_err(LecternError::from)
  }

  /// Reads every paper, most recently added first, within a single transaction.
  pub async fn snapshot(&self) -> Result<Vec<LibraryPaper>> {
    self
      .conn
      .call(|conn| {
        let tx = conn.transaction()?;

        let mut authors: HashMap<i64, Vec<String>> = HashMap::new();
        {
          let mut stmt =
            tx.prepare_cached("SELECT paper_id, name FROM authors ORDER BY paper_id, position")?;
          let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
          for row in rows {
            let (paper_id, name) = row?;
            authors.entry(paper_id).or_default().push(name);
          }
        }

        let papers = {
          let mut stmt = tx.prepare_cached(
            "SELECT id, title, abstract_text, arxiv_id, publication_date, added_at
             FROM papers
             ORDER BY added_at DESC, id DESC",
          )?;
          let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            Ok(LibraryPaper {
              title:            row.get(1)?,
              authors:          authors.remove(&id).unwrap_or_default(),
              abstract_text:    row.get(2)?,
              arxiv_id:         row.get(3)?,
              publication_date: row.get(4)?,
              added_at:         row.get(5)?,
            })
          })?;
          rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        tx.commit()?;
        Ok(papers)
      })
      .await
      .map_err(LecternError::from)
  }
}

#[async_trait]
impl LibrarySource for Database {
  async fn get_library_snapshot(&self) -> Result<Vec<LibraryPaper>> {
    self.snapshot().await.map_err(|e| LecternError::LibraryUnavailable(e.to_string()))
  }
}
