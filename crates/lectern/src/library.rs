//! The narrow interface through which the pipeline sees the user's library.
//!
//! The library itself is owned by whatever stores and edits papers; recommendation code only
//! asks for a point-in-time snapshot, once per regeneration run, and never writes back.

use super::*;

/// Read-only access to the saved papers.
///
/// # Examples
///
/// ```
/// use lectern::{library::LibrarySource, paper::LibraryPaper};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let library = vec![LibraryPaper::new("Attention Is All You Need", vec!["Vaswani".into()])];
/// let snapshot = library.get_library_snapshot().await?;
/// assert_eq!(snapshot.len(), 1);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait LibrarySource: Send + Sync {
  /// Returns every saved paper as of one consistent point in time.
  async fn get_library_snapshot(&self) -> Result<Vec<LibraryPaper>>;
}

#[async_trait]
impl LibrarySource for Vec<LibraryPaper> {
  async fn get_library_snapshot(&self) -> Result<Vec<LibraryPaper>> { Ok(self.clone()) }
}

#[async_trait]
impl<T: LibrarySource + ?Sized> LibrarySource for Arc<T> {
  async fn get_library_snapshot(&self) -> Result<Vec<LibraryPaper>> {
    (**self).get_library_snapshot().await
  }
}

/// Picks the papers the citation graph is asked about: most recently added first, arXiv-tagged
/// only, at most `max`.
pub fn select_anchors(library: &[LibraryPaper], max: usize) -> Vec<LibraryPaper> {
  let mut anchors: Vec<_> = library.iter().filter(|p| p.arxiv_id.is_some()).cloned().collect();
  anchors.sort_by(|a, b| b.added_at.cmp(&a.added_at));
  anchors.truncate(max);
  anchors
}

#[cfg(test)]
mod tests {
  use chrono::Duration as ChronoDuration;

  use super::*;

  #[test]
  fn test_select_anchors() {
    let now = Utc::now();
    let library = vec![
      LibraryPaper::new("Old", vec![]).with_arxiv_id("1001.00001").with_added_at(now),
      LibraryPaper::new("Untagged", vec![]).with_added_at(now + ChronoDuration::days(2)),
      LibraryPaper::new("Newest", vec![])
        .with_arxiv_id("2001.00001")
        .with_added_at(now + ChronoDuration::days(1)),
    ];

    let anchors = select_anchors(&library, 10);
    let titles: Vec<_> = anchors.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Newest", "Old"]);

    assert_eq!(select_anchors(&library, 1).len(), 1);
    assert!(select_anchors(&[], 10).is_empty());
  }

  #[tokio::test]
  async fn test_vec_snapshot() {
    let library = Arc::new(vec![LibraryPaper::new("Only", vec!["Me".into()])]);
    let snapshot = library.get_library_snapshot().await.unwrap();
    assert_eq!(snapshot[0].title, "Only");
  }
}
