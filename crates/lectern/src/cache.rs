//! The recommendation cache: the only way the application reads recommendations.
//!
//! One slot holds the latest [`RecommendationBatch`]. The slot is in one of these states:
//!
//! - [`CacheState::Empty`]: nothing generated yet. Reads wait for the first run.
//! - [`CacheState::Fresh`]: the batch is younger than the freshness window. Reads return it.
//! - [`CacheState::Stale`]: the window elapsed or [`RecommendationCache::invalidate`] was called.
//!   Reads return the batch right away and start a refresh in the background.
//! - [`CacheState::Refreshing`]: a run is in flight; reads keep getting the current batch.
//!
//! A forced read always joins or starts a run and waits for it.
//!
//! At most one run is in flight at any time. Every caller that needs a run while one is going
//! awaits that same run and receives the same batch. Runs are spawned onto the runtime, so a
//! caller giving up does not cancel them; the result still lands in the slot for later readers.
//!
//! A failed run never clears the slot. Callers get the previous batch with the failure attached
//! as [`Recommendations::warning`]; only when there is no previous batch does the failure
//! become an error. For [`FAILURE_BACKOFF`] after a failed run, stale reads do not start
//! another one; forced reads still do.
//!
//! An [`invalidate`](RecommendationCache::invalidate) that lands while a run is in flight
//! outlives that run: its batch is stored but stays stale.
//!
//! # Examples
//!
//! ```no_run
//! use lectern::{cache::RecommendationCache, configuration::Config, pipeline::Pipeline};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let cache = RecommendationCache::new(Pipeline::from_config(&config).await?, config.freshness());
//!
//! let recommendations = cache.get_recommendations(false).await?;
//! if let Some(warning) = &recommendations.warning {
//!   eprintln!("Showing older recommendations: {warning}");
//! }
//!
//! // After a bulk import the next read should refresh.
//! cache.invalidate();
//! # Ok(())
//! # }
//! ```

use std::{
  panic::AssertUnwindSafe,
  sync::{Mutex, MutexGuard, PoisonError},
};

use futures::{
  future::{BoxFuture, Shared},
  FutureExt,
};
use tokio::time::Instant;

use super::*;
use crate::pipeline::Regenerator;

/// Outcome of a run as every awaiting caller sees it.
type RunOutcome = std::result::Result<Arc<RecommendationBatch>, Arc<LecternError>>;

/// A run that any number of callers can await.
type SharedRun = Shared<BoxFuture<'static, RunOutcome>>;

/// How long stale reads wait after a failed run before starting another.
pub const FAILURE_BACKOFF: Duration = Duration::from_secs(60);

/// Where the cache slot stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
  /// No batch yet
  Empty,
  /// Batch within its freshness window
  Fresh,
  /// Batch past its window or invalidated
  Stale,
  /// A run is in flight
  Refreshing,
}

/// What a read returns.
#[derive(Debug, Clone)]
pub struct Recommendations {
  /// The batch being served
  pub batch:   Arc<RecommendationBatch>,
  /// Set when the latest run failed and `batch` is older than it should be
  pub warning: Option<Arc<LecternError>>,
}

/// The cache slot.
#[derive(Default)]
struct Slot {
  /// Latest successful batch
  batch:        Option<Arc<RecommendationBatch>>,
  /// When `batch` was stored
  stored_at:    Option<Instant>,
  /// Set by `invalidate`, cleared by the next successful run that started after it
  invalidated:  bool,
  /// Bumped by every `invalidate`
  epoch:        u64,
  /// Failure of the latest run, cleared by the next successful run
  last_failure: Option<Arc<LecternError>>,
  /// When the latest run failed
  failed_at:    Option<Instant>,
  /// The run in flight
  in_flight:    Option<SharedRun>,
}

/// State shared between the cache handles and the runs they spawn.
struct Inner {
  /// What produces batches
  regenerator: Arc<dyn Regenerator>,
  /// How long a batch stays fresh
  freshness:   Duration,
  /// The slot
  slot:        Mutex<Slot>,
}

impl Inner {
  /// Locks the slot. The slot stays consistent even if a holder panicked, so poisoning is
  /// ignored.
  fn slot(&self) -> MutexGuard<'_, Slot> { self.slot.lock().unwrap_or_else(PoisonError::into_inner) }

  /// Whether a failed run is recent enough that stale reads should not retry yet.
  fn backing_off(&self, slot: &Slot) -> bool {
    slot.failed_at.is_some_and(|failed_at| failed_at.elapsed() < FAILURE_BACKOFF)
  }

  /// The stored batch if it is still fresh.
  fn fresh_batch(&self, slot: &Slot) -> Option<Arc<RecommendationBatch>> {
    match (&slot.batch, slot.stored_at) {
      (Some(batch), Some(stored_at)) if !slot.invalidated && stored_at.elapsed() < self.freshness =>
        Some(Arc::clone(batch)),
      _ => None,
    }
  }
}

/// Stale-while-revalidate cache of recommendation batches with single-flight regeneration.
///
/// Cloning gives another handle to the same slot.
#[derive(Clone)]
pub struct RecommendationCache {
  /// Shared state
  inner: Arc<Inner>,
}

impl RecommendationCache {
  /// Creates an empty cache regenerating through `regenerator`.
  pub fn new(regenerator: impl Regenerator, freshness: Duration) -> Self {
    Self::from_arc(Arc::new(regenerator), freshness)
  }

  /// Creates an empty cache from a shared regenerator.
  pub fn from_arc(regenerator: Arc<dyn Regenerator>, freshness: Duration) -> Self {
    Self {
      inner: Arc::new(Inner { regenerator, freshness, slot: Mutex::new(Slot::default()) }),
    }
  }

  /// Returns recommendations, regenerating as the slot's state requires.
  ///
  /// Without `force_refresh`, a fresh or stale batch is returned without waiting; a stale one
  /// also starts a background run. With `force_refresh`, or when the slot is empty, the caller
  /// waits for a run, joining the one in flight if there is one.
  ///
  /// # Errors
  ///
  /// Only when no batch exists and the run failed; the error is [`LecternError::Refresh`].
  pub async fn get_recommendations(&self, force_refresh: bool) -> Result<Recommendations> {
    let run = {
      let mut slot = self.inner.slot();
      match slot.batch.clone() {
        Some(batch) if !force_refresh => {
          if self.inner.fresh_batch(&slot).is_some() {
            trace!("Serving fresh recommendations");
          } else if self.inner.backing_off(&slot) && slot.in_flight.is_none() {
            debug!("Serving stale recommendations, last refresh failed recently");
          } else {
            debug!("Serving stale recommendations while refreshing");
            self.start_run(&mut slot);
          }
          return Ok(Recommendations { batch, warning: slot.last_failure.clone() });
        },
        _ => self.start_run(&mut slot),
      }
    };

    match run.await {
      Ok(batch) => Ok(Recommendations { batch, warning: None }),
      Err(failure) => {
        let current = self.current();
        match current {
          Some(batch) => Ok(Recommendations { batch, warning: Some(failure) }),
          None => Err(LecternError::Refresh(failure)),
        }
      },
    }
  }

  /// Marks the current batch stale without waiting for anything.
  ///
  /// The next read returns it once more and refreshes in the background. A run already in
  /// flight read the library before this call, so its batch is stored stale as well.
  pub fn invalidate(&self) {
    let mut slot = self.inner.slot();
    if slot.batch.is_some() || slot.in_flight.is_some() {
      info!("Recommendations invalidated");
      slot.epoch += 1;
      slot.invalidated = true;
      slot.failed_at = None;
    }
  }

  /// Where the slot stands right now.
  pub fn state(&self) -> CacheState {
    let slot = self.inner.slot();
    if slot.in_flight.is_some() {
      CacheState::Refreshing
    } else if slot.batch.is_none() {
      CacheState::Empty
    } else if self.inner.fresh_batch(&slot).is_some() {
      CacheState::Fresh
    } else {
      CacheState::Stale
    }
  }

  /// The stored batch, whatever its freshness, without starting anything.
  pub fn current(&self) -> Option<Arc<RecommendationBatch>> { self.inner.slot().batch.clone() }

  /// Failure of the latest run, if it failed.
  pub fn last_failure(&self) -> Option<Arc<LecternError>> {
    self.inner.slot().last_failure.clone()
  }

  /// Returns the run in flight, or spawns a new one.
  fn start_run(&self, slot: &mut Slot) -> SharedRun {
    if let Some(run) = &slot.in_flight {
      trace!("Joining the regeneration in flight");
      return run.clone();
    }

    let previous = self.inner.fresh_batch(slot);
    let epoch = slot.epoch;
    let inner = Arc::clone(&self.inner);
    let run = async move {
      let outcome: RunOutcome =
        match AssertUnwindSafe(inner.regenerator.regenerate(previous)).catch_unwind().await {
          Ok(Ok(batch)) => Ok(Arc::new(batch)),
          Ok(Err(e)) => Err(Arc::new(e)),
          Err(_) => Err(Arc::new(LecternError::RegenerationFailed("regeneration panicked".into()))),
        };

      let mut slot = inner.slot();
      match &outcome {
        Ok(batch) => {
          slot.batch = Some(Arc::clone(batch));
          slot.stored_at = Some(Instant::now());
          slot.invalidated = slot.epoch != epoch;
          slot.last_failure = None;
          slot.failed_at = None;
        },
        Err(e) => {
          warn!("Regeneration failed, keeping the previous batch: {e}");
          slot.last_failure = Some(Arc::clone(e));
          slot.failed_at = Some(Instant::now());
        },
      }
      slot.in_flight = None;
      outcome
    }
    .boxed()
    .shared();

    slot.in_flight = Some(run.clone());
    tokio::spawn(run.clone());
    run
  }
}
