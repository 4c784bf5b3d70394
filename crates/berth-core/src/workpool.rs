//! Bounded-concurrency fan-out for batch operations.
//!
//! The state store fans out over potentially thousands of records when
//! deserializing listings or creating actual-LRP records. [`Throttler`]
//! bounds how many of those units of work run at once and reports the first
//! failure; remaining failures are logged rather than lost.
//!
//! # Guarantees
//!
//! - Every submitted work runs exactly once.
//! - No work is still running after [`Throttler::run`] returns.
//! - At most `max_workers` works execute concurrently.
//! - The returned error is the first failure observed; later failures are
//!   logged at `warn`.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{Error, Result};

/// Executes a batch of fallible works with bounded concurrency.
///
/// # Example
///
/// ```rust
/// use berth_core::workpool::Throttler;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> berth_core::Result<()> {
/// let throttler = Throttler::new(4)?;
/// let works = (0..16).map(|_| async { Ok(()) });
/// throttler.run(works).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Throttler {
    max_workers: usize,
}

impl Throttler {
    /// Creates a throttler that runs at most `max_workers` works at once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] when `max_workers` is zero.
    pub fn new(max_workers: usize) -> Result<Self> {
        if max_workers == 0 {
            return Err(Error::invalid_request("max_workers must be at least 1"));
        }
        Ok(Self { max_workers })
    }

    /// Runs every work to completion and returns the first observed error.
    ///
    /// Works begin in submission order but complete in any order; "first"
    /// means first observed completion with an error. When exactly one work
    /// fails, that error is always the one returned.
    ///
    /// # Errors
    ///
    /// Returns the first work error observed, or [`Error::Unknown`] if a
    /// work panicked.
    pub async fn run<I, F>(&self, works: I) -> Result<()>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut set = JoinSet::new();

        for work in works {
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| Error::unknown("work pool semaphore closed"))?;
                work.await
            });
        }

        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            let result = joined.unwrap_or_else(|e| Err(Error::unknown(format!("work panicked: {e}"))));
            if let Err(e) = result {
                if first_error.is_none() {
                    first_error = Some(e);
                } else {
                    tracing::warn!(error = %e, "additional work pool failure");
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn zero_workers_is_invalid() {
        let err = Throttler::new(0).expect_err("should reject zero workers");
        assert!(matches!(err, Error::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn runs_every_work_exactly_once() {
        let throttler = Throttler::new(3).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let works: Vec<_> = (0..20)
            .map(|_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .collect();

        throttler.run(works).await.expect("should succeed");
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn concurrency_stays_within_bound() {
        let max_workers = 4;
        let throttler = Throttler::new(max_workers).unwrap();

        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let works: Vec<_> = (0..32)
            .map(|_| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .collect();

        throttler.run(works).await.expect("should succeed");
        assert!(peak.load(Ordering::SeqCst) <= max_workers);
    }

    #[tokio::test]
    async fn single_error_is_returned() {
        let throttler = Throttler::new(2).unwrap();

        let works: Vec<_> = (0..10)
            .map(|i| async move {
                if i == 4 {
                    Err(Error::invalid_record("record 4 is corrupt"))
                } else {
                    Ok(())
                }
            })
            .collect();

        let err = throttler.run(works).await.expect_err("should fail");
        assert!(matches!(err, Error::InvalidRecord { .. }));
    }

    #[tokio::test]
    async fn all_works_run_even_when_one_fails() {
        let throttler = Throttler::new(2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let works: Vec<_> = (0..10)
            .map(|i| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if i == 0 {
                        Err(Error::unknown("boom"))
                    } else {
                        Ok(())
                    }
                }
            })
            .collect();

        let _ = throttler.run(works).await;
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn empty_batch_is_ok() {
        let throttler = Throttler::new(1).unwrap();
        let works: Vec<std::future::Ready<Result<()>>> = vec![];
        throttler.run(works).await.expect("should succeed");
    }
}
