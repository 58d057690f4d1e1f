//! Staggered refresh scheduling with a global watchdog.
//!
//! Every product key gets exactly one fetch, the i-th starting at
//! `base_interval × i` after the run begins. Independently, a watchdog fires
//! at `timeout`; when it does, all outstanding fetches are aborted whether
//! or not they have started. The run always ends at the watchdog, even when
//! every fetch finished long before it.
//!
//! Fetch failures are logged and counted, never retried.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{Instant, sleep_until};

use storefront_storage::ProductKey;

use crate::fetch::{FetchError, ProductFetcher};

/// Process exit status once the watchdog fires.
pub const WATCHDOG_EXIT_CODE: i32 = 22;

/// Tally of a run, taken when the watchdog fired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Fetches that began before the deadline.
    pub started: usize,
    /// Fetches aborted by the watchdog, started or not.
    pub pending: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RefreshOutcome {
    pub fn exit_code(&self) -> i32 {
        WATCHDOG_EXIT_CODE
    }
}

pub struct RefreshScheduler {
    fetcher: Arc<dyn ProductFetcher>,
    products: Vec<ProductKey>,
    base_interval: Duration,
    timeout: Duration,
}

impl RefreshScheduler {
    pub fn new(
        fetcher: Arc<dyn ProductFetcher>,
        products: Vec<ProductKey>,
        base_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            products,
            base_interval,
            timeout,
        }
    }

    /// Start offset of the fetch at `index`.
    pub fn offset(&self, index: usize) -> Duration {
        self.base_interval
            .saturating_mul(u32::try_from(index).unwrap_or(u32::MAX))
    }

    /// True when the watchdog would fire before the last fetch starts.
    pub fn last_fetch_preempted(&self) -> bool {
        match self.products.len() {
            0 => false,
            n => self.timeout <= self.offset(n - 1),
        }
    }

    /// Logs a warning if some fetches can never run. Not enforced.
    pub fn warn_if_misconfigured(&self) {
        if self.last_fetch_preempted() {
            tracing::warn!(
                products = self.products.len(),
                base_interval_ms = self.base_interval.as_millis() as u64,
                timeout_ms = self.timeout.as_millis() as u64,
                last_offset_ms = self.offset(self.products.len().saturating_sub(1)).as_millis() as u64,
                "watchdog timeout is not longer than the last fetch offset; some products will not be refreshed"
            );
        }
    }

    pub async fn run(self) -> RefreshOutcome {
        let start = Instant::now();
        let started = Arc::new(AtomicUsize::new(0));
        let mut tasks: JoinSet<(ProductKey, Result<(), FetchError>)> = JoinSet::new();

        for (index, key) in self.products.iter().cloned().enumerate() {
            let at = start + self.offset(index);
            let fetcher = Arc::clone(&self.fetcher);
            let started = Arc::clone(&started);
            tasks.spawn(async move {
                sleep_until(at).await;
                started.fetch_add(1, Ordering::SeqCst);
                tracing::info!(key = %key, index, "refresh fetch started");
                let result = fetcher.fetch(&key).await;
                (key, result)
            });
        }
        tracing::info!(
            products = self.products.len(),
            timeout_ms = self.timeout.as_millis() as u64,
            "refresh scheduled"
        );

        let watchdog = sleep_until(start + self.timeout);
        tokio::pin!(watchdog);

        let (mut succeeded, mut failed) = (0, 0);
        let mut drained = false;
        loop {
            tokio::select! {
                biased;

                _ = &mut watchdog => {
                    let pending = tasks.len();
                    tasks.abort_all();
                    let started = started.load(Ordering::SeqCst);
                    tracing::warn!(started, pending, succeeded, failed, "timeout");
                    return RefreshOutcome { started, pending, succeeded, failed };
                }
                joined = tasks.join_next(), if !drained => match joined {
                    None => {
                        drained = true;
                        tracing::info!(succeeded, failed, "all refresh fetches finished, waiting for watchdog");
                    }
                    Some(Ok((key, Ok(())))) => {
                        succeeded += 1;
                        tracing::info!(key = %key, "refresh fetch succeeded");
                    }
                    Some(Ok((key, Err(e)))) => {
                        failed += 1;
                        tracing::error!(key = %key, error = %e, "refresh fetch failed");
                    }
                    Some(Err(e)) => {
                        failed += 1;
                        tracing::error!(error = %e, "refresh task panicked");
                    }
                },
            }
        }
    }
}
