//! Bounded-time polling loop for asynchronous agent runs.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::providers::{RunInfo, RunStatus, RunStatusSource};
use crate::retry::RetryPolicy;

/// Starting interval between status checks.
const INITIAL_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Interval growth factor per non-terminal poll.
const POLL_BACKOFF_FACTOR: f64 = 1.5;
/// Upper bound on the interval between status checks.
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Polls a run until it reaches a terminal status or a deadline elapses.
#[derive(Debug, Clone)]
pub struct RunPoller {
    retry: RetryPolicy,
    max_wait: Duration,
}

impl RunPoller {
    pub fn new(retry: RetryPolicy, max_wait: Duration) -> Self {
        Self { retry, max_wait }
    }

    /// Await completion of a run.
    ///
    /// Returns the final run info and status for terminal runs, or
    /// `(None, Timeout)` once `max_wait` has elapsed. A failed status check
    /// does not abort the loop; the same backoff applies and polling
    /// continues.
    pub async fn await_completion<S>(
        &self,
        source: &S,
        thread_id: &str,
        run_id: &str,
    ) -> (Option<RunInfo>, RunStatus)
    where
        S: RunStatusSource + ?Sized,
    {
        let started = Instant::now();
        let mut interval = INITIAL_POLL_INTERVAL;

        loop {
            if started.elapsed() >= self.max_wait {
                warn!(
                    "Run {} did not complete within {:?}, giving up",
                    run_id, self.max_wait
                );
                return (None, RunStatus::Timeout);
            }

            match self
                .retry
                .execute(|| source.run_status(thread_id, run_id))
                .await
            {
                Ok(run) if run.status.is_terminal() => {
                    debug!("Run {} finished with status {}", run_id, run.status);
                    let status = run.status;
                    return (Some(run), status);
                }
                Ok(run) => {
                    debug!("Run {} still {}, polling again", run_id, run.status);
                }
                Err(e) => {
                    warn!("Status check for run {} failed, continuing: {}", run_id, e);
                }
            }

            tokio::time::sleep(interval).await;
            interval = interval.mul_f64(POLL_BACKOFF_FACTOR).min(MAX_POLL_INTERVAL);
        }
    }
}
