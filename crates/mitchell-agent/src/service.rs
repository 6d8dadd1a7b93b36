//! The Agent Service (C9): the top-level poll-dispatch-shutdown loop, per
//! spec §4.9.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use mitchell_browser::WorkerPool;
use mitchell_poller::MultiServerPoller;
use mitchell_types::{AgentResult, Request};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::handler::RequestHandler;

/// Consecutive claim/submit failures after which the service stops itself,
/// per spec §4.9 step 4c and §7's `ServerUnreachable` row.
const CONSECUTIVE_ERROR_THRESHOLD: u32 = 10;

/// How long shutdown waits for in-flight requests before giving up and
/// letting `WorkerPool::stop` kill their browsers out from under them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Polls every configured server, claims and dispatches pending requests
/// onto the Worker Pool, and submits results back, until told to shut down
/// or until it trips its own consecutive-error circuit breaker.
pub struct AgentService {
    pool: Arc<WorkerPool>,
    poller: Arc<MultiServerPoller>,
    handler: Arc<RequestHandler>,
    poll_interval: Duration,
    error_backoff: Duration,
    /// Defense-in-depth bound alongside the Pool's own acquisition
    /// semaphore, per spec §4.9's concurrency invariant.
    request_semaphore: Arc<Semaphore>,
    consecutive_errors: Arc<AtomicU32>,
    shutdown: CancellationToken,
    tasks: Mutex<JoinSet<()>>,
}

impl AgentService {
    pub fn new(
        pool: Arc<WorkerPool>,
        poller: Arc<MultiServerPoller>,
        handler: Arc<RequestHandler>,
        max_workers: usize,
        poll_interval: Duration,
        error_backoff: Duration,
    ) -> Self {
        Self {
            pool,
            poller,
            handler,
            poll_interval,
            error_backoff,
            request_semaphore: Arc::new(Semaphore::new(max_workers)),
            consecutive_errors: Arc::new(AtomicU32::new(0)),
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// A token `main` can cancel (e.g. from a `ctrl_c` handler) to begin a
    /// graceful shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Starts the Worker Pool, ensures a clean starting session state, and
    /// runs the poll loop until cancellation or the error circuit breaker
    /// trips. Always runs `shutdown` on the way out, even on an early
    /// return from the circuit breaker.
    pub async fn run(&self) -> mitchell_types::Result<()> {
        self.pool.start().await?;
        self.pool.ensure_clean_state().await?;

        let tripped = self.poll_loop().await;
        self.shutdown().await;

        if tripped {
            return Err(mitchell_types::Error::new(
                mitchell_types::ErrorKind::ServerUnreachable,
                format!("stopped after {CONSECUTIVE_ERROR_THRESHOLD} consecutive claim/submit failures"),
            ));
        }
        Ok(())
    }

    /// Returns `true` if the loop exited because the error circuit breaker
    /// tripped, `false` if it exited because of a shutdown request.
    async fn poll_loop(&self) -> bool {
        loop {
            if self.shutdown.is_cancelled() {
                return false;
            }

            let pending = self.poller.get_all_pending().await;

            if pending.is_empty() {
                tokio::select! {
                    _ = self.shutdown.cancelled() => return false,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
                continue;
            }

            for request in pending {
                self.spawn_one(request).await;
            }

            // Bound memory by reaping completed tasks between sweeps
            // rather than only at shutdown.
            {
                let mut tasks = self.tasks.lock().await;
                while tasks.try_join_next().is_some() {}
            }

            let errors = self.consecutive_errors.load(Ordering::SeqCst);
            if errors >= CONSECUTIVE_ERROR_THRESHOLD {
                tracing::error!(errors, "stopping after consecutive claim/submit failures");
                return true;
            }
            if errors > 0 {
                tokio::select! {
                    _ = self.shutdown.cancelled() => return false,
                    _ = tokio::time::sleep(self.error_backoff) => {}
                }
            }
        }
    }

    /// Spawns a background task for one pending request: claim → acquire a
    /// Worker → execute → submit. Claim races (404) drop the request
    /// silently; every other step's failures are logged and counted toward
    /// the consecutive-error circuit breaker.
    async fn spawn_one(&self, request: Request) {
        let pool = Arc::clone(&self.pool);
        let poller = Arc::clone(&self.poller);
        let handler = Arc::clone(&self.handler);
        let semaphore = Arc::clone(&self.request_semaphore);
        let consecutive_errors = Arc::clone(&self.consecutive_errors);

        let mut tasks = self.tasks.lock().await;
        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            process_one(pool, poller, handler, consecutive_errors, request).await;
        });
    }

    /// Stops accepting new work, waits up to [`SHUTDOWN_GRACE`] for
    /// in-flight requests, then stops the Worker Pool (which kills any
    /// still-running browsers out from under orphaned tasks).
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let mut tasks = self.tasks.lock().await;
        let waited_all = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if waited_all.is_err() {
            tracing::warn!("shutdown grace period elapsed with requests still in flight; aborting them");
            tasks.shutdown().await;
        }
        drop(tasks);

        if let Err(err) = self.pool.stop().await {
            tracing::warn!(error = %err, "worker pool stop failed during shutdown");
        }
    }
}

/// Claims, executes, and submits the result for one pending [`Request`].
/// A free function (rather than a method) so it owns everything it touches
/// and can be spawned without borrowing `self` across the task boundary.
async fn process_one(
    pool: Arc<WorkerPool>,
    poller: Arc<MultiServerPoller>,
    handler: Arc<RequestHandler>,
    consecutive_errors: Arc<AtomicU32>,
    request: Request,
) {
    match poller.claim_request(&request).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::debug!(request_id = %request.id, "claim lost to another agent");
            return;
        }
        Err(err) => {
            tracing::warn!(error = %err, request_id = %request.id, "claim_request failed");
            consecutive_errors.fetch_add(1, Ordering::SeqCst);
            return;
        }
    }

    let result = match pool.acquire().await {
        Ok(guard) => {
            let result = handler.process(guard.session(), &request).await;
            guard.release(result.success).await;
            result
        }
        Err(err) => {
            tracing::warn!(error = %err, request_id = %request.id, "no worker available for claimed request");
            AgentResult::failure(request.tool.clone(), format!("no workers available: {err}"))
        }
    };

    match poller.submit_result(&request, &result).await {
        Ok(()) => {
            consecutive_errors.store(0, Ordering::SeqCst);
        }
        Err(err) => {
            tracing::warn!(error = %err, request_id = %request.id, "submit_result failed");
            consecutive_errors.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_error_threshold_matches_spec() {
        assert_eq!(CONSECUTIVE_ERROR_THRESHOLD, 10);
    }

    #[test]
    fn shutdown_grace_matches_spec() {
        assert_eq!(SHUTDOWN_GRACE, Duration::from_secs(30));
    }
}
