//! The Worker Pool: manages Worker lifecycle under one of three scaling
//! modes and provides scoped acquisition under a concurrency bound.
//!
//! Hand-rolled rather than built on a generic connection-pool crate: unlike
//! an interchangeable-connection pool, this pool needs per-Worker identity
//! (a unique port and profile directory per Worker, not per checkout) and
//! three qualitatively different scaling policies. See `DESIGN.md` for the
//! full rationale.

use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::config::{BrowserLaunchConfig, ScalingMode, WorkerPoolConfig};
use crate::error::{BrowserError, BrowserResult};
use crate::session::SessionManager;
use crate::worker::{Worker, WorkerState};

struct PoolState {
    workers: HashMap<u64, Worker>,
    next_id: u64,
}

struct PoolInner {
    config: WorkerPoolConfig,
    portal_url: String,
    username: String,
    password: String,
    state: Mutex<PoolState>,
    semaphore: Arc<Semaphore>,
    scaler_cancel: CancellationToken,
}

/// Manages Worker lifecycle for one configured scaling mode.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
    scaler: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(
        config: WorkerPoolConfig,
        portal_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let concurrency = config.concurrency_limit();
        let inner = Arc::new(PoolInner {
            config,
            portal_url: portal_url.into(),
            username: username.into(),
            password: password.into(),
            state: Mutex::new(PoolState {
                workers: HashMap::new(),
                next_id: 0,
            }),
            semaphore: Arc::new(Semaphore::new(concurrency)),
            scaler_cancel: CancellationToken::new(),
        });

        Self {
            inner,
            scaler: Mutex::new(None),
        }
    }

    /// In Pool mode, pre-spawns `min_workers` and launches the scaler
    /// task. Single and OnDemand modes have nothing to do up front beyond
    /// the semaphore, which is already sized by `concurrency_limit()`.
    pub async fn start(&self) -> BrowserResult<()> {
        if self.inner.config.mode == ScalingMode::Pool {
            for _ in 0..self.inner.config.min_workers {
                self.spawn_worker().await?;
            }
            let handle = self.inner.clone().spawn_scaler();
            *self.scaler.lock().await = Some(handle);
        }
        Ok(())
    }

    /// Acquires the concurrency semaphore, obtains an Idle Worker (spawning
    /// one if needed), and returns a scoped guard. The semaphore wait is
    /// the only suspension point this method holds the pool lock across.
    pub async fn acquire(&self) -> BrowserResult<WorkerGuard> {
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| BrowserError::operation_failed("acquire", "pool semaphore closed"))?;

        let id = if self.inner.config.mode == ScalingMode::OnDemand {
            self.spawn_worker().await?
        } else {
            self.poll_for_idle_or_spawn().await?
        };

        let session = {
            let mut state = self.inner.state.lock().await;
            let worker = state
                .workers
                .get_mut(&id)
                .ok_or_else(|| BrowserError::operation_failed("acquire", "worker vanished"))?;
            worker.mark_busy();
            worker.session()
        };

        Ok(WorkerGuard {
            pool: Arc::clone(&self.inner),
            id,
            session,
            permit: Some(permit),
            started_at: Instant::now(),
            finished: AtomicBool::new(false),
        })
    }

    async fn poll_for_idle_or_spawn(&self) -> BrowserResult<u64> {
        let deadline = Instant::now() + Duration::from_secs(30);
        loop {
            {
                let state = self.inner.state.lock().await;
                if let Some((&id, _)) = state
                    .workers
                    .iter()
                    .find(|(_, w)| w.state() == WorkerState::Idle)
                {
                    return Ok(id);
                }
                if state.workers.len() < self.inner.config.max_workers {
                    drop(state);
                    return self.spawn_worker().await;
                }
            }
            if Instant::now() >= deadline {
                return self.spawn_worker().await;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    /// Allocates a port and profile directory under the pool lock (so two
    /// concurrently spawning Workers cannot race onto the same port),
    /// registers the Worker, and starts it.
    async fn spawn_worker(&self) -> BrowserResult<u64> {
        let (id, launch_config) = {
            let mut state = self.inner.state.lock().await;
            if state.workers.len() >= self.inner.config.max_workers {
                return Err(BrowserError::operation_failed(
                    "spawn_worker",
                    "pool is at max_workers capacity",
                ));
            }

            let id = state.next_id;
            state.next_id += 1;

            let port = allocate_port(self.inner.config.base_port, &state.workers)?;
            let profile_dir = self
                .inner
                .config
                .profile_root
                .join(format!("worker-{id}"));

            let launch_config = BrowserLaunchConfig::builder()
                .with_port(port)
                .with_profile_dir(profile_dir)
                .with_headless(self.inner.config.headless)
                .build()
                .map_err(|e| BrowserError::configuration(e.to_string(), None))?;

            (id, launch_config)
        };

        let mut worker = Worker::new(
            id,
            launch_config,
            self.inner.portal_url.clone(),
            self.inner.config.idle_timeout,
            self.inner.username.clone(),
            self.inner.password.clone(),
        );
        worker.start().await?;

        self.inner.state.lock().await.workers.insert(id, worker);
        Ok(id)
    }

    /// Stops and removes the Worker with the given id.
    async fn kill_worker(&self, id: u64) -> BrowserResult<()> {
        let mut state = self.inner.state.lock().await;
        if let Some(mut worker) = state.workers.remove(&id) {
            drop(state);
            worker.stop().await?;
        }
        Ok(())
    }

    /// Cancels the scaler, stops every Worker, and clears the set.
    pub async fn stop(&self) -> BrowserResult<()> {
        self.inner.scaler_cancel.cancel();
        if let Some(handle) = self.scaler.lock().await.take() {
            handle.abort();
        }

        let ids: Vec<u64> = self.inner.state.lock().await.workers.keys().copied().collect();
        for id in ids {
            self.kill_worker(id).await?;
        }
        Ok(())
    }

    /// Attaches to any already-running Workers' browsers and logs them out,
    /// guaranteeing a clean state before the first real request. Called by
    /// the Agent Service once, at startup, after `start()`.
    pub async fn ensure_clean_state(&self) -> BrowserResult<()> {
        let state = self.inner.state.lock().await;
        for worker in state.workers.values() {
            let session = worker.session();
            let mut driver = session.driver().await;
            driver.ensure_clean_state().await?;
        }
        Ok(())
    }
}

impl PoolInner {
    fn spawn_scaler(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.scale_interval);
            loop {
                tokio::select! {
                    _ = self.scaler_cancel.cancelled() => break,
                    _ = ticker.tick() => self.evaluate_scaling().await,
                }
            }
        })
    }

    async fn evaluate_scaling(&self) {
        let mut state = self.state.lock().await;

        let idle_count = state
            .workers
            .values()
            .filter(|w| w.state() == WorkerState::Idle)
            .count();
        let live_count = state.workers.len();

        if idle_count == 0 && live_count < self.config.max_workers {
            drop(state);
            if let Err(err) = self.spawn_worker_locked().await {
                tracing::warn!(error = %err, "scaler failed to scale up");
            }
            return;
        }

        if live_count > self.config.min_workers {
            let candidate = state
                .workers
                .iter()
                .filter(|(_, w)| w.state() == WorkerState::Idle)
                .filter(|(_, w)| w.stats().idle_time() > self.config.idle_timeout)
                .max_by_key(|(_, w)| w.stats().idle_time())
                .map(|(&id, _)| id);

            if let Some(id) = candidate
                && let Some(mut worker) = state.workers.remove(&id)
            {
                drop(state);
                if let Err(err) = worker.stop().await {
                    tracing::warn!(error = %err, worker_id = id, "scale-down stop failed");
                }
            }
        }
    }

    /// Mirrors `WorkerPool::spawn_worker` but as an inherent method on
    /// `PoolInner` so the scaler (which only owns `Arc<PoolInner>`) can
    /// call it directly.
    async fn spawn_worker_locked(&self) -> BrowserResult<u64> {
        let (id, launch_config) = {
            let mut state = self.state.lock().await;
            if state.workers.len() >= self.config.max_workers {
                return Err(BrowserError::operation_failed(
                    "spawn_worker",
                    "pool is at max_workers capacity",
                ));
            }
            let id = state.next_id;
            state.next_id += 1;
            let port = allocate_port(self.config.base_port, &state.workers)?;
            let profile_dir = self.config.profile_root.join(format!("worker-{id}"));
            let launch_config = BrowserLaunchConfig::builder()
                .with_port(port)
                .with_profile_dir(profile_dir)
                .with_headless(self.config.headless)
                .build()
                .map_err(|e| BrowserError::configuration(e.to_string(), None))?;
            (id, launch_config)
        };

        let mut worker = Worker::new(
            id,
            launch_config,
            self.portal_url.clone(),
            self.config.idle_timeout,
            self.username.clone(),
            self.password.clone(),
        );
        worker.start().await?;
        self.state.lock().await.workers.insert(id, worker);
        Ok(id)
    }
}

/// Probes upward from `start` using a bind-test so two concurrently
/// spawning Workers cannot race onto the same port. Must be called while
/// holding the pool lock.
fn allocate_port(start: u16, workers: &HashMap<u64, Worker>) -> BrowserResult<u16> {
    let taken: std::collections::HashSet<u16> = workers.values().map(|w| w.port).collect();

    for port in start..=start.saturating_add(999) {
        if taken.contains(&port) {
            continue;
        }
        if TcpListener::bind(("127.0.0.1", port)).is_ok() {
            return Ok(port);
        }
    }

    Err(BrowserError::operation_failed(
        "allocate_port",
        "no free port found in the configured range",
    ))
}

/// A scoped handle to an acquired, exclusively owned Worker. On
/// [`WorkerGuard::release`], the Worker is returned to Idle (Pool/Single
/// modes) or killed (OnDemand), and the semaphore permit is dropped.
pub struct WorkerGuard {
    pool: Arc<PoolInner>,
    id: u64,
    session: Arc<SessionManager>,
    permit: Option<OwnedSemaphorePermit>,
    started_at: Instant,
    finished: AtomicBool,
}

impl WorkerGuard {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Releases the Worker back to the pool, recording whether the request
    /// it served succeeded. Must be called exactly once; a guard dropped
    /// without calling `release` is treated as a failed request so the
    /// Worker is not silently reused without its stats reflecting the
    /// outcome.
    pub async fn release(mut self, success: bool) {
        self.finished.store(true, Ordering::SeqCst);
        let elapsed = self.started_at.elapsed();

        if self.pool.config.mode == ScalingMode::OnDemand {
            let mut state = self.pool.state.lock().await;
            if let Some(mut worker) = state.workers.remove(&self.id) {
                drop(state);
                let _ = worker.stop().await;
            }
        } else {
            let mut state = self.pool.state.lock().await;
            if let Some(worker) = state.workers.get_mut(&self.id) {
                worker.mark_idle(elapsed, success);
            }
        }

        self.permit.take();
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        if !self.finished.load(Ordering::Relaxed) {
            tracing::warn!(
                worker_id = self.id,
                "WorkerGuard dropped without calling release(); worker left in Busy state"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_allocation_skips_taken_ports() {
        let workers = HashMap::new();
        let port = allocate_port(19515, &workers).unwrap();
        assert!(port >= 19515);
    }
}
