//! The Worker: one Browser Driver, one Session Manager, and the bookkeeping
//! the Worker Pool needs to scale and schedule around it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::BrowserLaunchConfig;
use crate::connection::BrowserDriver;
use crate::error::BrowserResult;
use crate::session::SessionManager;

/// `Idle`/`Busy` are the only two states the Pool and Worker mutate after
/// `start()` succeeds; `Error` marks a Worker the Pool should kill rather
/// than reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Idle,
    Busy,
    Error,
}

/// Usage statistics tracked per Worker, consulted by the Pool's scaler task
/// to pick scale-down candidates and surfaced for operational visibility.
#[derive(Debug, Clone, Copy)]
pub struct WorkerStats {
    pub requests_completed: u64,
    pub requests_failed: u64,
    pub total_processing_time: Duration,
    pub created_at: Instant,
    pub last_active: Instant,
}

impl WorkerStats {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            requests_completed: 0,
            requests_failed: 0,
            total_processing_time: Duration::ZERO,
            created_at: now,
            last_active: now,
        }
    }

    pub fn avg_processing_time(&self) -> Duration {
        let total = self.requests_completed + self.requests_failed;
        if total == 0 {
            Duration::ZERO
        } else {
            self.total_processing_time / total as u32
        }
    }

    pub fn idle_time(&self) -> Duration {
        self.last_active.elapsed()
    }

    fn record(&mut self, elapsed: Duration, success: bool) {
        if success {
            self.requests_completed += 1;
        } else {
            self.requests_failed += 1;
        }
        self.total_processing_time += elapsed;
        self.last_active = Instant::now();
    }
}

/// A self-contained unit combining one Browser Driver (on a unique port,
/// with a unique profile directory) and one Session Manager.
///
/// The Navigator and Request Handler are layered on top of a Worker by
/// `mitchell-agent`, which is why this type exposes `session()` rather than
/// a higher-level `execute` itself — `mitchell-browser` has no knowledge of
/// tools, vehicles, or the Navigator's goal-parsing rules.
pub struct Worker {
    pub id: u64,
    pub port: u16,
    pub profile_dir: PathBuf,
    state: WorkerState,
    session: Arc<SessionManager>,
    watcher: Option<tokio::task::JoinHandle<()>>,
    stats: WorkerStats,
}

impl Worker {
    pub fn new(
        id: u64,
        launch_config: BrowserLaunchConfig,
        portal_url: impl Into<String>,
        idle_timeout: Duration,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let port = launch_config.port;
        let profile_dir = launch_config.profile_dir.clone();
        let driver = BrowserDriver::new(launch_config, portal_url);
        let session = Arc::new(SessionManager::new(driver, idle_timeout, username, password));

        Self {
            id,
            port,
            profile_dir,
            state: WorkerState::Starting,
            session,
            watcher: None,
            stats: WorkerStats::new(),
        }
    }

    /// Brings the Worker from `Starting` to `Idle`: attaches/spawns the
    /// browser (clean-state not assumed here, the Pool calls
    /// `ensure_clean_state` separately at agent startup) and starts the
    /// idle-timeout watcher.
    pub async fn start(&mut self) -> BrowserResult<()> {
        self.watcher = Some(self.session.start_timeout_watcher());
        self.state = WorkerState::Idle;
        Ok(())
    }

    /// Stops the idle-timeout watcher, logs out if needed, and disconnects
    /// the Browser Driver.
    pub async fn stop(&mut self) -> BrowserResult<()> {
        self.session.stop_timeout_watcher();
        if let Some(handle) = self.watcher.take() {
            handle.abort();
        }
        let _ = self.session.logout().await;
        self.session.driver().await.disconnect().await?;
        self.state = WorkerState::Error;
        Ok(())
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Called by the Pool under its lock on acquisition.
    pub(crate) fn mark_busy(&mut self) {
        self.state = WorkerState::Busy;
    }

    /// Called by the Worker itself at the end of `execute`.
    pub(crate) fn mark_idle(&mut self, elapsed: Duration, success: bool) {
        self.state = WorkerState::Idle;
        self.stats.record(elapsed, success);
    }

    pub fn session(&self) -> Arc<SessionManager> {
        Arc::clone(&self.session)
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_average_is_zero_with_no_requests() {
        let stats = WorkerStats::new();
        assert_eq!(stats.avg_processing_time(), Duration::ZERO);
    }

    #[test]
    fn stats_record_updates_counts_and_timing() {
        let mut stats = WorkerStats::new();
        stats.record(Duration::from_millis(100), true);
        stats.record(Duration::from_millis(300), false);

        assert_eq!(stats.requests_completed, 1);
        assert_eq!(stats.requests_failed, 1);
        assert_eq!(stats.avg_processing_time(), Duration::from_millis(200));
    }
}
