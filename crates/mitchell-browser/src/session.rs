//! The Session Manager: wraps a Browser Driver with an explicit logged-in
//! bit, an idle-timeout policy, and safe re-entrancy.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::connection::BrowserDriver;
use crate::error::BrowserResult;

/// Logged-in/logged-out state. `LoggedIn` carries the timestamp of the last
/// portal interaction so the timeout watcher can evaluate idleness without
/// a second synchronized field.
#[derive(Debug, Clone, Copy)]
enum SessionState {
    LoggedOut,
    LoggedIn { last_activity: Instant },
}

/// Wraps a [`BrowserDriver`] with login/logout re-entrancy and an
/// idle-timeout watcher.
///
/// Callers must not call the wrapped Browser Driver's `login`/`logout`
/// directly; doing so would desynchronize `state` from the portal's actual
/// session and defeat the idle-timeout watcher.
pub struct SessionManager {
    driver: Mutex<BrowserDriver>,
    state: Mutex<SessionState>,
    idle_timeout: Duration,
    username: String,
    password: String,
    cancel: CancellationToken,
}

impl SessionManager {
    pub fn new(
        driver: BrowserDriver,
        idle_timeout: Duration,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            driver: Mutex::new(driver),
            state: Mutex::new(SessionState::LoggedOut),
            idle_timeout,
            username: username.into(),
            password: password.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// If already logged in, stamps activity and returns `true`. Otherwise
    /// drives the wrapped Browser Driver through `connect`/`login`; on
    /// success transitions to `LoggedIn` and stamps activity.
    pub async fn ensure_logged_in(&self) -> BrowserResult<bool> {
        let mut state = self.state.lock().await;
        if matches!(*state, SessionState::LoggedIn { .. }) {
            *state = SessionState::LoggedIn {
                last_activity: Instant::now(),
            };
            return Ok(true);
        }

        let mut driver = self.driver.lock().await;
        driver.connect().await?;
        driver.login(&self.username, &self.password).await?;
        drop(driver);

        *state = SessionState::LoggedIn {
            last_activity: Instant::now(),
        };
        Ok(true)
    }

    /// Stamps `last_activity` to now. Called after every external-portal
    /// interaction: login, navigation, tool dispatch, result extraction.
    pub async fn update_activity(&self) {
        let mut state = self.state.lock().await;
        if matches!(*state, SessionState::LoggedIn { .. }) {
            *state = SessionState::LoggedIn {
                last_activity: Instant::now(),
            };
        }
    }

    /// Idempotent: a no-op if already logged out. Always clears the state
    /// bit even if the underlying portal logout call fails, so a failed
    /// logout never leaves the Session Manager believing it is still
    /// logged in.
    pub async fn logout(&self) -> BrowserResult<()> {
        let mut state = self.state.lock().await;
        if matches!(*state, SessionState::LoggedOut) {
            return Ok(());
        }

        let mut driver = self.driver.lock().await;
        let result = driver.logout().await;
        drop(driver);

        *state = SessionState::LoggedOut;
        result
    }

    /// Returns whether the session is currently believed to be logged in.
    pub async fn is_logged_in(&self) -> bool {
        matches!(*self.state.lock().await, SessionState::LoggedIn { .. })
    }

    /// Grants exclusive access to the wrapped driver for navigation and
    /// tool-dispatch calls that need direct browser control.
    pub async fn driver(&self) -> tokio::sync::MutexGuard<'_, BrowserDriver> {
        self.driver.lock().await
    }

    /// Spawns the cooperative watcher task: every 10s, if logged in and
    /// idle longer than `idle_timeout`, logs out. Returns a handle the
    /// caller should abort (or cancel via the returned token) on shutdown.
    pub fn start_timeout_watcher(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(10));
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let should_logout = {
                            let state = manager.state.lock().await;
                            matches!(
                                *state,
                                SessionState::LoggedIn { last_activity }
                                    if last_activity.elapsed() > manager.idle_timeout
                            )
                        };
                        if should_logout {
                            if let Err(err) = manager.logout().await {
                                tracing::warn!(error = %err, "idle-timeout logout failed");
                            }
                        }
                    }
                }
            }
        })
    }

    /// Cancels the timeout watcher task started by
    /// [`SessionManager::start_timeout_watcher`].
    pub fn stop_timeout_watcher(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_timeout_elapsed(last_activity: Instant, idle_timeout: Duration) -> bool {
        last_activity.elapsed() > idle_timeout
    }

    #[test]
    fn idle_detection_is_strictly_greater_than() {
        let last_activity = Instant::now() - Duration::from_secs(301);
        assert!(idle_timeout_elapsed(last_activity, Duration::from_secs(300)));

        let last_activity = Instant::now();
        assert!(!idle_timeout_elapsed(last_activity, Duration::from_secs(300)));
    }
}
