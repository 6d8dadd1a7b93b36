//! The Browser Driver: one real browser process, on a caller-specified port
//! and profile directory, exposing a single current page.

use std::time::{Duration, Instant};

use rand::Rng;
use thirtyfour::{By, DesiredCapabilities, WebDriver};
use tokio::process::{Child, Command};
use tokio::time::sleep;

use crate::config::BrowserLaunchConfig;
use crate::error::{BrowserError, BrowserResult};

/// Sentinel element present only once the portal has a logged-in session.
const LOGGED_IN_SENTINEL: &str = "[data-testid='shopkey-app-shell']";
/// Sentinel present on the login form.
const LOGIN_FORM_SENTINEL: &str = "#login-form, form[action*='login']";
/// Sentinel present on the session/license-limit page.
const SESSION_LIMIT_SENTINEL: &str = "[data-testid='session-limit'], .license-manager";

/// One real, exclusively owned browser process plus its WebDriver control
/// client.
///
/// `connect`, `login`, `logout`, `ensure_clean_state`, and `disconnect` are
/// the only operations; they never retry internally — callers (the Session
/// Manager) are responsible for retry and idle-timeout policy.
pub struct BrowserDriver {
    config: BrowserLaunchConfig,
    portal_url: String,
    client: Option<WebDriver>,
    child: Option<Child>,
}

impl BrowserDriver {
    /// Creates a driver for the given launch configuration. Nothing is
    /// spawned until [`BrowserDriver::connect`] is called.
    pub fn new(config: BrowserLaunchConfig, portal_url: impl Into<String>) -> Self {
        Self {
            config,
            portal_url: portal_url.into(),
            client: None,
            child: None,
        }
    }

    /// Returns the WebDriver client, if connected.
    pub fn client(&self) -> Option<&WebDriver> {
        self.client.as_ref()
    }

    /// Spawns (or attaches to) the browser process on the configured port,
    /// waits for the control endpoint, navigates to the portal, and
    /// resolves the resulting page state.
    #[tracing::instrument(skip(self), fields(port = self.config.port))]
    pub async fn connect(&mut self) -> BrowserResult<()> {
        if self.client.is_none() {
            self.spawn_chromedriver().await?;
            self.wait_for_endpoint().await?;
        }

        let caps = DesiredCapabilities::chrome();
        let client = WebDriver::new(
            format!("http://127.0.0.1:{}", self.config.port),
            caps,
        )
        .await
        .map_err(|e| {
            BrowserError::connection_failed(format!("http://127.0.0.1:{}", self.config.port), e)
        })?;

        client
            .goto(&self.portal_url)
            .await
            .map_err(BrowserError::from)?;

        self.dismiss_consent_banner(&client).await;

        self.client = Some(client);
        self.resolve_landing_state().await
    }

    async fn spawn_chromedriver(&mut self) -> BrowserResult<()> {
        tokio::fs::create_dir_all(&self.config.profile_dir)
            .await
            .map_err(|e| {
                BrowserError::process_error("chromedriver", None, format!("profile dir: {e}"))
            })?;

        let child = Command::new(&self.config.chromedriver_path)
            .arg(format!("--port={}", self.config.port))
            .args(self.config.chrome_args())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BrowserError::process_error("spawn chromedriver", None, e.to_string()))?;

        self.child = Some(child);
        Ok(())
    }

    async fn wait_for_endpoint(&self) -> BrowserResult<()> {
        let deadline = Instant::now() + self.config.connect_timeout;
        let url = format!("http://127.0.0.1:{}/status", self.config.port);

        while Instant::now() < deadline {
            if reqwest::get(&url).await.is_ok() {
                return Ok(());
            }
            sleep(Duration::from_millis(250)).await;
        }

        Err(BrowserError::timeout(
            "wait for chromedriver endpoint",
            self.config.connect_timeout.as_secs(),
        ))
    }

    async fn dismiss_consent_banner(&self, client: &WebDriver) {
        if let Ok(el) = client
            .find(By::Css("[data-testid='consent-accept'], .consent-banner .accept"))
            .await
        {
            let _ = el.click().await;
        }
    }

    /// Detects which of the three landing states the portal is in after
    /// navigation and branches accordingly.
    async fn resolve_landing_state(&mut self) -> BrowserResult<()> {
        let client = self.client.as_ref().expect("connected");

        if client.find(By::Css(LOGGED_IN_SENTINEL)).await.is_ok() {
            return Ok(());
        }

        if client.find(By::Css(SESSION_LIMIT_SENTINEL)).await.is_ok() {
            return Err(BrowserError::SessionLimit);
        }

        if client.find(By::Css(LOGIN_FORM_SENTINEL)).await.is_ok() {
            // The login form is present, but credentials live with the
            // Session Manager, not the driver; leave the form unfilled and
            // let `SessionManager::ensure_logged_in`'s separate `login` call
            // drive it. This keeps `connect`/`ensure_clean_state` (which
            // only wants *some* resolved page state, not a logged-in one)
            // from performing an unwanted login on every reconnect.
            return Ok(());
        }

        Err(BrowserError::operation_failed(
            "resolve_landing_state",
            "none of logged-in, login-form, or session-limit sentinels were found",
        ))
    }

    /// Locates username/password inputs, types credentials with human-like
    /// per-keystroke delays, and submits. A no-op if the portal already
    /// shows a logged-in session (e.g. a persisted profile dir reused the
    /// cookie from a previous run) rather than a login form.
    #[tracing::instrument(skip(self, username, password))]
    pub async fn login(&mut self, username: &str, password: &str) -> BrowserResult<()> {
        let client = self.client.as_ref().ok_or_else(|| {
            BrowserError::operation_failed("login", "browser driver is not connected")
        })?;

        if client.find(By::Css(LOGGED_IN_SENTINEL)).await.is_ok() {
            return Ok(());
        }

        if client.current_url().await.map(|u| u.as_str().contains("auto_login")).unwrap_or(false)
        {
            return self.wait_for_post_login_redirect(client).await;
        }

        let username_field = self
            .locate(client, &["#username", "input[name='username']"], "placeholder or aria-label containing 'user'")
            .await?;
        let password_field = self
            .locate(client, &["#password", "input[name='password']"], "placeholder or aria-label containing 'pass'")
            .await?;

        type_humanlike(&username_field, username).await?;
        sleep(rand_duration(300, 1000)).await;
        type_humanlike(&password_field, password).await?;

        if let Ok(submit) = client.find(By::Css("button[type='submit']")).await {
            submit.click().await.map_err(BrowserError::from)?;
        } else {
            password_field.send_keys("\n").await.map_err(BrowserError::from)?;
        }

        self.wait_for_post_login_redirect(client).await?;
        self.handle_active_sessions_prompt(client).await
    }

    async fn locate(
        &self,
        client: &WebDriver,
        selectors: &[&str],
        fallback_description: &str,
    ) -> BrowserResult<thirtyfour::WebElement> {
        for selector in selectors {
            if let Ok(el) = client.find(By::Css(selector)).await {
                return Ok(el);
            }
        }
        Err(BrowserError::element_error(
            "locate",
            selectors.first().map(|s| s.to_string()),
            format!("not found by any selector; tried {fallback_description}"),
        ))
    }

    async fn wait_for_post_login_redirect(&self, client: &WebDriver) -> BrowserResult<()> {
        let deadline = Instant::now() + Duration::from_secs(15);
        while Instant::now() < deadline {
            if let Ok(url) = client.current_url().await
                && !url.as_str().contains("login")
            {
                return Ok(());
            }
            sleep(Duration::from_millis(200)).await;
        }
        Err(BrowserError::login_failed(
            "timed out waiting for redirect away from the login page",
        ))
    }

    async fn handle_active_sessions_prompt(&self, client: &WebDriver) -> BrowserResult<()> {
        if let Ok(checkboxes) = client.find_all(By::Css("[data-testid='active-session'] input[type='checkbox']")).await {
            for cb in &checkboxes {
                let _ = cb.click().await;
            }
            if let Ok(commit) = client.find(By::Css("[data-testid='commit-sessions']")).await {
                commit.click().await.map_err(BrowserError::from)?;
            }
        }
        Ok(())
    }

    /// Closes modals, clicks the logout affordance, and verifies the
    /// transition back to a logged-out landing.
    #[tracing::instrument(skip(self))]
    pub async fn logout(&mut self) -> BrowserResult<()> {
        let Some(client) = self.client.as_ref() else {
            return Ok(());
        };

        self.close_modals(client).await;

        if let Ok(logout_button) = client.find(By::Css("[data-testid='logout']")).await {
            logout_button.click().await.map_err(BrowserError::from)?;
        }

        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if client.find(By::Css(LOGIN_FORM_SENTINEL)).await.is_ok() {
                return Ok(());
            }
            sleep(Duration::from_millis(200)).await;
        }
        Ok(())
    }

    async fn close_modals(&self, client: &WebDriver) {
        const CLOSE_SELECTORS: &[&str] = &[
            "button[aria-label='Close']",
            ".modal .cancel",
            ".close",
            "[aria-label='close']",
        ];
        for selector in CLOSE_SELECTORS {
            if let Ok(elements) = client.find_all(By::Css(selector)).await {
                for el in &elements {
                    let _ = el.click().await;
                }
            }
        }
    }

    /// On agent startup: attach to any existing session and log out before
    /// the first real request, guaranteeing a clean starting state.
    pub async fn ensure_clean_state(&mut self) -> BrowserResult<()> {
        self.connect().await?;
        self.logout().await
    }

    /// Closes the control client, terminates the child `chromedriver`
    /// process if this driver spawned it.
    pub async fn disconnect(&mut self) -> BrowserResult<()> {
        if let Some(client) = self.client.take() {
            let _ = client.quit().await;
        }
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
        }
        Ok(())
    }
}

/// Types `text` into `element` with per-keystroke delays in 30-80ms,
/// matching the reference login algorithm's human-like typing pace.
async fn type_humanlike(element: &thirtyfour::WebElement, text: &str) -> BrowserResult<()> {
    for ch in text.chars() {
        element
            .send_keys(ch.to_string())
            .await
            .map_err(BrowserError::from)?;
        sleep(rand_duration(30, 80)).await;
    }
    Ok(())
}

fn rand_duration(min_ms: u64, max_ms: u64) -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}
