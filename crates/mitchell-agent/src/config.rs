//! Configuration loading: environment variables, an optional `--config`
//! JSON file, and CLI flags that override both.
//!
//! Precedence, outermost first: CLI flags > environment variables > the
//! `--config` file (if given) > built-in defaults. See `DESIGN.md` for the
//! field-by-field grounding in the original agent's `config.py`.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use mitchell_browser::{ScalingMode, WorkerPoolConfig};
use mitchell_types::{Error, ErrorKind, Result};
use serde::Deserialize;

use crate::portal::view::NavDelays;

const DEFAULT_SERVER_URL: &str = "https://automotive.aurora-sentient.net";

/// Which Reasoner backend the Navigator's hybrid phase falls back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasonerBackend {
    /// `CloudReasoner` against Google's Gemini `generateContent` API.
    Gemini,
    /// `LocalReasoner` against an Ollama-compatible endpoint.
    Ollama,
    /// `ProxyReasoner`, constructed fresh per request against a configured
    /// job server's `/api/mitchell/navigate` route.
    Server,
}

impl ReasonerBackend {
    fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            "server" => Ok(Self::Server),
            other => Err(Error::new(
                ErrorKind::ConfigInvalid,
                format!("unknown NAVIGATOR_BACKEND '{other}'; expected gemini, ollama, or server"),
            )),
        }
    }
}

fn parse_scaling_mode(value: &str) -> Result<ScalingMode> {
    match value.to_ascii_lowercase().as_str() {
        "single" => Ok(ScalingMode::Single),
        "pool" => Ok(ScalingMode::Pool),
        "on_demand" | "ondemand" | "on-demand" => Ok(ScalingMode::OnDemand),
        other => Err(Error::new(
            ErrorKind::ConfigInvalid,
            format!("unknown MITCHELL_SCALING_MODE '{other}'; expected single, pool, or on_demand"),
        )),
    }
}

/// The agent's full configuration surface, combining the shop identity, job
/// server routing, browser launch settings, worker-pool sizing, navigation
/// timing, and Reasoner backend selection.
///
/// Deserializable directly from a `--config` JSON file; every field also has
/// an environment-variable override and (for the subset spec §6.2 names) a
/// CLI flag.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub shop_id: String,
    pub shop_name: Option<String>,
    /// Comma-separated in the environment; always stored split.
    pub server_url: Vec<String>,
    pub mitchell_username: Option<String>,
    pub mitchell_password: Option<String>,
    pub poll_interval: f64,
    pub error_backoff: f64,
    pub headless: bool,
    pub chrome_executable_path: Option<String>,
    pub chrome_user_data_path: Option<String>,
    pub log_level: String,
    pub debug_screenshots: bool,

    pub navigator_backend: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub ollama_url: String,
    pub ollama_model: String,

    pub scaling_mode: String,
    pub pool_min_workers: usize,
    pub pool_max_workers: usize,
    pub pool_idle_timeout_secs: u64,
    pub pool_base_port: u16,
    pub profile_root: PathBuf,

    pub nav_delay_short_ms: u64,
    pub nav_delay_medium_ms: u64,
    pub nav_delay_long_ms: u64,
    pub nav_delay_ajax_ms: u64,
    pub nav_delay_step_secs: f64,
    pub nav_delay_modal_secs: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            shop_id: String::new(),
            shop_name: None,
            server_url: vec![DEFAULT_SERVER_URL.to_string()],
            mitchell_username: None,
            mitchell_password: None,
            poll_interval: 2.0,
            error_backoff: 10.0,
            headless: true,
            chrome_executable_path: None,
            chrome_user_data_path: None,
            log_level: "info".to_string(),
            debug_screenshots: false,

            navigator_backend: "gemini".to_string(),
            gemini_api_key: None,
            gemini_model: None,
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "qwen3:8b".to_string(),

            scaling_mode: "single".to_string(),
            pool_min_workers: 1,
            pool_max_workers: 3,
            pool_idle_timeout_secs: 300,
            pool_base_port: 9222,
            profile_root: PathBuf::from("./mitchell-agent-profiles"),

            nav_delay_short_ms: 500,
            nav_delay_medium_ms: 1_000,
            nav_delay_long_ms: 2_000,
            nav_delay_ajax_ms: 1_500,
            nav_delay_step_secs: 1.0,
            nav_delay_modal_secs: 1.0,
        }
    }
}

impl AgentConfig {
    /// Every configured job server URL, parsed and validated.
    pub fn server_urls(&self) -> Result<Vec<reqwest::Url>> {
        self.server_url
            .iter()
            .map(|raw| {
                reqwest::Url::parse(raw).map_err(|e| {
                    Error::with_source(
                        ErrorKind::ConfigInvalid,
                        format!("invalid server URL '{raw}'"),
                        Box::new(e),
                    )
                })
            })
            .collect()
    }

    pub fn reasoner_backend(&self) -> Result<ReasonerBackend> {
        ReasonerBackend::parse(&self.navigator_backend)
    }

    pub fn scaling_mode(&self) -> Result<ScalingMode> {
        parse_scaling_mode(&self.scaling_mode)
    }

    /// Builds the Worker Pool sizing/timing configuration this agent should
    /// launch with. `chrome_user_data_path`, when set, takes the place of
    /// `profile_root`: the original uses it as a single persistent browser's
    /// profile directory, and the closest equivalent in a pooled design is
    /// the parent directory each worker's `worker-<id>` subdirectory is
    /// created under.
    pub fn worker_pool_config(&self) -> Result<WorkerPoolConfig> {
        let profile_root = match &self.chrome_user_data_path {
            Some(path) => PathBuf::from(path),
            None => self.profile_root.clone(),
        };

        WorkerPoolConfig::builder()
            .with_mode(self.scaling_mode()?)
            .with_min_workers(self.pool_min_workers)
            .with_max_workers(self.pool_max_workers)
            .with_base_port(self.pool_base_port)
            .with_profile_root(profile_root)
            .with_idle_timeout(Duration::from_secs(self.pool_idle_timeout_secs))
            .with_headless(self.headless)
            .build()
            .map_err(|e| Error::new(ErrorKind::ConfigInvalid, e.to_string()))
    }

    /// The navigation-timing knobs `portal::view::BrowserPortalView` waits
    /// on between selector interactions.
    pub fn nav_delays(&self) -> NavDelays {
        NavDelays {
            short: Duration::from_millis(self.nav_delay_short_ms),
            medium: Duration::from_millis(self.nav_delay_medium_ms),
            long: Duration::from_millis(self.nav_delay_long_ms),
            ajax: Duration::from_millis(self.nav_delay_ajax_ms),
            step: Duration::from_secs_f64(self.nav_delay_step_secs),
            modal: Duration::from_secs_f64(self.nav_delay_modal_secs),
        }
    }
}

/// Command-line surface, spec §6.2: `--shop-id`, `--server-url`,
/// `--poll-interval`, `--headless`, `--config`.
#[derive(Debug, Parser)]
#[command(
    name = "mitchell-agent",
    about = "Polls configured job servers for automotive-data requests and drives them through ShopKeyPro"
)]
pub struct CliArgs {
    /// Path to a JSON configuration file, applied before environment
    /// variables and below them in precedence.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long = "shop-id")]
    pub shop_id: Option<String>,

    /// Comma-separated list of job server base URLs.
    #[arg(long = "server-url")]
    pub server_url: Option<String>,

    #[arg(long = "poll-interval")]
    pub poll_interval: Option<f64>,

    #[arg(long = "headless")]
    pub headless: Option<bool>,
}

/// Loads and validates the agent's configuration: the `--config` file (if
/// given) seeds defaults, environment variables override it, and CLI flags
/// override both.
pub fn load(cli: CliArgs) -> Result<AgentConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                Error::with_source(
                    ErrorKind::ConfigInvalid,
                    format!("could not read config file '{}'", path.display()),
                    Box::new(e),
                )
            })?;
            serde_json::from_str(&raw).map_err(|e| {
                Error::with_source(
                    ErrorKind::ConfigInvalid,
                    format!("invalid config file '{}'", path.display()),
                    Box::new(e),
                )
            })?
        }
        None => AgentConfig::default(),
    };

    apply_env(&mut config);
    apply_cli(&mut config, cli);

    if config.shop_id.is_empty() {
        return Err(Error::new(
            ErrorKind::ConfigInvalid,
            "MITCHELL_SHOP_ID (or --shop-id) is required",
        ));
    }

    // Validated eagerly so a bad value fails at startup, not mid-sweep.
    config.server_urls()?;
    config.reasoner_backend()?;
    config.scaling_mode()?;

    Ok(config)
}

fn env_string(name: &str, target: &mut Option<String>) {
    if let Ok(value) = std::env::var(name) {
        *target = Some(value);
    }
}

fn env_f64(name: &str, target: &mut f64) {
    if let Ok(value) = std::env::var(name)
        && let Ok(parsed) = value.parse()
    {
        *target = parsed;
    }
}

fn env_u64(name: &str, target: &mut u64) {
    if let Ok(value) = std::env::var(name)
        && let Ok(parsed) = value.parse()
    {
        *target = parsed;
    }
}

fn env_u16(name: &str, target: &mut u16) {
    if let Ok(value) = std::env::var(name)
        && let Ok(parsed) = value.parse()
    {
        *target = parsed;
    }
}

fn env_usize(name: &str, target: &mut usize) {
    if let Ok(value) = std::env::var(name)
        && let Ok(parsed) = value.parse()
    {
        *target = parsed;
    }
}

/// `true/1/yes/on/headless` (case-insensitive) are truthy, everything else
/// is falsy, matching the original's loose environment-variable coercion.
fn env_bool(name: &str, target: &mut bool) {
    if let Ok(value) = std::env::var(name) {
        *target = matches!(
            value.to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "on" | "headless"
        );
    }
}

fn apply_env(config: &mut AgentConfig) {
    if let Ok(value) = std::env::var("MITCHELL_SHOP_ID") {
        config.shop_id = value;
    }
    env_string("MITCHELL_SHOP_NAME", &mut config.shop_name);
    if let Ok(value) = std::env::var("MITCHELL_SERVER_URL") {
        config.server_url = value.split(',').map(|s| s.trim().to_string()).collect();
    }
    env_string("MITCHELL_USERNAME", &mut config.mitchell_username);
    env_string("MITCHELL_PASSWORD", &mut config.mitchell_password);
    env_f64("MITCHELL_POLL_INTERVAL", &mut config.poll_interval);
    env_f64("MITCHELL_ERROR_BACKOFF", &mut config.error_backoff);
    env_bool("MITCHELL_HEADLESS", &mut config.headless);
    env_string("CHROME_EXECUTABLE_PATH", &mut config.chrome_executable_path);
    env_string("CHROME_USER_DATA_PATH", &mut config.chrome_user_data_path);
    if let Ok(value) = std::env::var("MITCHELL_LOG_LEVEL") {
        config.log_level = value;
    }
    // RUST_LOG, when set, supersedes MITCHELL_LOG_LEVEL entirely; main.rs
    // reads it directly when building the tracing EnvFilter.
    env_bool("MITCHELL_DEBUG_SCREENSHOTS", &mut config.debug_screenshots);

    if let Ok(value) = std::env::var("NAVIGATOR_BACKEND") {
        config.navigator_backend = value;
    }
    env_string("GEMINI_API_KEY", &mut config.gemini_api_key);
    env_string("GEMINI_MODEL", &mut config.gemini_model);
    if let Ok(value) = std::env::var("OLLAMA_URL") {
        config.ollama_url = value;
    }
    if let Ok(value) = std::env::var("OLLAMA_MODEL") {
        config.ollama_model = value;
    }

    if let Ok(value) = std::env::var("MITCHELL_SCALING_MODE") {
        config.scaling_mode = value;
    }
    env_usize("MITCHELL_POOL_MIN_WORKERS", &mut config.pool_min_workers);
    env_usize("MITCHELL_POOL_MAX_WORKERS", &mut config.pool_max_workers);
    env_u64("MITCHELL_POOL_IDLE_TIMEOUT", &mut config.pool_idle_timeout_secs);
    env_u16("MITCHELL_POOL_BASE_PORT", &mut config.pool_base_port);

    env_u64("MITCHELL_NAV_DELAY_SHORT", &mut config.nav_delay_short_ms);
    env_u64("MITCHELL_NAV_DELAY_MEDIUM", &mut config.nav_delay_medium_ms);
    env_u64("MITCHELL_NAV_DELAY_LONG", &mut config.nav_delay_long_ms);
    env_u64("MITCHELL_NAV_DELAY_AJAX", &mut config.nav_delay_ajax_ms);
    env_f64("MITCHELL_NAV_DELAY_STEP", &mut config.nav_delay_step_secs);
    env_f64("MITCHELL_NAV_DELAY_MODAL", &mut config.nav_delay_modal_secs);
}

fn apply_cli(config: &mut AgentConfig, cli: CliArgs) {
    if let Some(shop_id) = cli.shop_id {
        config.shop_id = shop_id;
    }
    if let Some(server_url) = cli.server_url {
        config.server_url = server_url.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Some(poll_interval) = cli.poll_interval {
        config.poll_interval = poll_interval;
    }
    if let Some(headless) = cli.headless {
        config.headless = headless;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_env() {
        for (key, _) in std::env::vars() {
            if key.starts_with("MITCHELL_") || key.starts_with("CHROME_") {
                unsafe { std::env::remove_var(key) };
            }
        }
    }

    #[test]
    fn missing_shop_id_is_a_config_error() {
        clear_env();
        let cli = CliArgs {
            config: None,
            shop_id: None,
            server_url: None,
            poll_interval: None,
            headless: None,
        };
        assert!(load(cli).is_err());
    }

    #[test]
    fn cli_overrides_env_overrides_defaults() {
        clear_env();
        unsafe { std::env::set_var("MITCHELL_SHOP_ID", "shop-from-env") };
        unsafe { std::env::set_var("MITCHELL_POLL_INTERVAL", "5.0") };

        let cli = CliArgs {
            config: None,
            shop_id: Some("shop-from-cli".to_string()),
            server_url: None,
            poll_interval: None,
            headless: None,
        };
        let config = load(cli).unwrap();
        assert_eq!(config.shop_id, "shop-from-cli");
        assert_eq!(config.poll_interval, 5.0);
        clear_env();
    }

    #[test]
    fn comma_separated_server_urls_split() {
        clear_env();
        unsafe { std::env::set_var("MITCHELL_SHOP_ID", "shop-1") };
        unsafe {
            std::env::set_var(
                "MITCHELL_SERVER_URL",
                "https://a.example, https://b.example",
            )
        };
        let cli = CliArgs {
            config: None,
            shop_id: None,
            server_url: None,
            poll_interval: None,
            headless: None,
        };
        let config = load(cli).unwrap();
        let urls = config.server_urls().unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[1].as_str(), "https://b.example/");
        clear_env();
    }

    #[test]
    fn rejects_unknown_navigator_backend() {
        clear_env();
        unsafe { std::env::set_var("MITCHELL_SHOP_ID", "shop-1") };
        unsafe { std::env::set_var("NAVIGATOR_BACKEND", "not-a-backend") };
        let cli = CliArgs {
            config: None,
            shop_id: None,
            server_url: None,
            poll_interval: None,
            headless: None,
        };
        assert!(load(cli).is_err());
        clear_env();
    }
}
