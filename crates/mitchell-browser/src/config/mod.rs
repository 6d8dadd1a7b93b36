//! Configuration types for browser launch and worker-pool sizing.

use std::time::Duration;

use derive_builder::Builder;
use mitchell_types::{Error, ErrorKind, Result};

pub mod capabilities;

/// Launch configuration for one Worker's dedicated Chrome + `chromedriver`
/// process.
#[derive(Debug, Clone, Builder)]
#[builder(
    name = "BrowserLaunchConfigBuilder",
    pattern = "owned",
    setter(into, strip_option, prefix = "with"),
    build_fn(validate = "Self::validate_config")
)]
pub struct BrowserLaunchConfig {
    /// Path to the `chromedriver` executable.
    #[builder(default = "\"chromedriver\".to_string()")]
    pub chromedriver_path: String,

    /// Port `chromedriver` listens on for this worker.
    pub port: u16,

    /// Exclusive profile directory for this worker's Chrome instance.
    pub profile_dir: std::path::PathBuf,

    /// Whether to launch Chrome headless.
    #[builder(default = "true")]
    pub headless: bool,

    /// Browser window size, `width x height`.
    #[builder(default = "(1920, 1080)")]
    pub window_size: (u32, u32),

    /// Time budget for the control endpoint to become reachable after
    /// launch.
    #[builder(default = "Duration::from_secs(30)")]
    pub connect_timeout: Duration,
}

impl From<Error> for BrowserLaunchConfigBuilderError {
    fn from(err: Error) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl BrowserLaunchConfigBuilder {
    fn validate_config(&self) -> Result<()> {
        if let Some(port) = self.port
            && port == 0
        {
            return Err(Error::new(ErrorKind::ConfigInvalid, "port must be nonzero"));
        }
        Ok(())
    }
}

impl BrowserLaunchConfig {
    pub fn builder() -> BrowserLaunchConfigBuilder {
        BrowserLaunchConfigBuilder::default()
    }

    /// Chrome command-line flags matching the reference connect algorithm:
    /// remote debugging on the worker's port, a dedicated profile
    /// directory, no first-run prompts, and background networking disabled.
    pub fn chrome_args(&self) -> Vec<String> {
        let (w, h) = self.window_size;
        let mut args = vec![
            format!("--remote-debugging-port={}", self.port),
            format!("--user-data-dir={}", self.profile_dir.display()),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-background-networking".to_string(),
            "--disable-background-timer-throttling".to_string(),
            "--disable-backgrounding-occluded-windows".to_string(),
            "--disable-renderer-backgrounding".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            format!("--window-size={w},{h}"),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        args
    }
}

/// The three Worker Pool scaling policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingMode {
    /// Exactly one Worker, concurrency bound 1.
    Single,
    /// Pre-spawned pool between `min_workers` and `max_workers`, scaled by
    /// a periodic scaler task.
    Pool,
    /// Zero standing Workers; each acquisition spawns and the release kills.
    OnDemand,
}

/// Sizing and timing configuration for the Worker Pool.
#[derive(Debug, Clone, Builder)]
#[builder(
    name = "WorkerPoolConfigBuilder",
    pattern = "owned",
    setter(into, strip_option, prefix = "with"),
    build_fn(validate = "Self::validate_config")
)]
pub struct WorkerPoolConfig {
    #[builder(default = "ScalingMode::Pool")]
    pub mode: ScalingMode,

    #[builder(default = "1")]
    pub min_workers: usize,

    #[builder(default = "4")]
    pub max_workers: usize,

    /// First port probed when allocating a new Worker's `chromedriver` port.
    #[builder(default = "9515")]
    pub base_port: u16,

    /// Parent directory under which `worker-<id>` profile directories are
    /// created.
    pub profile_root: std::path::PathBuf,

    /// How long an idle Worker survives before the scaler may kill it, in
    /// Pool mode.
    #[builder(default = "Duration::from_secs(600)")]
    pub idle_timeout: Duration,

    /// Interval between scaler evaluations, in Pool mode.
    #[builder(default = "Duration::from_secs(10)")]
    pub scale_interval: Duration,

    #[builder(default = "true")]
    pub headless: bool,
}

impl From<Error> for WorkerPoolConfigBuilderError {
    fn from(err: Error) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl WorkerPoolConfigBuilder {
    fn validate_config(&self) -> Result<()> {
        let min = self.min_workers.unwrap_or(1);
        let max = self.max_workers.unwrap_or(4);
        if max == 0 {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                "max_workers must be greater than zero",
            ));
        }
        if min > max {
            return Err(Error::new(
                ErrorKind::ConfigInvalid,
                "min_workers cannot exceed max_workers",
            ));
        }
        Ok(())
    }
}

impl WorkerPoolConfig {
    pub fn builder() -> WorkerPoolConfigBuilder {
        WorkerPoolConfigBuilder::default()
    }

    /// The semaphore capacity this pool's acquisition bound should use:
    /// `1` for Single mode regardless of the configured `max_workers`.
    pub fn concurrency_limit(&self) -> usize {
        match self.mode {
            ScalingMode::Single => 1,
            ScalingMode::Pool | ScalingMode::OnDemand => self.max_workers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_min_workers_above_max() {
        let result = WorkerPoolConfig::builder()
            .with_profile_root(std::path::PathBuf::from("/tmp/mitchell-agent"))
            .with_min_workers(5_usize)
            .with_max_workers(2_usize)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn single_mode_concurrency_is_always_one() {
        let config = WorkerPoolConfig::builder()
            .with_profile_root(std::path::PathBuf::from("/tmp/mitchell-agent"))
            .with_mode(ScalingMode::Single)
            .with_max_workers(8_usize)
            .build()
            .unwrap();
        assert_eq!(config.concurrency_limit(), 1);
    }

    #[test]
    fn chrome_args_carry_dedicated_port_and_profile() {
        let config = BrowserLaunchConfig::builder()
            .with_port(9516_u16)
            .with_profile_dir(std::path::PathBuf::from("/tmp/mitchell-agent/worker-1"))
            .build()
            .unwrap();

        let args = config.chrome_args();
        assert!(args.iter().any(|a| a == "--remote-debugging-port=9516"));
        assert!(
            args.iter()
                .any(|a| a.contains("worker-1") && a.starts_with("--user-data-dir="))
        );
    }
}
