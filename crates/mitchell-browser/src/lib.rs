#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod config;
mod connection;
pub mod error;
mod pool;
#[doc(hidden)]
pub mod prelude;
mod session;
mod worker;

pub use thirtyfour::{By, WebDriver, WebElement};

pub use crate::config::capabilities::{self, CapabilitiesBuilder};
pub use crate::config::{BrowserLaunchConfig, ScalingMode, WorkerPoolConfig};
pub use crate::connection::BrowserDriver;
pub use crate::error::{BrowserError, BrowserResult};
pub use crate::pool::{WorkerGuard, WorkerPool};
pub use crate::session::SessionManager;
pub use crate::worker::{Worker, WorkerState, WorkerStats};
