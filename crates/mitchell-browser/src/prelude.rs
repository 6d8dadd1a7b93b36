//! A convenience module that re-exports commonly used items.
//!
//! ```no_run
//! use mitchell_browser::prelude::*;
//! ```

pub use crate::{
    BrowserDriver, BrowserError, BrowserLaunchConfig, BrowserResult, ScalingMode, SessionManager,
    Worker, WorkerGuard, WorkerPool, WorkerPoolConfig, WorkerState,
};
