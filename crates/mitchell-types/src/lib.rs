#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
pub mod model;
#[doc(hidden)]
pub mod prelude;
pub mod retry;

pub use crate::error::{BoxError, Error, ErrorKind};
pub use crate::model::{
    AgentResult, Clarification, NavigationResult, Request, Tool, VehicleGoal, VehicleSpec,
};

/// Specialized [`Result`] type used throughout the workspace.
///
/// [`Result`]: std::result::Result
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Tracing target for poller-related events.
pub const TRACING_TARGET_POLLER: &str = "mitchell_agent::poller";

/// Tracing target for browser/session-related events.
pub const TRACING_TARGET_BROWSER: &str = "mitchell_agent::browser";

/// Tracing target for reasoner-related events.
pub const TRACING_TARGET_REASONER: &str = "mitchell_agent::reasoner";
