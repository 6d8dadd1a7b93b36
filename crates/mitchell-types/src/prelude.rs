//! A convenience module that re-exports commonly used items.
//!
//! This module is intended to be glob-imported for convenience:
//!
//! ```
//! use mitchell_types::prelude::*;
//! ```

pub use crate::model::{
    AgentResult, Clarification, NavigationResult, Request, Tool, VehicleGoal, VehicleSpec,
};
pub use crate::{BoxError, Error, ErrorKind, Result};
