//! A convenience module that re-exports commonly used items.
//!
//! ```no_run
//! use mitchell_reasoner::prelude::*;
//! ```

pub use crate::{CloudReasoner, Decision, LocalReasoner, Message, MessageRole, ProxyReasoner, Reasoner, ToolSchema};
