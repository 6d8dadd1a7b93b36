//! A convenience module that re-exports commonly used items.
//!
//! ```no_run
//! use mitchell_poller::prelude::*;
//! ```

pub use crate::{MultiServerPoller, ServerClient};
