//! A convenience module that re-exports commonly used items.
//!
//! ```no_run
//! use mitchell_navigator::prelude::*;
//! ```

pub use crate::{ClarificationCallback, NavError, Navigator, OptionGroup, OptionsLayout, PortalView, Tab};
