//! Concrete `thirtyfour`-backed implementations of the Navigator's
//! [`mitchell_navigator::PortalView`] and this crate's own
//! [`tool_dispatch::PortalTools`](crate::tool_dispatch::PortalTools), both
//! driving the same borrowed [`mitchell_browser::WebDriver`].

pub mod tools;
pub mod view;

pub use tools::BrowserPortalTools;
pub use view::{BrowserPortalView, NavDelays};
