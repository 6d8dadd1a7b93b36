#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod clarify;
pub mod error;
pub mod goal;
pub mod matching;
mod navigator;
mod phase1;
mod phase2;
#[doc(hidden)]
pub mod prelude;
pub mod tools;
pub mod view;

pub use crate::clarify::ClarificationCallback;
pub use crate::error::NavError;
pub use crate::navigator::Navigator;
pub use crate::view::{OptionGroup, OptionsLayout, PortalView, Tab};
