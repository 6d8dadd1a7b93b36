#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod cloud;
mod local;
mod message;
#[doc(hidden)]
pub mod prelude;
mod proxy;
mod reasoner;

pub use crate::cloud::CloudReasoner;
pub use crate::local::LocalReasoner;
pub use crate::message::{Decision, Message, MessageRole, ToolSchema};
pub use crate::proxy::ProxyReasoner;
pub use crate::reasoner::Reasoner;
