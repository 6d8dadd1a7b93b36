#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod poller;
#[doc(hidden)]
pub mod prelude;
mod server_client;

pub use crate::poller::MultiServerPoller;
pub use crate::server_client::ServerClient;
