#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

pub mod config;
pub mod handler;
pub mod portal;
pub mod service;
pub mod tool_dispatch;
