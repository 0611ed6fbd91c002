#![doc = include_str!("../../../README.md")]
//!

//! This crate bundles the workflow core with the HTTP client for the
//! training service.

pub use mlstudio_client as client;
pub use mlstudio_core::*;
