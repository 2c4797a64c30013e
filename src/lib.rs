//! swift-sh - Run Swift scripts with dependencies
//!
//! Reads dependency declarations from comments next to a script's imports,
//! resolves them through a cached dependencies package, and runs the script
//! with the toolchain invocation that links them.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod import;
pub mod manifest;
pub mod pipeline;
pub mod runner;
pub mod script;
pub mod signals;
pub mod toolchain;

pub use error::{SwiftShError, SwiftShResult};
