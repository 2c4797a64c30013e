//! Command-line interface

pub mod args;
pub mod commands;

pub use args::{with_default_subcommand, Cli, Commands};
