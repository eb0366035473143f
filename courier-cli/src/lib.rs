//! # courier-cli
//!
//! Argument parsing, command execution and demo scenarios for the `courier` binary.

pub mod cli;
pub mod commands;
pub mod demo;

pub use cli::{Cli, Commands, Direction, Scenario};
pub use commands::run;
