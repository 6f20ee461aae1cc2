//! Library half of the `midge` binary: argument definitions, sub-commands and demo tests.

pub mod cli;
pub mod commands;
pub mod demo;

pub use cli::{Cli, Command, OutputFormat};
