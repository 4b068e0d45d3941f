//! Subcommand implementations.

pub mod config;
pub mod migrate;
pub mod recommend;
