//! topowatch CLI library
//!
//! Argument definitions, output rendering and command handlers for the
//! `topowatch` binary. Handlers are public so integration tests can drive
//! them against a temporary data directory.

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
pub mod workspace;
