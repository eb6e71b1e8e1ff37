//! CLI module for docquery
//!
//! Provides command-line access to:
//! - sarg: spans a predicate derives for one index key
//! - explain: the plan chosen for a query
//! - query: one-shot query execution over a configured in-memory catalog
//! - create-index: one-shot index creation

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{create_index, explain, query, run, run_command, sarg, QueryArgs};
pub use config::{Config, IndexConfig, KeyspaceConfig};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_error_to, write_response, write_response_to};
