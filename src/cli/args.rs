//! CLI argument definitions using clap
//!
//! Commands:
//! - docquery sarg --key <expr> --where <expr>
//! - docquery explain --config <path> --keyspace <name> --where <expr>
//! - docquery query --config <path> --keyspace <name> [--where <expr>]
//! - docquery create-index --config <path> --keyspace <name> --name <index> --key <expr>...

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// docquery - index span compiler and streaming query runtime
#[derive(Parser, Debug)]
#[command(name = "docquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Emit INFO and WARN log lines on stdout
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the spans a predicate derives for one index key
    Sarg {
        /// Index key expression
        #[arg(long)]
        key: String,

        /// Predicate expression
        #[arg(long = "where")]
        predicate: String,
    },

    /// Print the plan chosen for a query without running it
    Explain {
        /// Path to configuration file
        #[arg(long, default_value = "./docquery.json")]
        config: PathBuf,

        /// Keyspace to read
        #[arg(long)]
        keyspace: String,

        /// Predicate expression
        #[arg(long = "where")]
        predicate: Option<String>,

        /// Name each document is bound to
        #[arg(long = "as")]
        alias: Option<String>,

        /// Render the plan as indented text instead of JSON
        #[arg(long)]
        text: bool,
    },

    /// Execute a query and print every matching document
    Query {
        /// Path to configuration file
        #[arg(long, default_value = "./docquery.json")]
        config: PathBuf,

        /// Keyspace to read
        #[arg(long)]
        keyspace: String,

        /// Predicate expression
        #[arg(long = "where")]
        predicate: Option<String>,

        /// Name each document is bound to
        #[arg(long = "as")]
        alias: Option<String>,

        /// Maximum number of documents returned
        #[arg(long)]
        limit: Option<usize>,

        /// Scan each document id at most once
        #[arg(long)]
        distinct: bool,

        /// Named parameter as name=<json>, referenced as $name
        #[arg(long = "param", value_name = "NAME=JSON")]
        params: Vec<String>,
    },

    /// Create a secondary index on a configured keyspace and report it
    CreateIndex {
        /// Path to configuration file
        #[arg(long, default_value = "./docquery.json")]
        config: PathBuf,

        /// Keyspace to index
        #[arg(long)]
        keyspace: String,

        /// Index name
        #[arg(long)]
        name: String,

        /// Key expressions, leading component first
        #[arg(long = "key", required = true)]
        keys: Vec<String>,

        /// Only documents satisfying this condition are indexed
        #[arg(long = "where")]
        condition: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sarg() {
        let cli = Cli::try_parse_from(["docquery", "sarg", "--key", "age", "--where", "age > 5"]).unwrap();
        match cli.command {
            Command::Sarg { key, predicate } => {
                assert_eq!(key, "age");
                assert_eq!(predicate, "age > 5");
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(!cli.verbose);
    }

    #[test]
    fn test_parse_query_with_params() {
        let cli = Cli::try_parse_from([
            "docquery", "query", "--keyspace", "people", "--where", "age = $age", "--param",
            "age=31", "--limit", "2", "--verbose",
        ])
        .unwrap();
        match cli.command {
            Command::Query { config, params, limit, .. } => {
                assert_eq!(config, PathBuf::from("./docquery.json"));
                assert_eq!(params, vec!["age=31".to_string()]);
                assert_eq!(limit, Some(2));
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(cli.verbose);
    }

    #[test]
    fn test_create_index_requires_key() {
        let result = Cli::try_parse_from([
            "docquery", "create-index", "--keyspace", "people", "--name", "ix",
        ]);
        assert!(result.is_err());
    }
}
