//! docquery CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`. The error response
//! has already been written to stdout; stderr gets a one-line summary and
//! the process exits non-zero.

use docquery::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
