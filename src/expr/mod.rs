//! Expression model
//!
//! Parsing, evaluation and canonical printing of the predicate language
//! used by filters and index keys.
//!
//! Values are JSON. An evaluation result of `None` is MISSING, which is
//! distinct from a JSON `null`.

mod ast;
mod collation;
mod errors;
mod eval;
mod lexer;
mod parser;
mod stringer;

pub use ast::{Binding, Expression, WhenThen};
pub use collation::{collate, collate_slices, same_type, type_rank};
pub use errors::{ExprError, ExprResult};
pub use eval::{is_true, like_regex, truth, Bindings};
pub use parser::parse;
pub use stringer::stringify;
