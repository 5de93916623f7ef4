//! pygrade parser: converts a token stream into a Python AST.

mod parse_expr;
mod parse_stmt;
mod parser;

pub use parser::{parse_source, ParseResult, Parser, MAX_BLOCK_DEPTH, MAX_EXPR_DEPTH};
