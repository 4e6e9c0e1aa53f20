//! PathQL - Path Expression Query Language
//!
//! A small language for selecting and modifying nested map/list substructure
//! inside PathDB records. A statement names a bin, a context chain of path
//! steps, and either a return mode (SELECT) or a SET clause (MODIFY).
//!
//! # Syntax Overview
//!
//! ```pathql
//! -- Prune the catalog down to featured products with stock
//! SELECT TREE FROM catalog AT *.*{featured = true}.variants.*{quantity:int > 0};
//!
//! -- Product ids matching a key regex
//! SELECT KEYS FROM catalog AT *.*{key MATCHES '10000.*'};
//!
//! -- Count in-stock variants under 50
//! SELECT COUNT FROM catalog AT *.*.variants.*{quantity > 0 AND price < 50};
//!
//! -- Restock every matched variant, writing the result to another bin
//! MODIFY catalog AT *.*{featured = true}.variants.*{quantity > 0}
//!        SET quantity = quantity + 10 INTO updated;
//!
//! -- Tolerate malformed nested data while matching
//! SELECT TREE FROM catalog AT *.*.variants.*{quantity:int > 0} NOFAIL;
//! ```
//!
//! # Special Features
//!
//! - `*` - step into every child; `*{...}` only into children passing a filter
//! - `key` / `value` / `index` - the loop variable's parts inside a filter
//! - `field:int` - type-annotated lookup on the loop value
//! - `MATCHES` - regex match
//! - `NOFAIL` - malformed nested data becomes a non-match instead of an error
//!
//! Programs usually skip the text form and assemble statements with the
//! builder functions on [`Exp`] and [`PathStep`].

mod ast;
mod parser;
mod error;

pub use ast::*;
pub use error::ParseError;

/// Parse a PathQL statement string into an AST
pub fn parse(input: &str) -> Result<Statement, ParseError> {
    parser::parse_statement(input)
}

/// Parse a bare context chain, e.g. `inventory.*{featured = true}`
pub fn parse_path(input: &str) -> Result<Vec<PathStep>, ParseError> {
    parser::parse_path(input)
}
