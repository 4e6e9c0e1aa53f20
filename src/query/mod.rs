//! Query engine for PathDB
//!
//! Turns parsed path expressions into walks over stored bin values.

mod executor;
pub mod filter;

pub use executor::{insert_at, modify, select};
