//! Storage layer for PathDB
//!
//! Handles reading/writing JSON record files grouped into sets.

pub mod record;
pub mod set;
pub mod codec;
