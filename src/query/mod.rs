//! # Query engine (C7)
//!
//! Entry point `query(q) -> QueryResult`: drives the C3 walker over C4–C6
//! to answer "where can I fetch this content, and under what
//! authorization?" (spec §1, §4.7). Also hosts the `publish`/`cache` write
//! entry points that orchestrate C4 and C6's own write paths.

pub mod codec;
pub mod engine;

pub use engine::QueryEngine;
