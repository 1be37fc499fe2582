//! Content indexing service.
//!
//! A claim-graph walker over a provider index and sharded-DAG blob index:
//! given a hash, answers "where can I fetch this content, and under what
//! authorization?" by combining a local cache, an upstream content-routing
//! network, and a legacy claims adapter.
//!
//! Module layout is one directory per subsystem, each with a `mod.rs`
//! carrying that subsystem's own doc comment.

pub mod cache;
pub mod claims;
pub mod config;
pub mod error;
pub mod hash;
pub mod index;
pub mod model;
pub mod provider;
pub mod query;
pub mod queue;
pub mod signing;
pub mod telemetry;
pub mod walker;

pub use error::{IndexingError, Result};
