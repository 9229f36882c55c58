//! Storage backends for sessions, transcripts and projects
//!
//! ## Available Backends
//!
//! - `memory`: in-memory maps (default, tests)
//! - `neo4j`: Neo4j document nodes with a full-text index
//! - `meilisearch`: optional transcript search index layered over Neo4j

pub mod combined;
pub mod meilisearch;
mod memory;
pub mod neo4j;
mod traits;

pub use combined::CombinedStore;
pub use meilisearch::MeilisearchClient;
pub use memory::*;
pub use neo4j::Neo4jClient;
pub use traits::*;
