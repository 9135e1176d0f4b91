//! Root of the `codelens-core` library.
//!
//! Two-stage semantic code retrieval: a query is embedded, matched against a
//! namespaced vector index, optionally reranked, and returned as a bounded,
//! ordered list of [`Document`]s. [`knowledge`] adapts the result for agent
//! grounding and [`tools`] exposes search as agent tools.

// Prevent accidental direct writes to stdout/stderr in library code. All
// user-visible output goes through the CLI.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod config;
pub mod document;
pub mod embeddings;
pub mod error;
mod http;
pub mod knowledge;
mod provider_response;
pub mod rerank;
pub mod retrieval;
pub mod tools;
pub mod vector_index;

pub use config::RetrievalConfig;
pub use document::Document;
pub use error::Result;
pub use error::RetrievalError;
pub use knowledge::KnowledgeBase;
pub use knowledge::KnowledgeRecord;
pub use retrieval::RetrievalRequest;
pub use retrieval::Retriever;
pub use tools::SemanticSearchTools;
pub use vector_index::MetadataFilter;
