//! Nearest-neighbour search over a namespaced vector index.

pub mod pinecone;

pub use pinecone::PineconeIndex;

use crate::embeddings::EmbeddingVector;
use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use std::collections::BTreeMap;

/// One nearest-neighbour query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub vector: EmbeddingVector,
    /// `None` searches the index's default namespace
    pub namespace: Option<String>,
    /// Maximum number of matches, at least 1
    pub limit: usize,
    pub filter: Option<MetadataFilter>,
}

impl SearchQuery {
    pub fn new(vector: EmbeddingVector, limit: usize) -> Self {
        Self {
            vector,
            namespace: None,
            limit,
            filter: None,
        }
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_filter(mut self, filter: Option<MetadataFilter>) -> Self {
        self.filter = filter;
        self
    }
}

/// A raw match as the index returned it.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    pub id: String,
    pub score: Option<f32>,
    /// Top-level content, for providers that return one
    pub content: Option<String>,
    pub metadata: Map<String, Value>,
}

/// Conjunction of metadata equality clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    clauses: BTreeMap<String, Value>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// `{"field": {"$eq": value}, ...}`
    pub fn to_json(&self) -> Value {
        let clauses = self
            .clauses
            .iter()
            .map(|(field, value)| {
                let mut clause = Map::new();
                clause.insert("$eq".to_string(), value.clone());
                (field.clone(), Value::Object(clause))
            })
            .collect();
        Value::Object(clauses)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamespaceStats {
    pub vector_count: u64,
}

/// Index-wide statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub dimension: Option<usize>,
    pub index_fullness: f64,
    pub total_vector_count: u64,
    pub namespaces: BTreeMap<String, NamespaceStats>,
}

impl IndexStats {
    /// Namespace names, sorted
    pub fn namespace_names(&self) -> Vec<String> {
        self.namespaces.keys().cloned().collect()
    }

    pub fn vector_count(&self, namespace: &str) -> u64 {
        self.namespaces
            .get(namespace)
            .map(|ns| ns.vector_count)
            .unwrap_or(0)
    }
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Matches in the provider's order (highest similarity first), at most
    /// `query.limit` of them. An empty namespace yields an empty list.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<IndexMatch>>;

    async fn describe_stats(&self) -> Result<IndexStats>;

    /// Whether the credentials needed to call the provider are present
    fn is_available(&self) -> bool;
}
