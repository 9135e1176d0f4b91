//! Semantic-search toolkit for agents: code search, repository listing and
//! per-repository statistics, each returning a JSON string.
//!
//! Tool calls never fail. Errors are reported inside the JSON payload so the
//! calling agent can read them.

use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::vector_index::IndexMatch;
use crate::vector_index::MetadataFilter;
use crate::vector_index::SearchQuery;
use crate::vector_index::VectorIndex;
use serde_json::Value;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use tracing::error;

pub const DEFAULT_TOP_K: usize = 10;

/// Registration info for one tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: &'static str,
    pub description: &'static str,
}

pub const TOOLS: [ToolInfo; 3] = [
    ToolInfo {
        name: "search_code",
        description: "Search indexed code by semantic similarity, optionally within one repository and language",
    },
    ToolInfo {
        name: "list_repositories",
        description: "List the repository namespaces present in the index",
    },
    ToolInfo {
        name: "get_repository_stats",
        description: "Vector count and index statistics for one repository namespace",
    },
];

pub struct SemanticSearchTools {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl SemanticSearchTools {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    pub fn tool_names() -> Vec<&'static str> {
        TOOLS.iter().map(|tool| tool.name).collect()
    }

    /// Embed `query` and return the nearest chunks.
    ///
    /// `repo_name` scopes the search to that namespace and adds a
    /// `repo_id == repo_name` filter; `file_type` adds `language == file_type`.
    pub async fn search_code(
        &self,
        query: &str,
        repo_name: Option<&str>,
        top_k: usize,
        file_type: Option<&str>,
    ) -> String {
        match self.run_search(query, repo_name, top_k, file_type).await {
            Ok(matches) => {
                let results: Vec<Value> = matches.iter().map(hit_json).collect();
                pretty(&json!({
                    "query": query,
                    "repo_name": repo_name,
                    "total_results": results.len(),
                    "results": results,
                }))
            }
            Err(e) => {
                error!(query, repo_name, "Code search failed: {e}");
                json!({
                    "error": format!("Search failed: {e}"),
                    "query": query,
                    "repo_name": repo_name,
                })
                .to_string()
            }
        }
    }

    async fn run_search(
        &self,
        query: &str,
        repo_name: Option<&str>,
        top_k: usize,
        file_type: Option<&str>,
    ) -> Result<Vec<IndexMatch>> {
        let vector = self.embedder.embed(query).await?;

        let mut filter = MetadataFilter::new();
        if let Some(repo) = repo_name {
            filter = filter.field_eq("repo_id", repo);
        }
        if let Some(language) = file_type {
            filter = filter.field_eq("language", language);
        }

        let search = SearchQuery::new(vector, top_k)
            .with_namespace(repo_name.map(str::to_string))
            .with_filter((!filter.is_empty()).then_some(filter));
        let matches = self.index.search(&search).await?;
        debug!("search_code returned {} matches", matches.len());
        Ok(matches)
    }

    /// Repository namespaces known to the index, sorted.
    pub async fn list_repositories(&self) -> String {
        match self.index.describe_stats().await {
            Ok(stats) => {
                let repositories = stats.namespace_names();
                pretty(&json!({
                    "total_repositories": repositories.len(),
                    "repositories": repositories,
                }))
            }
            Err(e) => {
                error!("Listing repositories failed: {e}");
                json!({ "error": format!("Failed to list repositories: {e}") }).to_string()
            }
        }
    }

    pub async fn get_repository_stats(&self, repo_name: &str) -> String {
        match self.index.describe_stats().await {
            Ok(stats) => pretty(&json!({
                "namespace": repo_name,
                "statistics": {
                    "vector_count": stats.vector_count(repo_name),
                    "dimension": stats.dimension,
                    "index_fullness": stats.index_fullness,
                    "total_vector_count": stats.total_vector_count,
                },
            })),
            Err(e) => {
                error!(repo_name, "Fetching repository stats failed: {e}");
                json!({
                    "error": format!("Failed to get repository stats: {e}"),
                    "namespace": repo_name,
                })
                .to_string()
            }
        }
    }
}

fn hit_json(m: &IndexMatch) -> Value {
    let text = |key: &str| {
        m.metadata
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let content = match m.content.as_deref() {
        Some(inline) if !inline.is_empty() => inline.to_string(),
        _ => text("content"),
    };
    json!({
        "id": m.id,
        "score": m.score,
        "content": content,
        "file_path": text("file_path"),
        "language": text("language"),
        "function_name": m.metadata.get("function_name").cloned().unwrap_or(Value::Null),
        "class_name": m.metadata.get("class_name").cloned().unwrap_or(Value::Null),
    })
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
