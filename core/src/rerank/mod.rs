//! Second-stage relevance scoring over a small candidate set.

pub mod relace;

pub use relace::RelaceReranker;

use crate::error::Result;
use async_trait::async_trait;

/// A candidate sent to the reranker.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankCandidate {
    pub name: String,
    pub content: String,
}

impl RerankCandidate {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// A scored candidate returned by the reranker.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub name: String,
    pub score: f32,
    /// Position of the candidate in the request, when the provider echoes it
    pub index: Option<usize>,
}

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Score `candidates` against `query`.
    ///
    /// The result is a subset of the input names in provider order; the
    /// caller owns the final sort. An empty candidate list returns an empty
    /// result without a network call.
    async fn rerank(
        &self,
        query: &str,
        candidates: &[RerankCandidate],
        token_limit: usize,
    ) -> Result<Vec<RankedCandidate>>;

    fn is_available(&self) -> bool;
}
