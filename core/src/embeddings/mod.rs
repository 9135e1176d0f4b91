//! Query embedding - turns text into fixed-length vectors through a remote
//! embedding service.
//!
//! Providers are leaf dependencies of the retriever: they hold connection
//! settings and nothing else.

pub mod providers;

pub use providers::RelaceEmbedder;

use crate::error::ProviderKind;
use crate::error::Result;
use crate::error::RetrievalError;
use async_trait::async_trait;

pub type EmbeddingVector = Vec<f32>;

/// Trait for embedding providers
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Unique model identifier, e.g. `relace:relace-embed-v1`
    fn model_id(&self) -> String;

    /// Length of every vector this provider returns
    fn dimensions(&self) -> usize;

    /// Embed `texts` in one request. One vector per input, same order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>>;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| RetrievalError::malformed(ProviderKind::Embedding, "empty result list"))
    }

    /// Whether the credentials needed to call the provider are present
    fn is_available(&self) -> bool;
}
