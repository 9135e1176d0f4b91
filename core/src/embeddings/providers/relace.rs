//! Relace code-embedding provider
//!
//! Supports:
//! - relace-embed-v1 (1024 dimensions)
//! - One request per call; callers decide the batch
//! - Preferred `results[].embedding` response key with `data[].embedding` fallback

use super::super::EmbeddingProvider;
use super::super::EmbeddingVector;
use crate::config::EmbeddingConfig;
use crate::error::ProviderKind;
use crate::error::Result;
use crate::error::RetrievalError;
use crate::http;
use crate::provider_response::ProviderResponse;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

const PROVIDER: ProviderKind = ProviderKind::Embedding;

/// Relace embedding provider
pub struct RelaceEmbedder {
    client: Client,
    api_key: Option<String>,
    url: String,
    model: String,
    dimensions: usize,
}

impl RelaceEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: http::build_client(PROVIDER, config.timeout())?,
            api_key: config.api_key.clone(),
            url: config.url.clone(),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }
}

#[derive(Debug, Serialize)]
struct RelaceEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct RelaceEmbedding {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

#[async_trait]
impl EmbeddingProvider for RelaceEmbedder {
    fn model_id(&self) -> String {
        format!("relace:{}", self.model)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Err(RetrievalError::InvalidRequest(
                "embedding input must contain at least one text".to_string(),
            ));
        }
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RetrievalError::Configuration("embedding API key is not set".to_string()))?;

        let request = RelaceEmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| http::transport_error(PROVIDER, e))?;

        let body = http::read_json(PROVIDER, response).await?;
        if let Some(usage) = body.get("usage") {
            debug!(%usage, "Embedding usage");
        }

        let embeddings = self.decode_embeddings(body, texts.len())?;
        debug!("Generated embeddings for {} texts", texts.len());
        Ok(embeddings)
    }

    fn is_available(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

impl RelaceEmbedder {
    fn decode_embeddings(&self, body: Value, expected: usize) -> Result<Vec<EmbeddingVector>> {
        let items = match ProviderResponse::decode(body, &["results", "data"]) {
            ProviderResponse::Envelope { key, items } => {
                if key != "results" {
                    debug!(key, "Embedding response used fallback key");
                }
                items
            }
            ProviderResponse::RawList(_) => {
                return Err(RetrievalError::malformed(
                    PROVIDER,
                    "bare list without a results or data key",
                ));
            }
            ProviderResponse::Malformed(reason) => {
                warn!("No embeddings found in response: {reason}");
                return Err(RetrievalError::malformed(PROVIDER, reason));
            }
        };

        if items.len() != expected {
            return Err(RetrievalError::malformed(
                PROVIDER,
                format!("expected {expected} embeddings, got {}", items.len()),
            ));
        }

        let mut embeddings = items
            .into_iter()
            .enumerate()
            .map(|(position, item)| {
                serde_json::from_value::<RelaceEmbedding>(item).map_err(|e| {
                    RetrievalError::malformed(PROVIDER, format!("result {position}: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // Sort by index when the provider reports one for every item
        if embeddings.iter().all(|e| e.index.is_some()) {
            embeddings.sort_by_key(|e| e.index);
        }

        for embedding in &embeddings {
            if embedding.embedding.len() != self.dimensions {
                return Err(RetrievalError::malformed(
                    PROVIDER,
                    format!(
                        "dimension mismatch: expected {}, got {}",
                        self.dimensions,
                        embedding.embedding.len()
                    ),
                ));
            }
        }

        Ok(embeddings.into_iter().map(|e| e.embedding).collect())
    }
}
