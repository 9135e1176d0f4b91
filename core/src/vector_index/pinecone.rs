//! Pinecone vector index client
//!
//! Data-plane calls (`/query`, `/describe_index_stats`) go to the index host.
//! The host comes from config or, when absent, from the control plane's
//! description of the index; it is resolved once per client.

use super::IndexMatch;
use super::IndexStats;
use super::NamespaceStats;
use super::SearchQuery;
use super::VectorIndex;
use crate::config::IndexConfig;
use crate::error::ProviderKind;
use crate::error::Result;
use crate::error::RetrievalError;
use crate::http;
use crate::provider_response::json_kind;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::RequestBuilder;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use std::collections::BTreeMap;
use tokio::sync::OnceCell;
use tracing::debug;
use tracing::info;
use tracing::warn;

const PROVIDER: ProviderKind = ProviderKind::VectorIndex;
const API_VERSION: &str = "2024-07";

pub struct PineconeIndex {
    client: Client,
    api_key: Option<String>,
    name: String,
    control_plane_url: String,
    dimension: usize,
    metric: String,
    cloud: String,
    region: String,
    host: OnceCell<String>,
}

/// Control-plane description of an index.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IndexDescription {
    pub name: String,
    #[serde(default)]
    pub dimension: Option<usize>,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub status: Option<IndexStatus>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IndexStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    index_fullness: f64,
    #[serde(default)]
    total_vector_count: u64,
    #[serde(default)]
    namespaces: BTreeMap<String, NamespaceSummary>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceSummary {
    #[serde(default)]
    vector_count: u64,
}

impl PineconeIndex {
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let host = match config.host.as_deref().filter(|h| !h.is_empty()) {
            Some(host) => OnceCell::new_with(Some(normalize_host(host))),
            None => OnceCell::new(),
        };
        Ok(Self {
            client: http::build_client(PROVIDER, config.timeout())?,
            api_key: config.api_key.clone(),
            name: config.name.clone(),
            control_plane_url: config.control_plane_url.trim_end_matches('/').to_string(),
            dimension: config.dimension,
            metric: config.metric.clone(),
            cloud: config.cloud.clone(),
            region: config.region.clone(),
            host,
        })
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RetrievalError::Configuration("vector index API key is not set".to_string()))
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder> {
        Ok(builder
            .header("Api-Key", self.api_key()?)
            .header("X-Pinecone-API-Version", API_VERSION))
    }

    async fn host(&self) -> Result<&str> {
        let host = self
            .host
            .get_or_try_init(|| async {
                let description = self.describe_index().await?.ok_or_else(|| {
                    RetrievalError::Configuration(format!("index '{}' not found", self.name))
                })?;
                if description.host.is_empty() {
                    return Err(RetrievalError::malformed(
                        PROVIDER,
                        format!("index '{}' has no host", self.name),
                    ));
                }
                debug!(index = %self.name, host = %description.host, "Resolved index host");
                Ok::<_, RetrievalError>(normalize_host(&description.host))
            })
            .await?;
        Ok(host.as_str())
    }

    /// Describe the configured index; `None` when it does not exist.
    pub async fn describe_index(&self) -> Result<Option<IndexDescription>> {
        let url = format!("{}/indexes/{}", self.control_plane_url, self.name);
        let response = self
            .authorized(self.client.get(&url))?
            .send()
            .await
            .map_err(|e| http::transport_error(PROVIDER, e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = http::read_json(PROVIDER, response).await?;
        serde_json::from_value(body)
            .map(Some)
            .map_err(|e| RetrievalError::malformed(PROVIDER, format!("index description: {e}")))
    }

    /// Return the configured index, creating a serverless one from the
    /// configured dimension, metric, cloud and region when it is missing.
    pub async fn ensure_index(&self) -> Result<IndexDescription> {
        if let Some(existing) = self.describe_index().await? {
            return Ok(existing);
        }

        info!(
            index = %self.name,
            dimension = self.dimension,
            cloud = %self.cloud,
            region = %self.region,
            "Creating vector index"
        );
        let url = format!("{}/indexes", self.control_plane_url);
        let request = json!({
            "name": self.name,
            "dimension": self.dimension,
            "metric": self.metric,
            "spec": {
                "serverless": {
                    "cloud": self.cloud,
                    "region": self.region,
                }
            }
        });
        let response = self
            .authorized(self.client.post(&url))?
            .json(&request)
            .send()
            .await
            .map_err(|e| http::transport_error(PROVIDER, e))?;
        let body = http::read_json(PROVIDER, response).await?;
        serde_json::from_value(body)
            .map_err(|e| RetrievalError::malformed(PROVIDER, format!("created index: {e}")))
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<IndexMatch>> {
        if query.limit == 0 {
            return Err(RetrievalError::InvalidRequest(
                "search limit must be at least 1".to_string(),
            ));
        }

        let request = QueryRequest {
            vector: &query.vector,
            top_k: query.limit,
            include_metadata: true,
            include_values: false,
            namespace: query.namespace.as_deref().filter(|ns| !ns.is_empty()),
            filter: query
                .filter
                .as_ref()
                .filter(|f| !f.is_empty())
                .map(|f| f.to_json()),
        };

        let url = format!("{}/query", self.host().await?);
        let response = self
            .authorized(self.client.post(&url))?
            .json(&request)
            .send()
            .await
            .map_err(|e| http::transport_error(PROVIDER, e))?;
        let body = http::read_json(PROVIDER, response).await?;

        let mut matches = decode_matches(body)?;
        matches.truncate(query.limit);
        debug!(
            namespace = query.namespace.as_deref().unwrap_or_default(),
            count = matches.len(),
            "Vector search complete"
        );
        Ok(matches)
    }

    async fn describe_stats(&self) -> Result<IndexStats> {
        let url = format!("{}/describe_index_stats", self.host().await?);
        let response = self
            .authorized(self.client.post(&url))?
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| http::transport_error(PROVIDER, e))?;
        let body = http::read_json(PROVIDER, response).await?;
        let stats: StatsResponse = serde_json::from_value(body)
            .map_err(|e| RetrievalError::malformed(PROVIDER, format!("index stats: {e}")))?;

        Ok(IndexStats {
            dimension: stats.dimension,
            index_fullness: stats.index_fullness,
            total_vector_count: stats.total_vector_count,
            namespaces: stats
                .namespaces
                .into_iter()
                .map(|(name, ns)| {
                    (
                        name,
                        NamespaceStats {
                            vector_count: ns.vector_count,
                        },
                    )
                })
                .collect(),
        })
    }

    fn is_available(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

/// Decode a query response. A missing or null `matches` list means the
/// namespace holds nothing.
fn decode_matches(body: Value) -> Result<Vec<IndexMatch>> {
    let Value::Object(mut object) = body else {
        return Err(RetrievalError::malformed(
            PROVIDER,
            format!("expected an object, found {}", json_kind(&body)),
        ));
    };

    let items = match object.remove("matches") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(RetrievalError::malformed(
                PROVIDER,
                format!("matches is {}, not a list", json_kind(&other)),
            ));
        }
    };

    let mut matches = Vec::with_capacity(items.len());
    for item in items {
        let Value::Object(mut fields) = item else {
            warn!("Skipping non-object match in index response");
            continue;
        };
        let id = match fields.remove("id") {
            Some(Value::String(id)) if !id.is_empty() => id,
            _ => {
                warn!("Skipping match without an id");
                continue;
            }
        };
        let score = fields
            .get("score")
            .and_then(Value::as_f64)
            .map(|s| s as f32);
        let content = match fields.remove("content") {
            Some(Value::String(text)) => Some(text),
            _ => None,
        };
        let metadata = match fields.remove("metadata") {
            Some(Value::Object(metadata)) => metadata,
            _ => Map::new(),
        };
        matches.push(IndexMatch {
            id,
            score,
            content,
            metadata,
        });
    }
    Ok(matches)
}
