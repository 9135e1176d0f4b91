//! Retrieval configuration.
//!
//! Built once at process start (from a TOML file, the environment, or both)
//! and handed by reference to each client constructor. Nothing below this
//! module reads the process environment.

use crate::error::Result;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

pub const RELACE_API_KEY: &str = "RELACE_API_KEY";
pub const RELACE_EMBEDDINGS_URL: &str = "RELACE_EMBEDDINGS_URL";
pub const RELACE_RERANKER_URL: &str = "RELACE_RERANKER_URL";
pub const PINECONE_API_KEY: &str = "PINECONE_API_KEY";
pub const PINECONE_INDEX_NAME: &str = "PINECONE_INDEX_NAME";
pub const PINECONE_INDEX_HOST: &str = "PINECONE_INDEX_HOST";
pub const PINECONE_CLOUD: &str = "PINECONE_CLOUD";
pub const PINECONE_REGION: &str = "PINECONE_REGION";

/// Top-level configuration for the retrieval pipeline.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub rerank: RerankConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub defaults: RetrievalDefaults,
}

/// Embedding provider settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Bearer token; usually supplied through `RELACE_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_embeddings_url")]
    pub url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Expected vector length; responses of any other length are rejected
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            url: default_embeddings_url(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Reranker settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RerankConfig {
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_reranker_url")]
    pub url: String,

    /// Aggregate token budget the reranker considers per call
    #[serde(default = "default_token_limit")]
    pub token_limit: usize,

    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            url: default_reranker_url(),
            token_limit: default_token_limit(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

impl RerankConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Vector index settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_index_name")]
    pub name: String,

    /// Data-plane host. Resolved through the control plane when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default = "default_control_plane_url")]
    pub control_plane_url: String,

    /// Index dimension used when the index has to be created
    #[serde(default = "default_dimensions")]
    pub dimension: usize,

    #[serde(default = "default_metric")]
    pub metric: String,

    #[serde(default = "default_cloud")]
    pub cloud: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Bound on every data-plane and control-plane call
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            name: default_index_name(),
            host: None,
            control_plane_url: default_control_plane_url(),
            dimension: default_dimensions(),
            metric: default_metric(),
            cloud: default_cloud(),
            region: default_region(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

impl IndexConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Per-request defaults used by the knowledge base and toolkit
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalDefaults {
    #[serde(default = "default_num_documents")]
    pub num_documents: usize,

    #[serde(default = "default_true")]
    pub rerank: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k_after_rerank: Option<usize>,
}

impl Default for RetrievalDefaults {
    fn default() -> Self {
        Self {
            num_documents: default_num_documents(),
            rerank: true,
            top_k_after_rerank: None,
        }
    }
}

fn default_embeddings_url() -> String {
    "https://embeddings.endpoint.relace.run/v1/code/embed".to_string()
}

fn default_reranker_url() -> String {
    "https://ranker.endpoint.relace.run/v2/code/rank".to_string()
}

fn default_embedding_model() -> String {
    "relace-embed-v1".to_string()
}

const fn default_dimensions() -> usize {
    1024
}

const fn default_provider_timeout_secs() -> u64 {
    30
}

const fn default_token_limit() -> usize {
    150_000
}

fn default_index_name() -> String {
    "codebase-index".to_string()
}

fn default_control_plane_url() -> String {
    "https://api.pinecone.io".to_string()
}

fn default_metric() -> String {
    "cosine".to_string()
}

fn default_cloud() -> String {
    "aws".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

const fn default_num_documents() -> usize {
    5
}

const fn default_true() -> bool {
    true
}

impl RetrievalConfig {
    /// Parse a TOML document. Settings may sit under a `[retrieval]` table or
    /// at the top level.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let table: HashMap<String, toml::Value> = toml::from_str(contents)?;
        if let Some(section) = table.get("retrieval") {
            return Ok(section.clone().try_into::<RetrievalConfig>()?);
        }
        Ok(toml::from_str(contents)?)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// `~/.codelens/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".codelens").join("config.toml"))
    }

    /// Defaults overlaid with whatever `lookup` resolves.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().with_overrides(lookup)
    }

    /// Apply credentials and endpoints from `lookup` on top of `self`.
    /// Empty values are treated as unset.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = get(RELACE_API_KEY) {
            self.embedding.api_key = Some(key.clone());
            self.rerank.api_key = Some(key);
        }
        if let Some(url) = get(RELACE_EMBEDDINGS_URL) {
            self.embedding.url = url;
        }
        if let Some(url) = get(RELACE_RERANKER_URL) {
            self.rerank.url = url;
        }
        if let Some(key) = get(PINECONE_API_KEY) {
            self.index.api_key = Some(key);
        }
        if let Some(name) = get(PINECONE_INDEX_NAME) {
            self.index.name = name;
        }
        if let Some(host) = get(PINECONE_INDEX_HOST) {
            self.index.host = Some(host);
        }
        if let Some(cloud) = get(PINECONE_CLOUD) {
            self.index.cloud = cloud;
        }
        if let Some(region) = get(PINECONE_REGION) {
            self.index.region = region;
        }
        self
    }

    /// Names of the credentials that are still missing.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.embedding.api_key.as_deref().is_none_or(str::is_empty) {
            missing.push(RELACE_API_KEY);
        }
        if self.index.api_key.as_deref().is_none_or(str::is_empty) {
            missing.push(PINECONE_API_KEY);
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RetrievalConfig::default();
        assert_eq!(config.embedding.model, "relace-embed-v1");
        assert_eq!(config.embedding.dimensions, 1024);
        assert_eq!(config.embedding.timeout(), Duration::from_secs(30));
        assert_eq!(config.rerank.token_limit, 150_000);
        assert_eq!(config.index.name, "codebase-index");
        assert_eq!(config.index.timeout(), Duration::from_secs(30));
        assert_eq!(config.defaults.num_documents, 5);
        assert!(config.defaults.rerank);
        assert_eq!(
            config.missing_credentials(),
            vec![RELACE_API_KEY, PINECONE_API_KEY]
        );
    }

    #[test]
    fn test_lookup_overrides() {
        let config = RetrievalConfig::from_lookup(lookup_from(&[
            (RELACE_API_KEY, "relace-key"),
            (PINECONE_API_KEY, "pc-key"),
            (PINECONE_INDEX_NAME, "repos"),
            (PINECONE_INDEX_HOST, "https://repos.svc.pinecone.io"),
            (PINECONE_REGION, ""),
        ]));
        assert_eq!(config.embedding.api_key.as_deref(), Some("relace-key"));
        assert_eq!(config.rerank.api_key.as_deref(), Some("relace-key"));
        assert_eq!(config.index.api_key.as_deref(), Some("pc-key"));
        assert_eq!(config.index.name, "repos");
        assert_eq!(
            config.index.host.as_deref(),
            Some("https://repos.svc.pinecone.io")
        );
        // empty values do not clobber defaults
        assert_eq!(config.index.region, "us-east-1");
        assert!(config.missing_credentials().is_empty());
    }

    #[test]
    fn test_toml_retrieval_section() {
        let config = RetrievalConfig::from_toml_str(
            r#"
[retrieval.index]
name = "monorepo"
timeout_secs = 10

[retrieval.defaults]
num_documents = 12
rerank = false
"#,
        )
        .unwrap();
        assert_eq!(config.index.name, "monorepo");
        assert_eq!(config.index.timeout(), Duration::from_secs(10));
        assert_eq!(config.defaults.num_documents, 12);
        assert!(!config.defaults.rerank);
        assert_eq!(config.embedding.dimensions, 1024);
    }

    #[test]
    fn test_toml_top_level() {
        let config = RetrievalConfig::from_toml_str(
            r#"
[rerank]
token_limit = 4000
"#,
        )
        .unwrap();
        assert_eq!(config.rerank.token_limit, 4000);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retrieval.embedding]\nmodel = \"relace-embed-v2\"\n").unwrap();

        let config = RetrievalConfig::load_from_file(&path).unwrap();
        assert_eq!(config.embedding.model, "relace-embed-v2");

        let missing = RetrievalConfig::load_from_file(&dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(crate::error::RetrievalError::Io(_))));
    }

    #[test]
    fn test_api_keys_are_not_serialized() {
        let config = RetrievalConfig::from_lookup(lookup_from(&[(RELACE_API_KEY, "secret")]));
        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("secret"));
    }
}
