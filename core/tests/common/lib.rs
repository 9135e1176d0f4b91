//! Fixtures shared by the `codelens-core` integration tests: a config that
//! points every provider at one `MockServer`, and canned provider bodies.

use codelens_core::config::RetrievalConfig;
use serde_json::Value;
use serde_json::json;
use wiremock::MockServer;

pub const EMBED_PATH: &str = "/v1/code/embed";
pub const RANK_PATH: &str = "/v2/code/rank";
pub const QUERY_PATH: &str = "/query";
pub const STATS_PATH: &str = "/describe_index_stats";
pub const INDEXES_PATH: &str = "/indexes";

pub const RELACE_TEST_KEY: &str = "relace-test-key";
pub const PINECONE_TEST_KEY: &str = "pinecone-test-key";

/// Config with credentials set and every endpoint on `server`.
pub fn mock_config(server: &MockServer) -> RetrievalConfig {
    let base = server.uri();
    let mut config = RetrievalConfig::default();
    config.embedding.api_key = Some(RELACE_TEST_KEY.to_string());
    config.embedding.url = format!("{base}{EMBED_PATH}");
    config.embedding.dimensions = 3;
    config.rerank.api_key = Some(RELACE_TEST_KEY.to_string());
    config.rerank.url = format!("{base}{RANK_PATH}");
    config.index.api_key = Some(PINECONE_TEST_KEY.to_string());
    config.index.host = Some(base.clone());
    config.index.control_plane_url = base;
    config.index.dimension = 3;
    config
}

/// Same as [`mock_config`] but the data-plane host is left for discovery.
pub fn mock_config_without_host(server: &MockServer) -> RetrievalConfig {
    let mut config = mock_config(server);
    config.index.host = None;
    config
}

pub fn embed_response(vectors: &[Vec<f32>]) -> Value {
    let results: Vec<Value> = vectors
        .iter()
        .enumerate()
        .map(|(index, embedding)| json!({"index": index, "embedding": embedding}))
        .collect();
    json!({"results": results, "usage": {"total_tokens": 7}})
}

/// A query match storing its body in metadata, as the indexer writes it.
pub fn code_match(id: &str, score: f32, file_path: &str, content: &str) -> Value {
    json!({
        "id": id,
        "score": score,
        "metadata": {
            "content": content,
            "file_path": file_path,
            "language": "rust",
            "repo_id": "repoA",
        }
    })
}

pub fn query_response(matches: Vec<Value>) -> Value {
    json!({"matches": matches, "namespace": "repoA"})
}

pub fn rank_response(scores: &[(&str, f32)]) -> Value {
    let results: Vec<Value> = scores
        .iter()
        .map(|(filename, score)| json!({"filename": filename, "score": score}))
        .collect();
    json!({"results": results})
}
