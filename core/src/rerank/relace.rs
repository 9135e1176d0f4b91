//! Relace code reranker
//!
//! Sends `{query, codebase: [{filename, code}], token_limit}` and accepts
//! either `{results: [...]}` or a bare list of `{filename, score}` records.
//! Records missing either field are skipped.

use super::RankedCandidate;
use super::RerankCandidate;
use super::Reranker;
use crate::config::RerankConfig;
use crate::error::ProviderKind;
use crate::error::Result;
use crate::error::RetrievalError;
use crate::http;
use crate::provider_response::ProviderResponse;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

const PROVIDER: ProviderKind = ProviderKind::Reranker;

pub struct RelaceReranker {
    client: Client,
    api_key: Option<String>,
    url: String,
}

impl RelaceReranker {
    pub fn new(config: &RerankConfig) -> Result<Self> {
        Ok(Self {
            client: http::build_client(PROVIDER, config.timeout())?,
            api_key: config.api_key.clone(),
            url: config.url.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
struct RankRequest<'a> {
    query: &'a str,
    codebase: Vec<CodeFile<'a>>,
    token_limit: usize,
}

#[derive(Debug, Serialize)]
struct CodeFile<'a> {
    filename: &'a str,
    code: &'a str,
}

#[async_trait]
impl Reranker for RelaceReranker {
    async fn rerank(
        &self,
        query: &str,
        candidates: &[RerankCandidate],
        token_limit: usize,
    ) -> Result<Vec<RankedCandidate>> {
        if candidates.is_empty() {
            warn!("Empty codebase provided for ranking");
            return Ok(Vec::new());
        }
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RetrievalError::Configuration("reranker API key is not set".to_string()))?;

        let request = RankRequest {
            query,
            codebase: candidates
                .iter()
                .map(|c| CodeFile {
                    filename: &c.name,
                    code: &c.content,
                })
                .collect(),
            token_limit,
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

        let ranked = decode_ranked(body, candidates.len())?;
        debug!(
            "Ranked {} files by relevance, {} returned",
            candidates.len(),
            ranked.len()
        );
        Ok(ranked)
    }

    fn is_available(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

fn decode_ranked(body: Value, candidate_count: usize) -> Result<Vec<RankedCandidate>> {
    let items = ProviderResponse::decode(body, &["results"])
        .into_items()
        .map_err(|reason| {
            warn!("Unexpected reranker response structure: {reason}");
            RetrievalError::malformed(PROVIDER, reason)
        })?;

    Ok(items
        .into_iter()
        .filter_map(|item| {
            let ranked = parse_ranked(&item, candidate_count);
            if ranked.is_none() {
                warn!("Skipping invalid result item: {item}");
            }
            ranked
        })
        .collect())
}

fn parse_ranked(item: &Value, candidate_count: usize) -> Option<RankedCandidate> {
    let name = item.get("filename")?.as_str()?.to_string();
    let score = item.get("score")?.as_f64()? as f32;
    let index = item
        .get("index")
        .and_then(Value::as_u64)
        .and_then(|i| usize::try_from(i).ok())
        .filter(|i| *i < candidate_count);
    Some(RankedCandidate { name, score, index })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ranked(name: &str, score: f32) -> RankedCandidate {
        RankedCandidate {
            name: name.to_string(),
            score,
            index: None,
        }
    }

    #[test]
    fn test_envelope_response() {
        let result = decode_ranked(
            json!({"results": [{"filename": "a.rs", "score": 0.9}, {"filename": "b.rs", "score": 0.1}]}),
            2,
        )
        .unwrap();
        assert_eq!(result, vec![ranked("a.rs", 0.9), ranked("b.rs", 0.1)]);
    }

    #[test]
    fn test_bare_list_response_skips_invalid_items() {
        let result = decode_ranked(
            json!([
                {"filename": "a.rs", "score": 0.4},
                {"filename": "no-score.rs"},
                {"score": 0.3},
                {"filename": "text-score.rs", "score": "high"},
                7
            ]),
            5,
        )
        .unwrap();
        assert_eq!(result, vec![ranked("a.rs", 0.4)]);
    }

    #[test]
    fn test_echoed_index_is_bounds_checked() {
        let result = decode_ranked(
            json!([
                {"filename": "a.rs", "score": 0.4, "index": 1},
                {"filename": "b.rs", "score": 0.2, "index": 9}
            ]),
            2,
        )
        .unwrap();
        assert_eq!(result[0].index, Some(1));
        assert_eq!(result[1].index, None);
    }

    #[test]
    fn test_unrecognized_shape_is_malformed() {
        let err = decode_ranked(json!({"ranking": []}), 1).unwrap_err();
        assert!(err.is_malformed_response());
        let err = decode_ranked(json!({"results": "nope"}), 1).unwrap_err();
        assert!(err.is_malformed_response());
    }

    #[test]
    fn test_request_shape() {
        let candidates = [RerankCandidate::new("src/auth.rs", "fn login() {}")];
        let request = RankRequest {
            query: "auth",
            codebase: candidates
                .iter()
                .map(|c| CodeFile {
                    filename: &c.name,
                    code: &c.content,
                })
                .collect(),
            token_limit: 100,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "query": "auth",
                "codebase": [{"filename": "src/auth.rs", "code": "fn login() {}"}],
                "token_limit": 100
            })
        );
    }

    #[tokio::test]
    async fn test_empty_candidates_short_circuit() {
        // No API key and an unroutable URL: any network attempt would fail.
        let reranker = RelaceReranker::new(&RerankConfig {
            url: "http://127.0.0.1:9/rank".to_string(),
            ..RerankConfig::default()
        })
        .unwrap();
        let result = reranker.rerank("query", &[], 1000).await.unwrap();
        assert!(result.is_empty());
    }
}
