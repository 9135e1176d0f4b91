//! Two-stage retrieval: embed the query, search the vector index, optionally
//! rerank the candidates, and return a bounded, ordered document list.
//!
//! ```text
//! query ──▶ EmbeddingProvider ──▶ VectorIndex ──▶ normalize ──▶ [Reranker] ──▶ Vec<Document>
//! ```
//!
//! Embedding and search are mandatory; a failure in either aborts the call with
//! [`RetrievalError::RetrievalFailed`]. Reranking is an enhancement: when it
//! fails the vector-ordered list is returned instead.


use crate::config::RetrievalConfig;
use crate::document::Document;
use crate::document::normalize_matches;
use crate::document::sort_by_ann_score;
use crate::document::sort_by_rerank_score;
use crate::embeddings::EmbeddingProvider;
use crate::embeddings::RelaceEmbedder;
use crate::error::Result;
use crate::error::RetrievalError;
use crate::error::RetrievalStage;
use crate::rerank::RankedCandidate;
use crate::rerank::RelaceReranker;
use crate::rerank::RerankCandidate;
use crate::rerank::Reranker;
use crate::vector_index::MetadataFilter;
use crate::vector_index::PineconeIndex;
use crate::vector_index::SearchQuery;
use crate::vector_index::VectorIndex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::instrument;
use tracing::warn;

pub const DEFAULT_NUM_DOCUMENTS: usize = 5;

/// Parameters for one retrieval call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalRequest {
    pub query: String,
    pub namespace: Option<String>,
    pub num_documents: usize,
    pub rerank: bool,
    pub top_k_after_rerank: Option<usize>,
    pub filter: Option<MetadataFilter>,
}

impl RetrievalRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            namespace: None,
            num_documents: DEFAULT_NUM_DOCUMENTS,
            rerank: true,
            top_k_after_rerank: None,
            filter: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_num_documents(mut self, num_documents: usize) -> Self {
        self.num_documents = num_documents;
        self
    }

    pub fn with_rerank(mut self, rerank: bool) -> Self {
        self.rerank = rerank;
        self
    }

    pub fn with_top_k_after_rerank(mut self, top_k: usize) -> Self {
        self.top_k_after_rerank = Some(top_k);
        self
    }

    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Result bound after a successful rerank: `top_k_after_rerank`, else
    /// half of `num_documents` rounded down, never below 1.
    pub fn rerank_bound(&self) -> usize {
        self.top_k_after_rerank
            .unwrap_or_else(|| (self.num_documents / 2).max(1))
    }
}

/// Composes the embedding, index and rerank clients. Holds no per-call state,
/// so one instance can serve concurrent calls behind an `Arc`.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    reranker: Arc<dyn Reranker>,
    token_limit: usize,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        reranker: Arc<dyn Reranker>,
        token_limit: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            reranker,
            token_limit,
        }
    }

    /// Build the Relace/Pinecone pipeline from `config`.
    pub fn from_config(config: &RetrievalConfig) -> Result<Self> {
        Ok(Self::new(
            Arc::new(RelaceEmbedder::new(&config.embedding)?),
            Arc::new(PineconeIndex::new(&config.index)?),
            Arc::new(RelaceReranker::new(&config.rerank)?),
            config.rerank.token_limit,
        ))
    }

    #[instrument(
        skip_all,
        fields(
            namespace = request.namespace.as_deref().unwrap_or("default"),
            num_documents = request.num_documents,
            rerank = request.rerank,
        )
    )]
    pub async fn retrieve(&self, request: &RetrievalRequest) -> Result<Vec<Document>> {
        self.validate(request)?;
        info!("Starting retrieval for query: {}", request.query);

        let query_vector = self.embedder.embed(&request.query).await.map_err(|e| {
            error!(provider = %self.embedder.model_id(), query = %request.query, "Query embedding failed: {e}");
            RetrievalError::failed_at(RetrievalStage::Embed, e)
        })?;

        let search = SearchQuery::new(query_vector, request.num_documents)
            .with_namespace(request.namespace.clone())
            .with_filter(request.filter.clone());
        let matches = self.index.search(&search).await.map_err(|e| {
            error!(query = %request.query, "Vector search failed: {e}");
            RetrievalError::failed_at(RetrievalStage::Search, e)
        })?;

        if matches.is_empty() {
            info!("No documents found for query: {}", request.query);
            return Ok(Vec::new());
        }
        info!("Found {} documents from vector search", matches.len());

        let documents = normalize_matches(matches, request.namespace.as_deref());

        let documents = if request.rerank {
            self.rerank_or_fallback(request, documents).await
        } else {
            vector_ordered(documents, request.num_documents)
        };

        info!("Returning {} documents", documents.len());
        Ok(documents)
    }

    /// [`Retriever::retrieve`], abandoned as soon as `cancel` fires.
    pub async fn retrieve_with_cancel(
        &self,
        request: &RetrievalRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<Document>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Retrieval cancelled for query: {}", request.query);
                Err(RetrievalError::Cancelled)
            }
            result = self.retrieve(request) => result,
        }
    }

    /// Drive [`Retriever::retrieve`] to completion on a private
    /// current-thread runtime. Fails with a configuration error when called
    /// from inside a tokio runtime, where blocking would panic.
    pub fn retrieve_blocking(&self, request: &RetrievalRequest) -> Result<Vec<Document>> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(RetrievalError::Configuration(
                "retrieve_blocking called from inside an async runtime; use retrieve".to_string(),
            ));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.retrieve(request))
    }

    fn validate(&self, request: &RetrievalRequest) -> Result<()> {
        if request.query.trim().is_empty() {
            return Err(RetrievalError::Configuration(
                "query must not be empty".to_string(),
            ));
        }
        if !self.embedder.is_available() {
            return Err(RetrievalError::Configuration(
                "embedding provider credentials are missing".to_string(),
            ));
        }
        if !self.index.is_available() {
            return Err(RetrievalError::Configuration(
                "vector index credentials are missing".to_string(),
            ));
        }
        if request.num_documents == 0 {
            return Err(RetrievalError::InvalidRequest(
                "num_documents must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    async fn rerank_or_fallback(
        &self,
        request: &RetrievalRequest,
        documents: Vec<Document>,
    ) -> Vec<Document> {
        if !self.reranker.is_available() {
            warn!("Reranker credentials missing, returning vector-ordered results");
            return vector_ordered(documents, request.num_documents);
        }

        info!("Applying reranking to {} documents", documents.len());
        let candidates: Vec<RerankCandidate> = documents
            .iter()
            .map(|doc| RerankCandidate::new(doc.name.clone(), doc.content.clone()))
            .collect();

        match self
            .reranker
            .rerank(&request.query, &candidates, self.token_limit)
            .await
        {
            Ok(ranked) => {
                let reranked = apply_rerank(documents, ranked, request.rerank_bound());
                info!("After reranking: {} documents", reranked.len());
                reranked
            }
            Err(e) => {
                warn!(provider = ?e.provider(), "Reranking failed, returning vector-ordered results: {e}");
                vector_ordered(documents, request.num_documents)
            }
        }
    }
}

/// Sort by ANN score and cut to `limit`.
pub(crate) fn vector_ordered(mut documents: Vec<Document>, limit: usize) -> Vec<Document> {
    sort_by_ann_score(&mut documents);
    documents.truncate(limit);
    documents
}

/// Attach rerank scores and keep only the scored documents, best first.
///
/// A result is matched by its echoed index when that index names a candidate
/// with the same name, otherwise by name. Names are not unique: a name's score
/// goes to the first document carrying it, and once a document is scored any
/// later result for it is ignored.
pub(crate) fn apply_rerank(
    documents: Vec<Document>,
    ranked: Vec<RankedCandidate>,
    bound: usize,
) -> Vec<Document> {
    let mut first_by_name: HashMap<&str, usize> = HashMap::with_capacity(documents.len());
    for (i, doc) in documents.iter().enumerate() {
        first_by_name.entry(doc.name.as_str()).or_insert(i);
    }

    let mut scores: Vec<Option<f32>> = vec![None; documents.len()];
    for result in ranked {
        let by_index = result
            .index
            .filter(|i| documents.get(*i).is_some_and(|d| d.name == result.name));
        let Some(target) = by_index.or_else(|| first_by_name.get(result.name.as_str()).copied())
        else {
            debug!(name = %result.name, "Rerank result matches no candidate");
            continue;
        };
        match scores[target] {
            None => scores[target] = Some(result.score),
            Some(_) => debug!(name = %result.name, "Ignoring repeated rerank result"),
        }
    }

    let mut reranked: Vec<Document> = documents
        .into_iter()
        .zip(scores)
        .filter_map(|(mut doc, score)| {
            doc.rerank_score = Some(score?);
            Some(doc)
        })
        .collect();
    sort_by_rerank_score(&mut reranked);
    reranked.truncate(bound);
    reranked
}
