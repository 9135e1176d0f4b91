//! Knowledge adapter: exposes retrieval results as the plain records an agent
//! framework consumes for grounding.

use crate::config::RetrievalDefaults;
use crate::document::Document;
use crate::document::Metadata;
use crate::error::Result;
use crate::retrieval::RetrievalRequest;
use crate::retrieval::Retriever;
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

/// `{content, id, name, metadata}` as handed to the agent layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeRecord {
    pub content: String,
    pub id: String,
    pub name: String,
    pub metadata: Metadata,
}

impl From<&Document> for KnowledgeRecord {
    fn from(doc: &Document) -> Self {
        Self {
            content: doc.content.clone(),
            id: doc.id.clone(),
            name: doc.name.clone(),
            metadata: doc.metadata.clone(),
        }
    }
}

/// Project documents to records, preserving order.
pub fn to_records(documents: &[Document]) -> Vec<KnowledgeRecord> {
    documents.iter().map(KnowledgeRecord::from).collect()
}

/// A retriever bound to one namespace and a fixed set of request defaults.
#[derive(Clone)]
pub struct KnowledgeBase {
    retriever: Arc<Retriever>,
    namespace: Option<String>,
    num_documents: usize,
    rerank: bool,
    top_k_after_rerank: Option<usize>,
}

impl KnowledgeBase {
    pub fn new(retriever: Arc<Retriever>, namespace: Option<String>) -> Self {
        Self::with_defaults(retriever, namespace, &RetrievalDefaults::default())
    }

    pub fn with_defaults(
        retriever: Arc<Retriever>,
        namespace: Option<String>,
        defaults: &RetrievalDefaults,
    ) -> Self {
        Self {
            retriever,
            namespace,
            num_documents: defaults.num_documents,
            rerank: defaults.rerank,
            top_k_after_rerank: defaults.top_k_after_rerank,
        }
    }

    fn request(&self, query: &str) -> RetrievalRequest {
        let mut request = RetrievalRequest::new(query)
            .with_num_documents(self.num_documents)
            .with_rerank(self.rerank);
        request.namespace = self.namespace.clone();
        request.top_k_after_rerank = self.top_k_after_rerank;
        request
    }

    pub async fn search(&self, query: &str) -> Result<Vec<KnowledgeRecord>> {
        let documents = self.retriever.retrieve(&self.request(query)).await?;
        Ok(to_records(&documents))
    }

    /// Like [`KnowledgeBase::search`], but a failure is logged and reported
    /// as "no grounding available" instead of being propagated.
    pub async fn search_or_empty(&self, query: &str) -> Vec<KnowledgeRecord> {
        match self.search(query).await {
            Ok(records) => records,
            Err(e) => {
                error!(namespace = ?self.namespace, query, "Knowledge search failed: {e}");
                Vec::new()
            }
        }
    }
}
