//! Error taxonomy for the retrieval core.
//!
//! Mandatory-path failures (embed, search) surface as
//! [`RetrievalError::RetrievalFailed`] wrapping the provider error that caused
//! them. Reranker failures never reach the caller; the orchestrator downgrades
//! them to an unranked result.

use std::fmt;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RetrievalError>;

/// The external service an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Embedding,
    VectorIndex,
    Reranker,
}

impl ProviderKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Embedding => "embedding",
            ProviderKind::VectorIndex => "vector-index",
            ProviderKind::Reranker => "reranker",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage at which a retrieval aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStage {
    Embed,
    Search,
}

impl fmt::Display for RetrievalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalStage::Embed => f.write_str("embed"),
            RetrievalStage::Search => f.write_str("search"),
        }
    }
}

#[derive(Error, Debug)]
pub enum RetrievalError {
    /// A credential or setting needed to reach a provider is missing.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The caller passed arguments a client cannot act on.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Transport failure, timeout or non-2xx status.
    #[error("{provider} provider unavailable: {message}")]
    ProviderUnavailable {
        provider: ProviderKind,
        message: String,
    },

    /// 2xx response whose body matches no recognized shape.
    #[error("malformed {provider} response: {message}")]
    MalformedResponse {
        provider: ProviderKind,
        message: String,
    },

    #[error("retrieval failed during {stage}: {source}")]
    RetrievalFailed {
        stage: RetrievalStage,
        #[source]
        source: Box<RetrievalError>,
    },

    #[error("retrieval cancelled")]
    Cancelled,

    #[error("failed to parse config: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RetrievalError {
    pub fn unavailable(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider,
            message: message.into(),
        }
    }

    pub fn malformed(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            provider,
            message: message.into(),
        }
    }

    pub(crate) fn failed_at(stage: RetrievalStage, source: RetrievalError) -> Self {
        Self::RetrievalFailed {
            stage,
            source: Box::new(source),
        }
    }

    /// Provider the error (or its wrapped cause) came from, if any.
    pub fn provider(&self) -> Option<ProviderKind> {
        match self {
            Self::ProviderUnavailable { provider, .. } | Self::MalformedResponse { provider, .. } => {
                Some(*provider)
            }
            Self::RetrievalFailed { source, .. } => source.provider(),
            _ => None,
        }
    }

    /// True when this error, or the cause it wraps, is a malformed response.
    pub fn is_malformed_response(&self) -> bool {
        match self {
            Self::MalformedResponse { .. } => true,
            Self::RetrievalFailed { source, .. } => source.is_malformed_response(),
            _ => false,
        }
    }

    pub fn is_retrieval_failure(&self) -> bool {
        matches!(self, Self::RetrievalFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_error_reports_inner_provider() {
        let err = RetrievalError::failed_at(
            RetrievalStage::Embed,
            RetrievalError::malformed(ProviderKind::Embedding, "no results key"),
        );
        assert!(err.is_retrieval_failure());
        assert!(err.is_malformed_response());
        assert_eq!(err.provider(), Some(ProviderKind::Embedding));
        assert_eq!(
            err.to_string(),
            "retrieval failed during embed: malformed embedding response: no results key"
        );
    }

    #[test]
    fn test_configuration_error_has_no_provider() {
        let err = RetrievalError::Configuration("RELACE_API_KEY is not set".to_string());
        assert_eq!(err.provider(), None);
        assert!(!err.is_malformed_response());
    }
}
