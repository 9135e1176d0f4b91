//! Agent-facing tools built on the retrieval clients.

pub mod semantic_search;

pub use semantic_search::SemanticSearchTools;
pub use semantic_search::ToolInfo;
