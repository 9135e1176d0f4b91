//! The retrieval unit handed back to callers, and the normalization that turns
//! raw index matches into it.

use crate::vector_index::IndexMatch;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::collections::HashSet;
use tracing::warn;

pub type Metadata = BTreeMap<String, Value>;

/// Metadata keys the normalizer always populates.
pub mod keys {
    pub const CONTENT: &str = "content";
    pub const FILE_PATH: &str = "file_path";
    pub const LANGUAGE: &str = "language";
    pub const FUNCTION_NAME: &str = "function_name";
    pub const CLASS_NAME: &str = "class_name";
    pub const REPO_ID: &str = "repo_id";
    pub const NAMESPACE: &str = "namespace";
    pub const ANN_SCORE: &str = "ann_score";
}

/// Namespace label recorded when the search was not namespace-scoped.
pub const DEFAULT_NAMESPACE_LABEL: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub name: String,
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ann_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
}

impl Document {
    pub fn new(id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            name: name.into(),
            metadata: Metadata::new(),
            ann_score: None,
            rerank_score: None,
        }
    }

    pub fn with_ann_score(mut self, score: f32) -> Self {
        self.ann_score = Some(score);
        self
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn file_path(&self) -> Option<&str> {
        self.metadata_str(keys::FILE_PATH).filter(|p| !p.is_empty())
    }

    pub fn language(&self) -> Option<&str> {
        self.metadata_str(keys::LANGUAGE).filter(|l| !l.is_empty())
    }
}

/// Placeholder name for a document whose metadata carries no file path.
pub fn placeholder_name(position: usize) -> String {
    format!("doc_{position}.txt")
}

/// Map raw index matches to documents.
///
/// Content is the match's top-level content when non-empty, else its
/// `content` metadata key (the index stores chunk bodies there). The name is
/// the `file_path` metadata value or a positional placeholder. A repeated id
/// keeps its first occurrence.
pub fn normalize_matches(matches: Vec<IndexMatch>, namespace: Option<&str>) -> Vec<Document> {
    let mut seen = HashSet::with_capacity(matches.len());
    let mut documents = Vec::with_capacity(matches.len());

    for (position, m) in matches.into_iter().enumerate() {
        if !seen.insert(m.id.clone()) {
            warn!(id = %m.id, "Dropping duplicate match id from index response");
            continue;
        }
        documents.push(normalize_match(m, position, namespace));
    }

    documents
}

fn normalize_match(m: IndexMatch, position: usize, namespace: Option<&str>) -> Document {
    let IndexMatch {
        id,
        score,
        content: top_level,
        metadata: raw,
    } = m;

    let mut metadata: Metadata = raw.into_iter().collect();

    let stored = match metadata.remove(keys::CONTENT) {
        Some(Value::String(text)) => text,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    let content = top_level.filter(|c| !c.is_empty()).unwrap_or(stored);

    let file_path = metadata
        .get(keys::FILE_PATH)
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    let name = file_path
        .clone()
        .unwrap_or_else(|| placeholder_name(position));

    metadata.insert(
        keys::FILE_PATH.to_string(),
        Value::String(file_path.unwrap_or_default()),
    );
    for key in [keys::LANGUAGE, keys::REPO_ID] {
        metadata
            .entry(key.to_string())
            .or_insert_with(|| Value::String(String::new()));
    }
    for key in [keys::FUNCTION_NAME, keys::CLASS_NAME] {
        metadata.entry(key.to_string()).or_insert(Value::Null);
    }
    metadata.insert(
        keys::NAMESPACE.to_string(),
        Value::String(namespace.unwrap_or(DEFAULT_NAMESPACE_LABEL).to_string()),
    );
    metadata.insert(
        keys::ANN_SCORE.to_string(),
        score
            .and_then(|s| serde_json::Number::from_f64(f64::from(s)))
            .map(Value::Number)
            .unwrap_or(Value::Null),
    );

    Document {
        id,
        content,
        name,
        metadata,
        ann_score: score,
        rerank_score: None,
    }
}

/// Descending comparison where a missing score sorts after every present one.
pub(crate) fn cmp_score_desc(a: Option<f32>, b: Option<f32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort by `ann_score`, highest first.
pub fn sort_by_ann_score(documents: &mut [Document]) {
    documents.sort_by(|a, b| cmp_score_desc(a.ann_score, b.ann_score));
}

/// Stable sort by `rerank_score`, highest first.
pub fn sort_by_rerank_score(documents: &mut [Document]) {
    documents.sort_by(|a, b| cmp_score_desc(a.rerank_score, b.rerank_score));
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn index_match(id: &str, score: Option<f32>, metadata: Value) -> IndexMatch {
        IndexMatch {
            id: id.to_string(),
            score,
            content: None,
            metadata: metadata.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_content_falls_back_to_metadata() {
        let docs = normalize_matches(
            vec![index_match(
                "a#0",
                Some(0.8),
                json!({"content": "fn login() {}", "file_path": "src/auth.rs", "language": "rust"}),
            )],
            Some("repoA"),
        );
        let doc = &docs[0];
        assert_eq!(doc.content, "fn login() {}");
        assert_eq!(doc.name, "src/auth.rs");
        assert_eq!(doc.language(), Some("rust"));
        assert_eq!(doc.metadata_str(keys::NAMESPACE), Some("repoA"));
        assert!(!doc.metadata.contains_key(keys::CONTENT));
        assert_eq!(doc.metadata[keys::FUNCTION_NAME], Value::Null);
        assert_eq!(doc.ann_score, Some(0.8));
    }

    #[test]
    fn test_empty_top_level_content_uses_metadata() {
        let mut m = index_match("a", Some(0.3), json!({"content": "stored body"}));
        m.content = Some(String::new());
        let docs = normalize_matches(vec![m], None);
        assert_eq!(docs[0].content, "stored body");

        let mut m = index_match("b", Some(0.3), json!({"content": "stored body"}));
        m.content = Some("inline body".to_string());
        let docs = normalize_matches(vec![m], None);
        assert_eq!(docs[0].content, "inline body");
    }

    #[test]
    fn test_missing_fields_get_placeholders() {
        let docs = normalize_matches(
            vec![
                index_match("x", None, json!({})),
                index_match("y", Some(0.1), json!({"file_path": ""})),
            ],
            None,
        );
        assert_eq!(docs[0].content, "");
        assert_eq!(docs[0].name, "doc_0.txt");
        assert_eq!(docs[0].metadata[keys::ANN_SCORE], Value::Null);
        assert_eq!(docs[1].name, "doc_1.txt");
        assert_eq!(docs[1].metadata_str(keys::NAMESPACE), Some("default"));
        assert_eq!(docs[1].file_path(), None);
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let docs = normalize_matches(
            vec![
                index_match("same", Some(0.9), json!({"content": "first"})),
                index_match("same", Some(0.8), json!({"content": "second"})),
                index_match("other", Some(0.7), json!({})),
            ],
            None,
        );
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content, "first");
        assert_eq!(docs[1].id, "other");
    }

    #[test]
    fn test_extra_metadata_is_preserved() {
        let docs = normalize_matches(
            vec![index_match("a", None, json!({"start_line": 10}))],
            None,
        );
        assert_eq!(docs[0].metadata["start_line"], json!(10));
    }

    #[test]
    fn test_sort_is_stable_and_puts_unscored_last() {
        let mut docs = vec![
            Document::new("a", "a", ""),
            Document::new("b", "b", "").with_ann_score(0.5),
            Document::new("c", "c", "").with_ann_score(0.9),
            Document::new("d", "d", "").with_ann_score(0.5),
        ];
        sort_by_ann_score(&mut docs);
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "d", "a"]);
    }
}
