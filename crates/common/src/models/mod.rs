//! Core data contracts shared by the query and indexing pipelines

mod source;

pub use source::{parse_source, SourceArticle, SourceCategory, SourceFolder};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Sentence the model is told to emit when the context holds no answer
pub const NO_ANSWER_TEXT: &str = "I could not find a relevant answer in the provided documents.";

/// Answer returned when the model reply could not be turned into an AnswerResult
pub const INVALID_REPLY_TEXT: &str =
    "The model's response was not valid or did not match the required schema.";

/// Answer returned to end users when a pipeline stage fails
pub const INTERNAL_ERROR_TEXT: &str =
    "Sorry, an internal error occurred while processing your request.";

/// Source identifier of an article, as found in the upstream export.
///
/// Exports carry either numeric or string ids; both map onto the same
/// document id space through [`ArticleId::to_document_id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArticleId {
    Number(serde_json::Number),
    Text(String),
}

impl ArticleId {
    /// Whether the identifier counts as present. Zero and the empty string do not.
    pub fn is_present(&self) -> bool {
        match self {
            ArticleId::Number(n) => n.as_f64().map_or(true, |v| v != 0.0),
            ArticleId::Text(s) => !s.is_empty(),
        }
    }

    /// Deterministic document id. Equal source ids always give equal document ids.
    pub fn to_document_id(&self) -> String {
        match self {
            ArticleId::Number(n) => n.to_string(),
            ArticleId::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_document_id())
    }
}

/// Metadata stored alongside every document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub article_id: ArticleId,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// The unit of retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Deterministic id derived from the source article id
    pub id: String,

    /// Cleaned plain text, never empty
    pub content: String,

    pub metadata: DocumentMetadata,
}

/// A document returned by the vector store for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    #[serde(flatten)]
    pub document: Document,

    /// Similarity score, higher is more relevant
    pub score: f32,
}

impl RetrievedDocument {
    pub fn title(&self) -> &str {
        &self.document.metadata.title
    }
}

/// A document paired with its content embedding, ready to be written
#[derive(Debug, Clone)]
pub struct EmbeddedDocument {
    pub document: Document,
    pub embedding: Vec<f32>,
}

/// Keep the last item per id, in order of that last occurrence
pub(crate) fn keep_last_by_id<T>(items: Vec<T>, id: impl Fn(&T) -> &str) -> Vec<T> {
    let mut last: HashMap<String, usize> = HashMap::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        last.insert(id(item).to_string(), i);
    }
    items
        .into_iter()
        .enumerate()
        .filter(|(i, item)| last.get(id(item)) == Some(i))
        .map(|(_, item)| item)
        .collect()
}

/// The answer contract returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResult {
    /// Final answer text, always populated
    pub answer: String,

    /// Titles of the documents the answer is based on
    pub references: Vec<String>,
}

impl AnswerResult {
    /// The answer the model gives when the context holds nothing relevant
    pub fn no_answer() -> Self {
        Self {
            answer: NO_ANSWER_TEXT.to_string(),
            references: Vec::new(),
        }
    }

    /// Safe answer used when the model reply could not be extracted
    pub fn invalid_reply(detail: Option<&str>) -> Self {
        let answer = match detail {
            Some(detail) => format!("{} Details: {}", INVALID_REPLY_TEXT, detail),
            None => INVALID_REPLY_TEXT.to_string(),
        };
        Self {
            answer,
            references: Vec::new(),
        }
    }

    /// Answer shown to end users when the pipeline itself failed
    pub fn internal_error() -> Self {
        Self {
            answer: INTERNAL_ERROR_TEXT.to_string(),
            references: Vec::new(),
        }
    }

    /// True when the answer says nothing relevant was found
    pub fn is_no_answer(&self) -> bool {
        self.answer.trim() == NO_ANSWER_TEXT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_id_forms() {
        let numeric: ArticleId = serde_json::from_str("5").unwrap();
        let text: ArticleId = serde_json::from_str("\"kb-12\"").unwrap();
        assert_eq!(numeric.to_document_id(), "5");
        assert_eq!(text.to_document_id(), "kb-12");
        assert!(numeric.is_present());
    }

    #[test]
    fn test_falsy_article_ids() {
        let zero: ArticleId = serde_json::from_str("0").unwrap();
        let empty: ArticleId = serde_json::from_str("\"\"").unwrap();
        assert!(!zero.is_present());
        assert!(!empty.is_present());
    }

    #[test]
    fn test_retrieved_document_flattens() {
        let doc = RetrievedDocument {
            document: Document {
                id: "7".into(),
                content: "Refunds. Take five days.".into(),
                metadata: DocumentMetadata {
                    article_id: ArticleId::Number(7.into()),
                    category: "Billing".into(),
                    folder: "Refunds".into(),
                    title: "Refund Policy".into(),
                    tags: vec!["refund".into()],
                },
            },
            score: 0.91,
        };
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["id"], "7");
        assert_eq!(value["metadata"]["title"], "Refund Policy");
        assert_eq!(value["metadata"]["article_id"], 7);
        assert_eq!(doc.title(), "Refund Policy");
    }

    #[test]
    fn test_fallback_answers_have_no_references() {
        assert!(AnswerResult::no_answer().references.is_empty());
        assert!(AnswerResult::no_answer().is_no_answer());
        assert!(AnswerResult::internal_error().references.is_empty());

        let with_detail = AnswerResult::invalid_reply(Some("EOF while parsing"));
        assert!(with_detail.answer.starts_with(INVALID_REPLY_TEXT));
        assert!(with_detail.answer.ends_with("Details: EOF while parsing"));
        assert_eq!(AnswerResult::invalid_reply(None).answer, INVALID_REPLY_TEXT);
    }
}
