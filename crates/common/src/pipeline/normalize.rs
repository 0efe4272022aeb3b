//! Document normalization
//!
//! Flattens the category → folder → article export into retrievable
//! documents. Articles without an identifier or without usable text are
//! dropped; everything else degrades to empty strings rather than failing.

use crate::models::{Document, DocumentMetadata, SourceArticle, SourceCategory};
use std::sync::Arc;
use tracing::{debug, warn};

/// Turns markup-bearing source text into plain text
pub trait TextCleaner: Send + Sync {
    fn clean(&self, raw: &str) -> String;
}

/// Renders HTML to plain text and collapses whitespace runs
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlTextCleaner;

/// Wide enough that wrapping never splits a word
const RENDER_WIDTH: usize = 10_000;

impl TextCleaner for HtmlTextCleaner {
    fn clean(&self, raw: &str) -> String {
        let text = match html2text::from_read_rich(raw.as_bytes(), RENDER_WIDTH) {
            Ok(lines) => lines
                .iter()
                .map(|line| {
                    line.tagged_strings()
                        .map(|piece| piece.s.as_str())
                        .collect::<String>()
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => {
                warn!(error = %e, "HTML rendering failed, keeping raw text");
                raw.to_string()
            }
        };

        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Produces documents from source records
#[derive(Clone)]
pub struct Normalizer {
    cleaner: Arc<dyn TextCleaner>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Arc::new(HtmlTextCleaner))
    }
}

impl Normalizer {
    pub fn new(cleaner: Arc<dyn TextCleaner>) -> Self {
        Self { cleaner }
    }

    /// Flatten every category, folder and article into documents, in source order
    pub fn normalize(&self, categories: &[SourceCategory]) -> Vec<Document> {
        let mut documents = Vec::new();
        let mut skipped = 0usize;

        for category in categories {
            let category_name = category.category_name.clone().unwrap_or_default();
            for folder in &category.folders {
                let folder_name = folder.folder_name.clone().unwrap_or_default();
                for article in &folder.articles {
                    match self.to_document(article, &category_name, &folder_name) {
                        Some(doc) => documents.push(doc),
                        None => skipped += 1,
                    }
                }
            }
        }

        debug!(kept = documents.len(), skipped, "Normalized source articles");
        documents
    }

    fn to_document(&self, article: &SourceArticle, category: &str, folder: &str) -> Option<Document> {
        let article_id = article.id.as_ref().filter(|id| id.is_present())?;

        let title = article.title.as_deref().unwrap_or_default();
        let description = article.description_text.as_deref().unwrap_or_default();

        let content = self
            .cleaner
            .clean(&format!("{}. {}", title, description))
            .trim()
            .to_string();

        if is_placeholder(&content) {
            return None;
        }

        Some(Document {
            id: article_id.to_document_id(),
            content,
            metadata: DocumentMetadata {
                article_id: article_id.clone(),
                category: category.to_string(),
                folder: folder.to_string(),
                title: title.to_string(),
                tags: article.tags.clone(),
            },
        })
    }
}

/// Empty, or nothing but the "." separator and whitespace
fn is_placeholder(content: &str) -> bool {
    content.chars().all(|c| c == '.' || c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_source;

    fn normalize_json(raw: &str) -> Vec<Document> {
        let categories = parse_source(raw.as_bytes()).unwrap();
        Normalizer::default().normalize(&categories)
    }

    fn single_article(article: &str) -> Vec<Document> {
        normalize_json(&format!(
            r#"[{{"category_name": "General", "folders": [{{"folder_name": "FAQ", "articles": [{}]}}]}}]"#,
            article
        ))
    }

    #[test]
    fn test_title_only_article() {
        let docs = normalize_json(r#"[{"folders": [{"articles": [{"id": 5, "title": "X"}]}]}]"#);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "5");
        assert_eq!(docs[0].content, "X.");
        assert!(docs[0].metadata.tags.is_empty());
        assert_eq!(docs[0].metadata.category, "");
        assert_eq!(docs[0].metadata.folder, "");
    }

    #[test]
    fn test_normalizing_twice_gives_same_ids() {
        let raw = r#"[{"category_name": "Billing", "folders": [{"folder_name": "Refunds", "articles": [
            {"id": 1, "title": "A", "description_text": "a"},
            {"id": "kb-2", "title": "B", "description_text": "b"}
        ]}]}]"#;
        let first: Vec<String> = normalize_json(raw).into_iter().map(|d| d.id).collect();
        let second: Vec<String> = normalize_json(raw).into_iter().map(|d| d.id).collect();
        assert_eq!(first, vec!["1", "kb-2"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_articles_without_usable_id_are_skipped() {
        let docs = normalize_json(r#"[{"folders": [{"articles": [
            {"title": "Missing"},
            {"id": null, "title": "Null"},
            {"id": 0, "title": "Zero"},
            {"id": "", "title": "Empty"},
            {"id": 3, "title": "Kept"}
        ]}]}]"#);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata.title, "Kept");
    }

    #[test]
    fn test_html_is_stripped() {
        let docs = single_article(
            r#"{"id": 4, "title": "HTML Article", "description_text": "<p>This is <b>bold</b> text.</p>"}"#,
        );
        assert_eq!(docs[0].content, "HTML Article. This is bold text.");
    }

    #[test]
    fn test_entities_are_decoded() {
        let cleaned = HtmlTextCleaner.clean("Terms &amp; conditions&nbsp;apply &lt;here&gt; &amp;lt;");
        assert_eq!(cleaned, "Terms & conditions apply <here> &lt;");

        let cleaned = HtmlTextCleaner.clean("<p>Don&#8217;t wait &mdash; it&rsquo;s free</p>");
        assert_eq!(cleaned, "Don\u{2019}t wait \u{2014} it\u{2019}s free");
    }

    #[test]
    fn test_literal_angle_brackets_survive() {
        let cleaned = HtmlTextCleaner.clean("Plans < 10 seats. Use x > 2 for teams");
        assert_eq!(cleaned, "Plans < 10 seats. Use x > 2 for teams");

        let docs = single_article(
            r#"{"id": 11, "title": "Seats < 10", "description_text": "Teams with > 10 seats get a discount."}"#,
        );
        assert_eq!(docs[0].content, "Seats < 10. Teams with > 10 seats get a discount.");
    }

    #[test]
    fn test_block_markup_collapses_to_single_spaces() {
        let cleaned = HtmlTextCleaner.clean("<h2>Steps</h2>\n<ul><li>Open settings</li><li>Click <a href=\"/x\">Save</a></li></ul>");
        assert!(cleaned.contains("Steps"));
        assert!(cleaned.contains("Open settings"));
        assert!(cleaned.contains("Click Save"));
        assert!(!cleaned.contains('<'));
        assert!(!cleaned.contains("  "));
    }

    #[test]
    fn test_titleless_article_is_kept() {
        let docs = single_article(r#"{"id": 8, "description_text": "Content without a title."}"#);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, ". Content without a title.");
        assert_eq!(docs[0].metadata.title, "");
    }

    #[test]
    fn test_id_only_article_is_skipped() {
        assert!(single_article(r#"{"id": 9}"#).is_empty());
        assert!(single_article(r#"{"id": 10, "title": "", "description_text": "<p> </p>"}"#).is_empty());
    }

    #[test]
    fn test_punctuation_boundary() {
        assert!(is_placeholder(""));
        assert!(is_placeholder("."));
        assert!(is_placeholder(" . \n"));
        assert!(!is_placeholder(". a"));
        assert!(!is_placeholder("?."));
    }

    #[test]
    fn test_metadata_carries_source_structure() {
        let docs = normalize_json(r#"[
            {"category_name": "Billing", "folders": [
                {"folder_name": "Refunds", "articles": [{"id": 1, "title": "Refund Policy", "description_text": "Five days.", "tags": ["refund", "money"]}]},
                {"folder_name": "Invoices", "articles": [{"id": 2, "title": "Invoices", "description_text": "Monthly."}, {"title": "orphan"}]}
            ]},
            {"category_name": "Accounts", "folders": [
                {"articles": [{"id": "acc-1", "title": "Login", "description_text": "Use SSO.", "tags": null}]}
            ]}
        ]"#);

        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].metadata.category, "Billing");
        assert_eq!(docs[0].metadata.folder, "Refunds");
        assert_eq!(docs[0].metadata.tags, vec!["refund", "money"]);
        assert_eq!(docs[1].metadata.folder, "Invoices");
        assert_eq!(docs[2].id, "acc-1");
        assert_eq!(docs[2].metadata.category, "Accounts");
        assert_eq!(docs[2].metadata.folder, "");
        assert!(docs[2].metadata.tags.is_empty());
    }
}
