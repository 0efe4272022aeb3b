//! Wire format of the support-article export consumed by the indexing pipeline
//!
//! Every field is optional: exports in the wild omit names, tags and even ids,
//! and normalization decides what survives.

use super::ArticleId;
use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceCategory {
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub folders: Vec<SourceFolder>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceFolder {
    #[serde(default)]
    pub folder_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub articles: Vec<SourceArticle>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceArticle {
    #[serde(default)]
    pub id: Option<ArticleId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description_text: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse a raw export into source categories.
///
/// The payload must be a JSON array of categories; anything else is an
/// `InvalidFormat` error.
pub fn parse_source(bytes: &[u8]) -> Result<Vec<SourceCategory>> {
    serde_json::from_slice(bytes).map_err(|e| AppError::InvalidFormat {
        message: format!("source payload is not an array of categories: {}", e),
    })
}
