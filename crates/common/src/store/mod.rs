//! Vector store layer
//!
//! Provides:
//! - The `VectorStore` contract used by retrieval and upsert
//! - A PostgreSQL + pgvector implementation
//! - An in-process implementation for tests and local runs
//!
//! Every implementation keys documents by their deterministic id and
//! overwrites on write. A second write with the same id replaces content,
//! metadata and vector; it never adds an entry.

mod entity;
mod memory;
mod postgres;

pub use memory::InMemoryVectorStore;
pub use postgres::{DbPool, PgVectorStore};

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::models::{Document, EmbeddedDocument, RetrievedDocument};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Nearest-neighbour document store keyed by document id
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Up to `top_k` documents ordered by descending score. No match is an empty list.
    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<RetrievedDocument>>;

    /// Insert or overwrite every record by id. Fails as a whole batch.
    async fn upsert(&self, records: Vec<EmbeddedDocument>) -> Result<usize>;

    /// Fetch one document by id
    async fn get(&self, id: &str) -> Result<Option<Document>>;

    /// Number of stored documents
    async fn count(&self) -> Result<u64>;

    /// Backend name for logs and readiness output
    fn backend(&self) -> &'static str;
}

/// Connect the vector store named in configuration, creating its schema if missing
pub async fn create_vector_store(config: &AppConfig) -> Result<Arc<dyn VectorStore>> {
    match config.vector_store.backend.as_str() {
        "postgres" => {
            info!("Connecting to database...");
            let pool = DbPool::new(&config.database).await?;
            let store = PgVectorStore::new(pool, config.embedding.dimension);
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
        "memory" => {
            info!("Using in-memory vector store");
            Ok(Arc::new(InMemoryVectorStore::new()))
        }
        other => Err(AppError::Configuration {
            message: format!("Unknown vector store backend: {}", other),
        }),
    }
}

/// Format a vector as a pgvector literal: "[1,2.5,3]"
pub(crate) fn to_pgvector(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding.iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_format() {
        assert_eq!(to_pgvector(&[0.1, 0.2, 0.3]), "[0.1,0.2,0.3]");
        assert_eq!(to_pgvector(&[]), "[]");
    }

    #[tokio::test]
    async fn test_unknown_backend_rejected() {
        let mut config = AppConfig::default();
        config.vector_store.backend = "pinecone".into();
        let err = create_vector_store(&config).await.err().unwrap();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_memory_backend_starts_empty() {
        let mut config = AppConfig::default();
        config.vector_store.backend = "memory".into();
        let store = create_vector_store(&config).await.unwrap();
        assert_eq!(store.backend(), "memory");
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
