//! Indexing pipeline: embed document content and upsert by id

use crate::embeddings::Embedder;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::{keep_last_by_id, Document, EmbeddedDocument};
use crate::store::VectorStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// Summary of one indexing batch
#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub documents_processed: usize,
    pub embedding_model: String,
    pub duration_ms: u64,
}

pub struct IndexingPipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl IndexingPipeline {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Embed and write a batch. Documents sharing an id collapse to the last one.
    #[instrument(skip(self, documents), fields(batch = documents.len()))]
    pub async fn index(&self, documents: Vec<Document>) -> Result<IndexReport> {
        let start = Instant::now();
        let documents = keep_last_by_id(documents, |d| d.id.as_str());

        if documents.is_empty() {
            return Ok(IndexReport {
                documents_processed: 0,
                embedding_model: self.embedder.model_name().to_string(),
                duration_ms: 0,
            });
        }

        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        if embeddings.len() != documents.len() {
            return Err(AppError::EmbeddingError {
                message: format!(
                    "Expected {} vectors, embedder returned {}",
                    documents.len(),
                    embeddings.len()
                ),
            });
        }

        let records: Vec<EmbeddedDocument> = documents
            .into_iter()
            .zip(embeddings)
            .map(|(document, embedding)| EmbeddedDocument { document, embedding })
            .collect();

        let written = self.store.upsert(records).await.map_err(|e| match e {
            AppError::UpsertError { .. } => e,
            other => AppError::UpsertError {
                message: other.to_string(),
            },
        })?;

        let elapsed = start.elapsed();
        metrics::record_indexing(elapsed.as_secs_f64(), written);
        info!(
            written,
            backend = self.store.backend(),
            duration_ms = elapsed.as_millis() as u64,
            "Indexed documents"
        );

        Ok(IndexReport {
            documents_processed: written,
            embedding_model: self.embedder.model_name().to_string(),
            duration_ms: elapsed.as_millis() as u64,
        })
    }
}
