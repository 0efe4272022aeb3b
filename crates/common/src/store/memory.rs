//! In-process vector store with exact cosine search

use super::VectorStore;
use crate::errors::{AppError, Result};
use crate::models::{Document, EmbeddedDocument, RetrievedDocument};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Hash map of documents keyed by id. Contents are lost on drop.
#[derive(Default)]
pub struct InMemoryVectorStore {
    records: RwLock<HashMap<String, EmbeddedDocument>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<RetrievedDocument>> {
        let records = self.records.read().await;

        if let Some(stored) = records.values().next() {
            if stored.embedding.len() != embedding.len() {
                return Err(AppError::RetrievalError {
                    message: format!(
                        "Query vector has dimension {}, store holds {}",
                        embedding.len(),
                        stored.embedding.len()
                    ),
                });
            }
        }

        let mut scored: Vec<RetrievedDocument> = records
            .values()
            .map(|r| RetrievedDocument {
                document: r.document.clone(),
                score: cosine_similarity(embedding, &r.embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });
        scored.truncate(top_k);

        Ok(scored)
    }

    async fn upsert(&self, records: Vec<EmbeddedDocument>) -> Result<usize> {
        let mut store = self.records.write().await;

        // Every stored vector shares the dimension of the first one written
        let expected = store
            .values()
            .next()
            .or(records.first())
            .map(|r| r.embedding.len());
        if let Some(expected) = expected {
            if let Some(bad) = records.iter().find(|r| r.embedding.len() != expected) {
                return Err(AppError::UpsertError {
                    message: format!(
                        "Document {} has dimension {}, store holds {}",
                        bad.document.id,
                        bad.embedding.len(),
                        expected
                    ),
                });
            }
        }

        let mut written = std::collections::HashSet::new();
        for record in records {
            written.insert(record.document.id.clone());
            store.insert(record.document.id.clone(), record);
        }

        Ok(written.len())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        let records = self.records.read().await;
        Ok(records.get(id).map(|r| r.document.clone()))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records.read().await.len() as u64)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
