//! Process-wide service handles, built once at startup

use crate::config::AppConfig;
use crate::embeddings::{create_embedder, Embedder};
use crate::errors::Result;
use crate::pipeline::{create_generator, AnswerExtractor, Generator, IndexingPipeline, QueryPipeline};
use crate::store::{create_vector_store, VectorStore};
use std::sync::Arc;
use tracing::info;

/// Shared handles to the embedding, generation and storage services
#[derive(Clone)]
pub struct ServiceHandles {
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
    pub store: Arc<dyn VectorStore>,
}

impl ServiceHandles {
    /// Build every client named in configuration and connect the store
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        config.validate_settings()?;

        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        let store = create_vector_store(config).await?;

        info!(
            embedding_model = embedder.model_name(),
            generation_model = generator.model_name(),
            store = store.backend(),
            "Service handles ready"
        );

        Ok(Self { embedder, generator, store })
    }

    pub fn query_pipeline(&self, config: &AppConfig) -> QueryPipeline {
        QueryPipeline::new(
            self.embedder.clone(),
            self.store.clone(),
            self.generator.clone(),
            config.retrieval.top_k,
            AnswerExtractor::new(config.extraction.include_failure_detail),
        )
    }

    pub fn indexing_pipeline(&self) -> IndexingPipeline {
        IndexingPipeline::new(self.embedder.clone(), self.store.clone())
    }
}
