//! Question answering pipeline
//!
//! Five stages, run strictly in sequence:
//! embed → retrieve → render prompt → generate → extract.
//! The first three failures propagate to the caller; extraction never fails.

use super::extraction::{AnswerExtractor, Extraction};
use super::generation::Generator;
use super::prompt::PromptBuilder;
use crate::embeddings::Embedder;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::{AnswerResult, RetrievedDocument};
use crate::store::VectorStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, Instrument};
use uuid::Uuid;

/// Everything produced while answering one question
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub question: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub documents: Vec<RetrievedDocument>,
    pub prompt: String,
    pub replies: Vec<String>,
    pub answer: AnswerResult,
    /// Reason label when the fallback answer was used
    pub extraction_failure: Option<&'static str>,
}

/// Retrieval-augmented question answering over injected service handles
pub struct QueryPipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn Generator>,
    prompt_builder: PromptBuilder,
    extractor: AnswerExtractor,
    top_k: usize,
}

impl QueryPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
        top_k: usize,
        extractor: AnswerExtractor,
    ) -> Self {
        Self {
            embedder,
            store,
            generator,
            prompt_builder: PromptBuilder::new(),
            extractor,
            top_k: top_k.max(1),
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Answer a question, discarding intermediate results
    pub async fn answer(&self, question: &str) -> Result<AnswerResult> {
        Ok(self.run(question).await?.answer)
    }

    /// Answer a question and keep every intermediate result
    pub async fn run(&self, question: &str) -> Result<PipelineRun> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("query_pipeline", %run_id);
        let started_at = Utc::now();
        let start = Instant::now();

        let result = self.run_stages(run_id, started_at, question).instrument(span).await;

        let elapsed = start.elapsed().as_secs_f64();
        match &result {
            Ok(run) => {
                let outcome = if run.extraction_failure.is_some() {
                    "fallback"
                } else if run.answer.is_no_answer() {
                    "no_answer"
                } else {
                    "answered"
                };
                metrics::record_query(elapsed, run.documents.len(), outcome);
                info!(%run_id, outcome, retrieved = run.documents.len(), elapsed_secs = elapsed, "Query answered");
            }
            Err(e) => {
                metrics::record_query(elapsed, 0, "error");
                info!(%run_id, error = %e, elapsed_secs = elapsed, "Query failed");
            }
        }

        result
    }

    async fn run_stages(
        &self,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        question: &str,
    ) -> Result<PipelineRun> {
        let embedding = timed("embedding", self.embed_query(question)).await?;
        let documents = timed("retrieval", self.retrieve(&embedding)).await?;

        let stage_start = Instant::now();
        let prompt = self.build_prompt(question, &documents);
        metrics::record_stage("prompt", stage_start.elapsed().as_secs_f64());

        let replies = timed("generation", self.generate(&prompt)).await?;

        let stage_start = Instant::now();
        let extraction = self.extract(&replies);
        let extraction_failure = match &extraction {
            Extraction::Failure(failure) => Some(failure.reason()),
            Extraction::Success(_) => None,
        };
        let answer = self.extractor.into_answer(extraction);
        metrics::record_stage("extraction", stage_start.elapsed().as_secs_f64());

        Ok(PipelineRun {
            run_id,
            started_at,
            question: question.to_string(),
            embedding,
            documents,
            prompt,
            replies,
            answer,
            extraction_failure,
        })
    }

    /// Stage 1: embed the question
    #[instrument(skip(self, question), fields(len = question.len()))]
    pub async fn embed_query(&self, question: &str) -> Result<Vec<f32>> {
        if question.trim().is_empty() {
            return Err(AppError::EmbeddingError {
                message: "Refusing to embed an empty query".to_string(),
            });
        }
        self.embedder.embed(question).await
    }

    /// Stage 2: nearest documents for the query vector
    #[instrument(skip(self, embedding), fields(top_k = self.top_k))]
    pub async fn retrieve(&self, embedding: &[f32]) -> Result<Vec<RetrievedDocument>> {
        self.store.query(embedding, self.top_k).await.map_err(|e| match e {
            AppError::RetrievalError { .. } => e,
            other => AppError::RetrievalError {
                message: other.to_string(),
            },
        })
    }

    /// Stage 3: render the prompt
    pub fn build_prompt(&self, question: &str, documents: &[RetrievedDocument]) -> String {
        self.prompt_builder.render(question, documents)
    }

    /// Stage 4: ask the model
    #[instrument(skip(self, prompt), fields(model = self.generator.model_name()))]
    pub async fn generate(&self, prompt: &str) -> Result<Vec<String>> {
        self.generator.generate(prompt).await
    }

    /// Stage 5: validated extraction of the first reply
    pub fn extract(&self, replies: &[String]) -> Extraction {
        self.extractor.extract(replies)
    }
}

async fn timed<T>(stage: &'static str, fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    let start = Instant::now();
    let result = fut.await;
    metrics::record_stage(stage, start.elapsed().as_secs_f64());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbedder;
    use crate::models::{ArticleId, Document, DocumentMetadata, EmbeddedDocument, INVALID_REPLY_TEXT};
    use crate::pipeline::generation::MockGenerator;
    use crate::store::InMemoryVectorStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(AppError::EmbeddingError { message: "service unavailable".into() })
        }
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(AppError::EmbeddingError { message: "service unavailable".into() })
        }
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dimension(&self) -> usize {
            4
        }
    }

    #[derive(Default)]
    struct CountingGenerator {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Generator for CountingGenerator {
        async fn generate(&self, prompt: &str) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::GenerationError { message: "quota exceeded".into() });
            }
            assert!(prompt.contains("<question>"));
            Ok(vec![r#"{"answer": "Refunds take 5 days.", "references": ["Refund Policy"]}"#.into()])
        }
        fn model_name(&self) -> &str {
            "counting"
        }
    }

    fn pipeline_with(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
    ) -> QueryPipeline {
        QueryPipeline::new(embedder, store, generator, 3, AnswerExtractor::default())
    }

    async fn seeded_store(dimension: usize) -> Arc<InMemoryVectorStore> {
        let store = Arc::new(InMemoryVectorStore::new());
        let embedder = MockEmbedder::new(dimension);
        let mut records = Vec::new();
        for (id, title) in [("1", "Refund Policy"), ("2", "Invoices"), ("3", "Login"), ("4", "Shipping")] {
            records.push(EmbeddedDocument {
                document: Document {
                    id: id.into(),
                    content: format!("{}. Details.", title),
                    metadata: DocumentMetadata {
                        article_id: ArticleId::Text(id.into()),
                        category: "Support".into(),
                        folder: "FAQ".into(),
                        title: title.into(),
                        tags: vec![],
                    },
                },
                embedding: embedder.embed(title).await.unwrap(),
            });
        }
        store.upsert(records).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_empty_store_still_answers() {
        let pipeline = pipeline_with(
            Arc::new(MockEmbedder::new(8)),
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(MockGenerator::default()),
        );

        let run = pipeline.run("How do refunds work?").await.unwrap();
        assert!(run.documents.is_empty());
        assert!(run.prompt.contains("<context>\n</context>"));
        assert!(run.answer.is_no_answer());
        assert!(run.answer.references.is_empty());
        assert!(run.extraction_failure.is_none());
    }

    #[tokio::test]
    async fn test_full_run_respects_top_k() {
        let generator = Arc::new(CountingGenerator::default());
        let pipeline = pipeline_with(
            Arc::new(MockEmbedder::new(8)),
            seeded_store(8).await,
            generator.clone(),
        );

        let run = pipeline.run("How long do refunds take?").await.unwrap();
        assert_eq!(run.documents.len(), 3);
        assert_eq!(run.embedding.len(), 8);
        assert_eq!(run.answer.answer, "Refunds take 5 days.");
        assert_eq!(run.answer.references, vec!["Refund Policy"]);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_question_is_rejected_before_generation() {
        let generator = Arc::new(CountingGenerator::default());
        let pipeline = pipeline_with(
            Arc::new(MockEmbedder::new(8)),
            Arc::new(InMemoryVectorStore::new()),
            generator.clone(),
        );

        let err = pipeline.answer("   \n").await.unwrap_err();
        assert!(matches!(err, AppError::EmbeddingError { .. }));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_propagates() {
        let generator = Arc::new(CountingGenerator::default());
        let pipeline = pipeline_with(
            Arc::new(FailingEmbedder),
            Arc::new(InMemoryVectorStore::new()),
            generator.clone(),
        );

        let err = pipeline.answer("refunds").await.unwrap_err();
        assert!(matches!(err, AppError::EmbeddingError { .. }));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let generator = Arc::new(CountingGenerator { fail: true, ..Default::default() });
        let pipeline = pipeline_with(
            Arc::new(MockEmbedder::new(8)),
            seeded_store(8).await,
            generator,
        );

        let err = pipeline.answer("refunds").await.unwrap_err();
        assert!(matches!(err, AppError::GenerationError { .. }));
    }

    #[tokio::test]
    async fn test_invalid_reply_is_recovered() {
        let pipeline = pipeline_with(
            Arc::new(MockEmbedder::new(8)),
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(MockGenerator::with_replies(vec![
                r#"{"answer": "Refunds take 5 days.", "refer"#.into(),
            ])),
        );

        let run = pipeline.run("refunds").await.unwrap();
        assert_eq!(run.answer.answer, INVALID_REPLY_TEXT);
        assert!(run.answer.references.is_empty());
        assert_eq!(run.extraction_failure, Some("no_json_span"));
    }

    #[tokio::test]
    async fn test_retrieval_dimension_mismatch_is_retrieval_error() {
        let pipeline = pipeline_with(
            Arc::new(MockEmbedder::new(4)),
            seeded_store(8).await,
            Arc::new(MockGenerator::default()),
        );

        let err = pipeline.answer("refunds").await.unwrap_err();
        assert!(matches!(err, AppError::RetrievalError { .. }));
    }
}
