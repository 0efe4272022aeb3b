//! SupportRAG Common Library
//!
//! Shared code for the SupportRAG gateway and indexer including:
//! - Source and document models
//! - Embedding and generation client abstractions
//! - Vector store backends
//! - Query and indexing pipelines
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use models::{AnswerResult, Document, RetrievedDocument};
pub use pipeline::{IndexingPipeline, Normalizer, QueryPipeline};
pub use services::ServiceHandles;
pub use store::VectorStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// Default generation model
pub const DEFAULT_GENERATION_MODEL: &str = "gpt-4o-mini";

/// Default number of documents retrieved per question
pub const DEFAULT_TOP_K: usize = 3;
