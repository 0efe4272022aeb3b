//! Query and indexing pipelines
//!
//! Stages are plain typed methods wired in a fixed order. Service handles
//! are injected at construction and shared behind `Arc`.

mod extraction;
mod generation;
mod indexing;
mod normalize;
mod prompt;
mod query;

pub use extraction::{AnswerExtractor, Extraction, ExtractionFailure};
pub use generation::{create_generator, Generator, MockGenerator, OpenAIGenerator};
pub use indexing::{IndexReport, IndexingPipeline};
pub use normalize::{HtmlTextCleaner, Normalizer, TextCleaner};
pub use prompt::PromptBuilder;
pub use query::{PipelineRun, QueryPipeline};
