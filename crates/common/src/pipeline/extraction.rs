//! Validated answer extraction
//!
//! Model replies go through three checks in order: locate a `{...}` span,
//! parse it as JSON, and validate it against [`AnswerResult`]. Each check
//! either advances or yields an [`ExtractionFailure`]; no error escapes
//! this module. Callers turn a failure into the fallback answer.

use crate::metrics;
use crate::models::AnswerResult;
use regex_lite::Regex;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::warn;

/// Why a reply could not be turned into an answer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionFailure {
    #[error("the model returned no candidate replies")]
    NoCandidates,

    #[error("no JSON object found in the response")]
    NoJsonSpan,

    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("schema violation: {0}")]
    SchemaViolation(String),
}

impl ExtractionFailure {
    /// Stable label for logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            ExtractionFailure::NoCandidates => "no_candidates",
            ExtractionFailure::NoJsonSpan => "no_json_span",
            ExtractionFailure::MalformedJson(_) => "malformed_json",
            ExtractionFailure::SchemaViolation(_) => "schema_violation",
        }
    }
}

/// Outcome of extracting an answer from model replies
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Success(AnswerResult),
    Failure(ExtractionFailure),
}

fn json_span() -> &'static Regex {
    static SPAN: OnceLock<Regex> = OnceLock::new();
    SPAN.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("static span pattern is valid"))
}

/// Turns raw replies into an [`AnswerResult`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AnswerExtractor {
    include_failure_detail: bool,
}

impl AnswerExtractor {
    pub fn new(include_failure_detail: bool) -> Self {
        Self { include_failure_detail }
    }

    /// Classify the first reply
    pub fn extract(&self, replies: &[String]) -> Extraction {
        let Some(reply) = replies.first() else {
            return Extraction::Failure(ExtractionFailure::NoCandidates);
        };

        match parse_reply(reply) {
            Ok(mut answer) => {
                if answer.is_no_answer() {
                    answer.references.clear();
                }
                Extraction::Success(answer)
            }
            Err(failure) => Extraction::Failure(failure),
        }
    }

    /// Collapse an extraction into the answer returned to callers
    pub fn into_answer(&self, extraction: Extraction) -> AnswerResult {
        match extraction {
            Extraction::Success(answer) => answer,
            Extraction::Failure(failure) => {
                warn!(reason = failure.reason(), error = %failure, "Model reply rejected, using fallback answer");
                metrics::record_extraction_fallback(failure.reason());
                let detail = failure.to_string();
                AnswerResult::invalid_reply(self.include_failure_detail.then_some(detail.as_str()))
            }
        }
    }
}

fn parse_reply(reply: &str) -> Result<AnswerResult, ExtractionFailure> {
    let span = json_span()
        .find(reply)
        .ok_or(ExtractionFailure::NoJsonSpan)?;

    let value: serde_json::Value = serde_json::from_str(span.as_str())
        .map_err(|e| ExtractionFailure::MalformedJson(e.to_string()))?;

    serde_json::from_value(value).map_err(|e| ExtractionFailure::SchemaViolation(e.to_string()))
}
