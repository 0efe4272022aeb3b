//! Question answering handler

use axum::{extract::State, http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Deserialize;
use validator::Validate;

use crate::AppState;
use supportrag_common::{errors::AppError, models::AnswerResult};

/// Query request
#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1, max = 2000))]
    pub query: String,
}

/// Answer a support question.
///
/// Pipeline failures never reach the client as detail: they become the
/// generic internal-error answer with a 500, or 504 when the run overruns
/// the configured request timeout.
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Response, AppError> {
    if request.query.trim().is_empty() {
        return Err(AppError::Validation {
            message: "Query cannot be empty.".to_string(),
            field: Some("query".to_string()),
        });
    }
    request.validate()?;

    let timeout = state.config.request_timeout();
    let outcome = tokio::time::timeout(timeout, state.query.answer(&request.query)).await;

    let response = match outcome {
        Ok(Ok(answer)) => (StatusCode::OK, Json(answer)).into_response(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, code = ?e.code(), "Query pipeline failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(AnswerResult::internal_error())).into_response()
        }
        Err(_) => {
            tracing::error!(timeout_secs = timeout.as_secs(), "Query pipeline timed out");
            (StatusCode::GATEWAY_TIMEOUT, Json(AnswerResult::internal_error())).into_response()
        }
    };

    Ok(response)
}
