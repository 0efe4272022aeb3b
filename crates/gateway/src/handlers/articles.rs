//! Article upload handler

use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;

use crate::AppState;
use supportrag_common::{
    errors::{AppError, Result},
    models::parse_source,
};

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub message: String,
    pub documents_processed: usize,
}

/// Normalize an uploaded export and index every valid article
pub async fn upload_articles(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IndexResponse>> {
    let categories = parse_source(&body)?;
    let documents = state.normalizer.normalize(&categories);

    if documents.is_empty() {
        return Err(AppError::Validation {
            message: "No valid documents found in the uploaded payload.".to_string(),
            field: None,
        });
    }

    let report = state.indexing.index(documents).await?;

    Ok(Json(IndexResponse {
        message: format!("Successfully indexed {} documents.", report.documents_processed),
        documents_processed: report.documents_processed,
    }))
}
