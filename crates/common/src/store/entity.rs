//! Indexed document entity
//!
//! The `embedding vector(N)` column is not mapped; vector reads and writes
//! go through raw SQL in the postgres store.

use crate::errors::AppError;
use crate::models::{Document, DocumentMetadata};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const TABLE_NAME: &str = "support_documents";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "support_documents")]
pub struct Model {
    /// Deterministic document id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: serde_json::Value,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Document {
    type Error = AppError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let metadata: DocumentMetadata = serde_json::from_value(model.metadata)?;
        Ok(Document {
            id: model.id,
            content: model.content,
            metadata,
        })
    }
}
