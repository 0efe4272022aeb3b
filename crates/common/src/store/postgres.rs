//! PostgreSQL + pgvector document store

use super::entity::{self, Entity as DocumentEntity, TABLE_NAME};
use super::{to_pgvector, VectorStore};
use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use crate::models::{
    keep_last_by_id, Document, DocumentMetadata, EmbeddedDocument, RetrievedDocument,
};
use async_trait::async_trait;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, EntityTrait,
    PaginatorTrait, Statement, TransactionTrait,
};
use std::time::Duration;
use tracing::{debug, info};

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    /// Primary connection (for writes)
    pub primary: DatabaseConnection,

    /// Read replica connection (optional)
    pub replica: Option<DatabaseConnection>,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to primary database...");

        let primary = Database::connect(connect_options(&config.url, config))
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect to primary: {}", e),
            })?;

        let replica = match config.read_url {
            Some(ref read_url) => {
                info!("Connecting to read replica...");
                let conn = Database::connect(connect_options(read_url, config))
                    .await
                    .map_err(|e| AppError::DatabaseConnection {
                        message: format!("Failed to connect to replica: {}", e),
                    })?;
                Some(conn)
            }
            None => None,
        };

        info!("Database connections established");

        Ok(Self { primary, replica })
    }

    /// Get the connection for reads (replica if available, otherwise primary)
    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    /// Get the connection for writes (always primary)
    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }
}

fn connect_options(url: &str, config: &DatabaseConfig) -> ConnectOptions {
    let mut opts = ConnectOptions::new(url);
    opts.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .sqlx_logging(false);
    opts
}

/// Vector store over a single `support_documents` table
pub struct PgVectorStore {
    pool: DbPool,
    dimension: usize,
}

impl PgVectorStore {
    pub fn new(pool: DbPool, dimension: usize) -> Self {
        Self { pool, dimension }
    }

    /// Create the extension, table and ANN index if they do not exist
    pub async fn ensure_schema(&self) -> Result<()> {
        let conn = self.pool.write();

        conn.execute_unprepared("CREATE EXTENSION IF NOT EXISTS vector")
            .await?;

        conn.execute_unprepared(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                metadata JSONB NOT NULL,
                embedding vector({dim}) NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            table = TABLE_NAME,
            dim = self.dimension,
        ))
        .await?;

        conn.execute_unprepared(&format!(
            "CREATE INDEX IF NOT EXISTS {table}_embedding_idx ON {table} \
             USING hnsw (embedding vector_cosine_ops)",
            table = TABLE_NAME,
        ))
        .await?;

        info!(table = TABLE_NAME, dimension = self.dimension, "Vector store schema ready");
        Ok(())
    }

    fn check_dimension(&self, embedding: &[f32]) -> bool {
        embedding.len() == self.dimension
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<RetrievedDocument>> {
        if !self.check_dimension(embedding) {
            return Err(AppError::RetrievalError {
                message: format!(
                    "Query vector has dimension {}, store expects {}",
                    embedding.len(),
                    self.dimension
                ),
            });
        }

        let sql = format!(
            r#"
            SELECT
                id,
                content,
                metadata,
                1 - (embedding <=> $1::vector) AS score
            FROM {}
            ORDER BY embedding <=> $1::vector, id
            LIMIT $2
            "#,
            TABLE_NAME
        );

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            &sql,
            vec![to_pgvector(embedding).into(), (top_k as i64).into()],
        );

        let rows = self
            .pool
            .read()
            .query_all(stmt)
            .await
            .map_err(|e| AppError::RetrievalError {
                message: format!("Similarity query failed: {}", e),
            })?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get_by_index(0)?;
            let content: String = row.try_get_by_index(1)?;
            let metadata: serde_json::Value = row.try_get_by_index(2)?;
            let score: f64 = row.try_get_by_index(3)?;

            let metadata: DocumentMetadata = serde_json::from_value(metadata).map_err(|e| {
                AppError::RetrievalError {
                    message: format!("Stored metadata for {} is unreadable: {}", id, e),
                }
            })?;

            results.push(RetrievedDocument {
                document: Document { id, content, metadata },
                score: score as f32,
            });
        }

        debug!(count = results.len(), top_k, "Similarity query completed");
        Ok(results)
    }

    async fn upsert(&self, records: Vec<EmbeddedDocument>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        if let Some(bad) = records.iter().find(|r| !self.check_dimension(&r.embedding)) {
            return Err(AppError::UpsertError {
                message: format!(
                    "Document {} has dimension {}, store expects {}",
                    bad.document.id,
                    bad.embedding.len(),
                    self.dimension
                ),
            });
        }

        // Last write wins for ids repeated within one batch
        let latest = keep_last_by_id(records, |r| r.document.id.as_str());

        let sql = format!(
            r#"
            INSERT INTO {} (id, content, metadata, embedding, updated_at)
            VALUES ($1, $2, $3, $4::vector, NOW())
            ON CONFLICT (id) DO UPDATE SET
                content = EXCLUDED.content,
                metadata = EXCLUDED.metadata,
                embedding = EXCLUDED.embedding,
                updated_at = NOW()
            "#,
            TABLE_NAME
        );

        let upsert_err = |e: sea_orm::DbErr| AppError::UpsertError {
            message: format!("Upsert failed: {}", e),
        };

        let txn = self.pool.write().begin().await.map_err(upsert_err)?;

        let written = latest.len();
        for record in latest {
            let metadata = serde_json::to_value(&record.document.metadata)?;
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                &sql,
                vec![
                    record.document.id.into(),
                    record.document.content.into(),
                    metadata.into(),
                    to_pgvector(&record.embedding).into(),
                ],
            );
            txn.execute(stmt).await.map_err(upsert_err)?;
        }

        txn.commit().await.map_err(upsert_err)?;

        debug!(written, "Upsert committed");
        Ok(written)
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        let model: Option<entity::Model> = DocumentEntity::find_by_id(id.to_string())
            .one(self.pool.read())
            .await?;
        model.map(Document::try_from).transpose()
    }

    async fn count(&self) -> Result<u64> {
        let count = DocumentEntity::find().count(self.pool.read()).await?;
        Ok(count)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
