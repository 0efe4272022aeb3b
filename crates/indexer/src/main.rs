//! SupportRAG Indexer
//!
//! Loads a support-article export into the vector store:
//! 1. Reads the JSON export from disk
//! 2. Normalizes categories, folders and articles into documents
//! 3. Embeds document content in batches
//! 4. Upserts every document by id
//! 5. Optionally answers questions from the terminal
//!
//! Usage: `indexer <path-to-export.json> [--if-empty] [--ask]`

mod ask;

use anyhow::{bail, Context};
use std::path::PathBuf;
use supportrag_common::{
    config::AppConfig,
    models::parse_source,
    pipeline::Normalizer,
    services::ServiceHandles,
    VERSION,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command line arguments
#[derive(Debug, PartialEq)]
struct IndexerArgs {
    source: PathBuf,
    /// Skip indexing when the store already holds documents
    if_empty: bool,
    /// Answer questions from stdin once the store is ready
    ask: bool,
}

impl IndexerArgs {
    fn parse(args: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        let mut source = None;
        let mut if_empty = false;
        let mut ask = false;

        for arg in args {
            match arg.as_str() {
                "--if-empty" => if_empty = true,
                "--ask" => ask = true,
                flag if flag.starts_with("--") => bail!("unknown flag: {}", flag),
                path if source.is_none() => source = Some(PathBuf::from(path)),
                extra => bail!("unexpected argument: {}", extra),
            }
        }

        let source = source.context("usage: indexer <path-to-export.json> [--if-empty] [--ask]")?;
        Ok(Self { source, if_empty, ask })
    }
}

/// Outcome of one indexer run
#[derive(Debug, PartialEq)]
enum RunOutcome {
    Skipped { existing: u64 },
    Indexed { documents: usize },
}

async fn run(args: &IndexerArgs, services: &ServiceHandles) -> anyhow::Result<RunOutcome> {
    if args.if_empty {
        let existing = services.store.count().await?;
        if existing > 0 {
            return Ok(RunOutcome::Skipped { existing });
        }
    }

    let raw = tokio::fs::read(&args.source)
        .await
        .with_context(|| format!("failed to read {}", args.source.display()))?;

    let categories = parse_source(&raw)?;
    let documents = Normalizer::default().normalize(&categories);
    if documents.is_empty() {
        bail!("no valid documents found in {}", args.source.display());
    }

    info!(documents = documents.len(), "Normalized export");

    let report = services.indexing_pipeline().index(documents).await?;
    info!(
        documents = report.documents_processed,
        model = %report.embedding_model,
        duration_ms = report.duration_ms,
        "Indexing complete"
    );

    Ok(RunOutcome::Indexed { documents: report.documents_processed })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let loaded = AppConfig::load();

    // Initialize tracing
    let observability = loaded
        .as_ref()
        .map(|c| c.observability.clone())
        .unwrap_or_default();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&observability.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }

    info!("Starting SupportRAG Indexer v{}", VERSION);

    // Load configuration
    let config = loaded.map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    let args = IndexerArgs::parse(std::env::args().skip(1)).map_err(|e| {
        tracing::error!(error = %e, "Invalid arguments");
        e
    })?;

    // Connecting creates the vector table when it is missing
    let services = ServiceHandles::connect(&config).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize services");
        e
    })?;

    match run(&args, &services).await {
        Ok(RunOutcome::Skipped { existing }) => {
            warn!(existing, "Store already populated, skipping indexing");
        }
        Ok(RunOutcome::Indexed { documents }) => {
            info!(documents, source = %args.source.display(), "Done");
        }
        Err(e) => {
            tracing::error!(error = %e, "Indexing failed");
            return Err(e.into());
        }
    }

    if args.ask {
        info!("Pipeline ready to answer questions");
        let pipeline = services.query_pipeline(&config);
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let answered = ask::ask_loop(&pipeline, stdin, tokio::io::stdout()).await?;
        info!(answered, "Question session ended");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> anyhow::Result<IndexerArgs> {
        IndexerArgs::parse(list.iter().map(|s| s.to_string()))
    }

    async fn offline_services() -> ServiceHandles {
        let mut config = AppConfig::default();
        config.embedding.provider = "mock".into();
        config.embedding.dimension = 8;
        config.generation.provider = "mock".into();
        config.vector_store.backend = "memory".into();
        ServiceHandles::connect(&config).await.unwrap()
    }

    async fn write_export(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("supportrag-export-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, contents).await.unwrap();
        path
    }

    const EXPORT: &str = r#"[{"category_name": "Billing", "folders": [{"folder_name": "Refunds", "articles": [
        {"id": 1, "title": "Refund Policy", "description_text": "Five days."},
        {"id": 2, "title": "Invoices", "description_text": "Monthly."},
        {"id": 0, "title": "Draft"}
    ]}]}]"#;

    #[test]
    fn test_parse_args() {
        assert_eq!(
            args(&["export.json", "--if-empty"]).unwrap(),
            IndexerArgs { source: PathBuf::from("export.json"), if_empty: true, ask: false }
        );
        assert!(!args(&["export.json"]).unwrap().if_empty);
        assert!(args(&["--ask", "export.json"]).unwrap().ask);
        assert!(args(&[]).is_err());
        assert!(args(&["a.json", "b.json"]).is_err());
        assert!(args(&["a.json", "--force"]).is_err());
    }

    #[tokio::test]
    async fn test_indexes_export() {
        let services = offline_services().await;
        let path = write_export(EXPORT).await;

        let outcome = run(&IndexerArgs { source: path.clone(), if_empty: false, ask: false }, &services)
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Indexed { documents: 2 });
        assert_eq!(services.store.count().await.unwrap(), 2);

        tokio::fs::remove_file(path).await.ok();
    }

    #[tokio::test]
    async fn test_if_empty_skips_populated_store() {
        let services = offline_services().await;
        let path = write_export(EXPORT).await;
        let args = IndexerArgs { source: path.clone(), if_empty: true, ask: false };

        assert_eq!(run(&args, &services).await.unwrap(), RunOutcome::Indexed { documents: 2 });
        assert_eq!(run(&args, &services).await.unwrap(), RunOutcome::Skipped { existing: 2 });

        tokio::fs::remove_file(path).await.ok();
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let services = offline_services().await;
        let args = IndexerArgs { source: PathBuf::from("/nonexistent/export.json"), if_empty: false, ask: false };
        tokio_test::assert_err!(run(&args, &services).await);
    }

    #[tokio::test]
    async fn test_export_without_documents_fails() {
        let services = offline_services().await;
        let path = write_export(r#"[{"folders": [{"articles": [{"id": 3}]}]}]"#).await;
        let result = run(&IndexerArgs { source: path.clone(), if_empty: false, ask: false }, &services).await;
        assert!(result.is_err());
        assert_eq!(services.store.count().await.unwrap(), 0);
        tokio::fs::remove_file(path).await.ok();
    }
}
