//! Interactive question loop over the indexed store

use std::fmt::Write as _;
use supportrag_common::{models::AnswerResult, pipeline::QueryPipeline};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

const PROMPT: &str = "Ask a question (or type 'quit' to exit): ";
const RULE_WIDTH: usize = 50;

/// Answer one question per input line until `quit`, `exit` or end of input.
/// Blank lines are skipped. Returns how many questions were answered.
pub async fn ask_loop<R, W>(pipeline: &QueryPipeline, reader: R, mut out: W) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut answered = 0;

    loop {
        out.write_all(PROMPT.as_bytes()).await?;
        out.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let question = line.trim();
        if question.eq_ignore_ascii_case("quit") || question.eq_ignore_ascii_case("exit") {
            out.write_all(b"Goodbye!\n").await?;
            break;
        }
        if question.is_empty() {
            continue;
        }

        let answer = pipeline.answer(question).await.unwrap_or_else(|e| {
            warn!(error = %e, "Query failed");
            AnswerResult::internal_error()
        });

        out.write_all(render_answer(&answer).as_bytes()).await?;
        answered += 1;
    }

    out.flush().await?;
    Ok(answered)
}

/// Answer text followed by numbered references
pub fn render_answer(answer: &AnswerResult) -> String {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);

    let mut out = String::new();
    let _ = writeln!(out, "\n{}", heavy);
    let _ = writeln!(out, "ANSWER:");
    let _ = writeln!(out, "{}", answer.answer);
    let _ = writeln!(out, "\n{}", light);
    let _ = writeln!(out, "REFERENCES:");
    if answer.references.is_empty() {
        let _ = writeln!(out, "No references cited.");
    } else {
        for (i, reference) in answer.references.iter().enumerate() {
            let _ = writeln!(out, "  [{}] {}", i + 1, reference);
        }
    }
    let _ = writeln!(out, "{}\n", heavy);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use supportrag_common::{
        config::AppConfig,
        embeddings::MockEmbedder,
        models::NO_ANSWER_TEXT,
        pipeline::MockGenerator,
        services::ServiceHandles,
        store::InMemoryVectorStore,
    };

    fn pipeline_with(replies: Vec<String>) -> QueryPipeline {
        let services = ServiceHandles {
            embedder: Arc::new(MockEmbedder::new(8)),
            generator: Arc::new(MockGenerator::with_replies(replies)),
            store: Arc::new(InMemoryVectorStore::new()),
        };
        services.query_pipeline(&AppConfig::default())
    }

    async fn session(pipeline: &QueryPipeline, input: &str) -> (usize, String) {
        let mut out = Vec::new();
        let answered = ask_loop(pipeline, input.as_bytes(), &mut out).await.unwrap();
        (answered, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_render_numbers_references() {
        let rendered = render_answer(&AnswerResult {
            answer: "Refunds take 5 days.".into(),
            references: vec!["Refund Policy".into(), "Invoices".into()],
        });
        assert!(rendered.contains("ANSWER:\nRefunds take 5 days.\n"));
        assert!(rendered.contains("  [1] Refund Policy\n  [2] Invoices\n"));
        assert!(!rendered.contains("No references cited."));
    }

    #[test]
    fn test_render_without_references() {
        let rendered = render_answer(&AnswerResult::no_answer());
        assert!(rendered.contains(NO_ANSWER_TEXT));
        assert!(rendered.contains("REFERENCES:\nNo references cited.\n"));
    }

    #[tokio::test]
    async fn test_answers_until_quit() {
        let pipeline = pipeline_with(vec![
            r#"{"answer": "Refunds take 5 days.", "references": ["Refund Policy"]}"#.into(),
        ]);

        let (answered, output) =
            session(&pipeline, "How long do refunds take?\n\n   \nQUIT\nnever asked\n").await;

        assert_eq!(answered, 1);
        assert!(output.contains("Refunds take 5 days."));
        assert!(output.contains("  [1] Refund Policy"));
        assert!(output.ends_with("Goodbye!\n"));
        assert!(!output.contains("never asked"));
        // one prompt per line read, up to and including the quit line
        assert_eq!(output.matches(PROMPT).count(), 4);
    }

    #[tokio::test]
    async fn test_exit_and_end_of_input_stop_the_loop() {
        let pipeline = pipeline_with(vec![]);
        let (answered, output) = session(&pipeline, "exit\n").await;
        assert_eq!(answered, 0);
        assert!(output.ends_with("Goodbye!\n"));

        let (answered, output) = session(&pipeline, "Where is my invoice?").await;
        assert_eq!(answered, 1);
        assert!(output.contains("No references cited."));
        assert!(!output.contains("Goodbye!"));
    }
}
