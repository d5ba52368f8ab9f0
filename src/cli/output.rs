//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the kbase CLI.

use crate::rag::ingest::{IngestEvent, IngestObserver, IngestReport};
use crate::types::RagAnswer;
use owo_colors::OwoColorize;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the kbase banner
    pub fn banner(&self) {
        if self.colored {
            println!(
                r#"
   {}
   {}
   {}
"#,
                " _    _                    ".bright_cyan().bold(),
                "| | _| |__   __ _ ___  ___ ".cyan().bold(),
                "| |/ / '_ \\ / _` / __|/ _ \\".blue().bold(),
            );
            println!(
                "   {} {}\n",
                "Knowledge Base Assistant".bright_white().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!(
                "\n   kbase - Knowledge Base Assistant v{}\n",
                env!("CARGO_PKG_VERSION")
            );
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a file skipped message
    pub fn skipped(&self, path: &str, reason: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "○".yellow(),
                path.dimmed(),
                format!("({})", reason).yellow()
            );
        } else {
            println!("  [SKIPPED] {} ({})", path, reason);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "💡".dimmed(), message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print a command suggestion
    pub fn command(&self, cmd: &str) {
        if self.colored {
            println!("     {}", format!("$ {}", cmd).bright_cyan());
        } else {
            println!("     $ {}", cmd);
        }
    }

    /// Print completion message
    pub fn complete(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "🚀".green(), message.bright_green().bold());
        } else {
            println!("\n  [DONE] {}", message);
        }
    }

    /// Print the list of sources under an answer
    pub fn sources(&self, sources: &[String]) {
        if sources.is_empty() {
            return;
        }
        if self.colored {
            println!("\n  {}", "Sources".cyan().bold());
        } else {
            println!("\n  Sources:");
        }
        for source in sources {
            self.list_item(source);
        }
    }

    /// Print a pipeline answer with its sources, and the retrieved context
    /// when `show_debug` is set
    pub fn answer(&self, answer: &RagAnswer, show_debug: bool) {
        let text = answer.answer();
        if answer.is_error() {
            self.error(&text);
        } else if self.colored {
            println!("\n  {}", text.bright_white());
        } else {
            println!("\n  {}", text);
        }

        self.sources(answer.sources());

        if show_debug {
            self.header("Debug");
            self.kv("chunks", &answer.num_chunks().to_string());
            if let Some(kind) = answer.failure_kind() {
                self.kv("failure", &format!("{:?}", kind));
            }
            let context = answer.context();
            if !context.is_empty() {
                if self.colored {
                    println!("\n{}", indent(context).dimmed());
                } else {
                    println!("\n{}", indent(context));
                }
            }
        }
    }

    /// Print the totals of an ingestion run
    pub fn ingest_report(&self, report: &IngestReport) {
        self.header("Ingestion summary");
        self.kv("files found", &report.files_found.to_string());
        self.kv("files processed", &report.files_processed.to_string());
        self.kv("files skipped", &report.files_skipped.to_string());
        self.kv("chunks created", &report.chunks_created.to_string());
        self.kv("records upserted", &report.records_upserted.to_string());
        if report.stale_records_deleted > 0 {
            self.kv(
                "stale records removed",
                &report.stale_records_deleted.to_string(),
            );
        }
        if let Some(total) = report.total_vectors {
            self.kv("vectors in index", &total.to_string());
        }

        if report.embed_failures > 0 {
            self.warning(&format!(
                "{} chunk(s) failed to embed and were skipped",
                report.embed_failures
            ));
        }
        if report.failed_batches > 0 {
            self.warning(&format!(
                "{} upsert batch(es) failed; re-run ingest to retry",
                report.failed_batches
            ));
        }
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

impl IngestObserver for Output {
    fn on_event(&self, event: &IngestEvent<'_>) {
        match event {
            IngestEvent::FilesFound { count } => {
                self.info(&format!("Found {} document(s)", count))
            }
            IngestEvent::FileChunked { source, chunks } => {
                self.info(&format!("{}: {} chunk(s)", source, chunks))
            }
            IngestEvent::FileSkipped { source, reason } => self.skipped(source, reason),
            IngestEvent::IndexReady { name } => self.success(&format!("Index '{}' ready", name)),
            IngestEvent::FileStored {
                source,
                upserted,
                embed_failures,
                failed_batches,
                pruned,
            } => {
                let mut message = format!("{}: stored {} record(s)", source, upserted);
                if *pruned > 0 {
                    message.push_str(&format!(", removed {} stale", pruned));
                }
                if *embed_failures > 0 || *failed_batches > 0 {
                    message.push_str(&format!(
                        " ({} embedding failure(s), {} failed batch(es))",
                        embed_failures, failed_batches
                    ));
                    self.warning(&message);
                } else {
                    self.success(&message);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FailureKind;

    #[test]
    fn test_output_new() {
        let output = Output::new();
        assert!(output.colored);
    }

    #[test]
    fn test_output_no_color() {
        let output = Output::no_color();
        assert!(!output.colored);
    }

    #[test]
    fn test_indent() {
        assert_eq!(indent("a\nb"), "    a\n    b");
    }

    #[test]
    fn test_output_methods_no_panic() {
        for output in [Output::no_color(), Output::new()] {
            output.banner();
            output.success("ok");
            output.info("info");
            output.warning("warn");
            output.error("err");
            output.skipped("a.txt", "empty");
            output.header("Header");
            output.kv("key", "value");
            output.hint("hint");
            output.command("kbase ingest");
            output.complete("done");
            output.sources(&["a.txt".to_string()]);
            output.answer(
                &RagAnswer::Answered {
                    answer: "yes".to_string(),
                    context: "line one\nline two".to_string(),
                    num_chunks: 1,
                    sources: vec!["a.txt".to_string()],
                },
                true,
            );
            output.answer(
                &RagAnswer::Failed {
                    kind: FailureKind::Timeout,
                    message: "slow".to_string(),
                },
                true,
            );
            output.ingest_report(&IngestReport {
                files_found: 2,
                embed_failures: 1,
                total_vectors: Some(4),
                ..Default::default()
            });
            output.on_event(&IngestEvent::FileStored {
                source: "a.txt",
                upserted: 2,
                embed_failures: 0,
                failed_batches: 0,
                pruned: 1,
            });
        }
    }
}
