//! Interactive terminal chat.
//!
//! Runs the same session loop as the web UI on stdin/stdout: each line is a
//! question unless it starts with `/`.

use crate::cli::output::Output;
use crate::rag::RagPipeline;
use crate::session::SessionState;
use crate::types::Result;
use owo_colors::OwoColorize;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Ask(String),
    /// `/examples N` asks the N-th example question (1-based)
    AskExample(usize),
    Help,
    Sources,
    Debug,
    Clear,
    Examples,
    Stats,
    Quit,
    Empty,
    Unknown(String),
}

impl ChatCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ChatCommand::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return ChatCommand::Ask(line.to_string());
        };

        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or_default().to_ascii_lowercase();
        let arg = parts.next();

        match (name.as_str(), arg) {
            ("help" | "h" | "?", _) => ChatCommand::Help,
            ("sources", _) => ChatCommand::Sources,
            ("debug", _) => ChatCommand::Debug,
            ("clear", _) => ChatCommand::Clear,
            ("examples", None) => ChatCommand::Examples,
            ("examples", Some(n)) => match n.parse::<usize>() {
                Ok(n) if n > 0 => ChatCommand::AskExample(n),
                _ => ChatCommand::Unknown(line.to_string()),
            },
            ("stats", _) => ChatCommand::Stats,
            ("quit" | "exit" | "q", _) => ChatCommand::Quit,
            _ => ChatCommand::Unknown(line.to_string()),
        }
    }
}

/// Terminal chat over a pipeline.
pub struct TerminalChat<'a> {
    pipeline: &'a RagPipeline,
    examples: Vec<String>,
    output: &'a Output,
    session: SessionState,
}

impl<'a> TerminalChat<'a> {
    pub fn new(pipeline: &'a RagPipeline, examples: Vec<String>, output: &'a Output) -> Self {
        Self {
            pipeline,
            examples,
            output,
            session: SessionState::new("terminal"),
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Read lines from stdin until `/quit` or end of input.
    pub async fn run(&mut self) -> Result<()> {
        self.output.info("Ask a question about the documents. Type /help for commands.");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            self.prompt();
            let Some(line) = lines.next_line().await? else {
                break;
            };
            if !self.handle(ChatCommand::parse(&line)).await {
                break;
            }
        }

        let stats = self.session.stats();
        self.output.complete(&format!(
            "Bye! {} question(s) this session",
            stats.queries
        ));
        Ok(())
    }

    /// Act on one command. Returns `false` to end the loop.
    pub async fn handle(&mut self, command: ChatCommand) -> bool {
        match command {
            ChatCommand::Ask(question) => self.ask(&question).await,
            ChatCommand::AskExample(n) => match n.checked_sub(1).and_then(|i| self.examples.get(i)).cloned() {
                Some(question) => {
                    self.output.info(&question);
                    self.ask(&question).await;
                }
                None => self
                    .output
                    .warning(&format!("There is no example {}", n)),
            },
            ChatCommand::Help => self.help(),
            ChatCommand::Sources => {
                let sources = self.session.last_sources();
                if sources.is_empty() {
                    self.output.info("No sources yet");
                } else {
                    self.output.sources(sources);
                }
            }
            ChatCommand::Debug => {
                let enabled = !self.session.show_debug;
                self.session.set_debug(enabled);
                self.output.info(if enabled {
                    "Debug info on"
                } else {
                    "Debug info off"
                });
            }
            ChatCommand::Clear => {
                self.session.clear_history();
                self.output.success("Chat cleared");
            }
            ChatCommand::Examples => {
                self.output.header("Example questions");
                for (i, question) in self.examples.iter().enumerate() {
                    self.output.list_item(&format!("{}. {}", i + 1, question));
                }
                self.output.hint("Type /examples N to ask one");
            }
            ChatCommand::Stats => {
                let stats = self.session.stats();
                self.output.kv("messages", &stats.messages.to_string());
                self.output.kv("queries", &stats.queries.to_string());
            }
            ChatCommand::Quit => return false,
            ChatCommand::Empty => {}
            ChatCommand::Unknown(input) => self
                .output
                .warning(&format!("Unknown command '{}'. Type /help", input)),
        }
        true
    }

    async fn ask(&mut self, question: &str) {
        let answer = self.pipeline.answer(question).await;
        self.output.answer(&answer, self.session.show_debug);
        self.session.record_exchange(question, &answer);
    }

    fn help(&self) {
        self.output.header("Commands");
        for (command, description) in [
            ("/sources", "sources of the last answer"),
            ("/debug", "toggle retrieval details"),
            ("/clear", "clear the chat"),
            ("/examples", "list example questions"),
            ("/stats", "message and query counts"),
            ("/quit", "leave"),
        ] {
            self.output.kv(command, description);
        }
    }

    fn prompt(&self) {
        if self.output.colored {
            print!("\n{} ", ">".bright_cyan().bold());
        } else {
            print!("\n> ");
        }
        std::io::stdout().flush().ok();
    }
}
