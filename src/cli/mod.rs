//! CLI module for kbase
//!
//! Provides command-line interface parsing and handling for the kbase binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod chat;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// kbase - Knowledge Base Chat Server
///
/// Answers questions about a folder of text documents using retrieval
/// augmented generation.
#[derive(Parser, Debug)]
#[command(
    name = "kbase",
    version,
    about = "kbase - Knowledge Base Chat Server",
    long_about = "Answers questions about a folder of text documents.\n\n\
                  Run 'ingest' to load the documents into the vector index, then\n\
                  start the server (the default command) or chat in the terminal.",
    after_help = "EXAMPLES:\n    \
                  kbase ingest                        # Index ./documents\n    \
                  kbase ingest --dir notes            # Index another folder\n    \
                  kbase                               # Start the server (requires kbase.toml)\n    \
                  kbase ask \"How do I enroll?\"        # One question, one answer\n    \
                  kbase chat                          # Interactive terminal chat\n    \
                  kbase --config my.toml config --validate"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "kbase.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the HTTP server
    Serve,

    /// Chunk, embed and upsert every document in the documents folder
    ///
    /// Creates the folder if it does not exist. Re-running after editing a
    /// file replaces its chunks and removes chunks the new version no longer has.
    Ingest {
        /// Documents folder (defaults to ingest.documents_dir)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Answer a single question and exit
    Ask {
        /// The question
        question: String,

        /// Print the retrieved context
        #[arg(long)]
        debug: bool,
    },

    /// Chat with the knowledge base in the terminal
    Chat,

    /// Show configuration information
    Config {
        /// Validate the configuration file and the referenced environment variables
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The subcommand to run; no subcommand means `serve`.
    pub fn command(&self) -> &Commands {
        self.command.as_ref().unwrap_or(&Commands::Serve)
    }
}
