//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: run the coding agent for a prompt
//! - history: show a conversation's messages
//! - steps: show the checkpointed steps of a run

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sandloop - a sandboxed coding agent with checkpointed runs
#[derive(Parser, Debug)]
#[command(name = "sandloop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the coding agent for a prompt
    Run {
        /// What to build
        prompt: String,

        /// Conversation to continue (a new one is started when omitted)
        #[arg(short = 'C', long)]
        conversation: Option<String>,

        /// Run id; reusing one resumes that run from its checkpoints
        #[arg(short, long)]
        run_id: Option<String>,
    },

    /// Show the messages of a conversation, oldest first
    History {
        /// Conversation ID
        conversation: String,
    },

    /// List the checkpointed steps of a run
    Steps {
        /// Run ID
        run_id: String,
    },
}
