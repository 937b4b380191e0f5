//! CLI module for PMP Knowledge RAG
//!
//! Provides subcommands for running the answer pipeline:
//! - `ask`: answer one question, batch or streaming

pub mod ask;

use clap::{Parser, Subcommand};

/// PMP Knowledge RAG - Hybrid retrieval and generation over tenant knowledge bases
#[derive(Parser)]
#[command(name = "pmp-knowledge-rag")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Answer a question as a given tenant and role
    Ask(ask::AskArgs),
}
