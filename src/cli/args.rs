//! Command-line argument parsing for compliance-rag
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::Config;
use crate::rag::tasks::AdvisoryTask;

/// compliance-rag - Structure regulatory standards and answer questions about them
#[derive(Parser, Debug)]
#[command(name = "compliance-rag")]
#[command(version)]
#[command(about = "Structure a security standard into requirements and query it with retrieval-augmented answers", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Ollama host (overrides config)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Ollama port (overrides config)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Ollama model (overrides config)
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Results per search (overrides config)
    #[arg(short = 'k', long = "top-k", global = true)]
    pub k: Option<usize>,

    /// Verbosity level: default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress progress output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Structure a standard's extracted text into a JSON requirement tree
    Structure {
        /// Extracted text file (pages separated by form feeds)
        #[arg(value_name = "SOURCE")]
        source: Option<PathBuf>,

        /// Output JSON path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load a structured JSON document into the configured index
    Index {
        /// Structured JSON path
        #[arg(value_name = "JSON")]
        json: Option<PathBuf>,
    },

    /// Show classification, search strategy and assembled context
    Query {
        #[arg(value_name = "TEXT")]
        text: String,
    },

    /// Answer a question using retrieved requirements
    Ask {
        #[arg(value_name = "TEXT")]
        text: String,
    },

    /// Run an advisory task
    Advise {
        #[arg(value_enum)]
        task: TaskArg,

        #[arg(value_name = "TEXT")]
        text: String,
    },

    /// Display current configuration
    Config,
}

/// Advisory task selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TaskArg {
    Compliance,
    Policy,
    Risk,
    Plan,
}

impl From<TaskArg> for AdvisoryTask {
    fn from(arg: TaskArg) -> Self {
        match arg {
            TaskArg::Compliance => AdvisoryTask::Compliance,
            TaskArg::Policy => AdvisoryTask::Policy,
            TaskArg::Risk => AdvisoryTask::Risk,
            TaskArg::Plan => AdvisoryTask::Plan,
        }
    }
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.llm.host = host.clone();
        }
        if let Some(port) = self.port {
            config.llm.port = port;
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(k) = self.k {
            config.retrieval.k = k.max(1);
        }
    }
}

impl Verbosity {
    /// Default `tracing` filter directive
    pub fn filter_directive(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "compliance_rag=info",
            Verbosity::VeryVerbose => "compliance_rag=debug",
        }
    }

    /// Check if should show progress bars
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }
}
