//! CLI module for compliance-rag
//!
//! Handles command-line argument parsing and terminal progress display.

pub mod args;
pub mod progress;

pub use args::{Args, Commands, TaskArg, Verbosity};
pub use progress::ProgressBarObserver;
