//! Terminal progress display for structuring runs

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

use crate::document::extractor::NumberingViolation;
use crate::document::observer::ProgressObserver;

/// Progress observer that drives an indicatif bar over source pages
pub struct ProgressBarObserver {
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressBarObserver {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }
}

impl Default for ProgressBarObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ProgressBarObserver {
    fn on_pages(&self, total: usize) {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.cyan} Pages [{bar:40.cyan/blue}] {pos}/{len} | {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        if let Ok(mut guard) = self.bar.lock() {
            *guard = Some(bar);
        }
    }

    fn on_page(&self, done: usize, _total: usize) {
        self.with_bar(|bar| bar.set_position(done as u64));
    }

    fn on_requirement(&self, number: &str, title: &str) {
        self.with_bar(|bar| bar.set_message(format!("Requirement {}: {}", number, title)));
    }

    fn on_violation(&self, violation: &NumberingViolation) {
        let line = format!(
            "warning: {} absorbed into requirement {} ({:?})",
            violation.number, violation.absorbed_by, violation.kind
        );
        self.with_bar(|bar| bar.println(line.yellow().to_string()));
    }

    fn on_finished(&self, requirements: usize, chunks: usize) {
        self.with_bar(|bar| {
            bar.finish_with_message(format!("{} requirements, {} chunks", requirements, chunks))
        });
    }
}
