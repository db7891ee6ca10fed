//! Cleanup of raw extracted text
//!
//! Page extraction leaves ragged spacing, runs of blank lines and bullet
//! glyphs glued onto the preceding sentence. Normalization keeps line
//! structure intact because the section extractor is line-oriented.

/// Glyphs that start a list item
const BULLETS: [char; 3] = ['•', '▪', '●'];

/// Pure text cleanup; `normalize(normalize(x)) == normalize(x)`
#[derive(Debug, Clone, Copy, Default)]
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize raw text
    ///
    /// - runs of whitespace inside a line become one space, lines are trimmed
    /// - every bullet glyph starts its own line
    /// - two or more blank lines collapse to exactly one
    /// - leading and trailing blank lines are dropped
    pub fn normalize(&self, text: &str) -> String {
        let mut lines: Vec<String> = Vec::new();

        for raw_line in text.lines() {
            for segment in split_bullets(raw_line) {
                let collapsed = segment.split_whitespace().collect::<Vec<_>>().join(" ");
                if collapsed.is_empty() && lines.last().map_or(true, |l| l.is_empty()) {
                    continue;
                }
                lines.push(collapsed);
            }
        }

        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }

        lines.join("\n")
    }
}

/// Split a line so that each bullet glyph begins a new segment.
///
/// A bullet already at the start of the line (after whitespace) does not
/// produce an empty leading segment.
fn split_bullets(line: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;

    for (idx, ch) in line.char_indices() {
        if BULLETS.contains(&ch) && idx > start {
            let head = &line[start..idx];
            if !(start == 0 && head.trim().is_empty()) {
                segments.push(head);
            }
            start = idx;
        }
    }
    segments.push(&line[start..]);
    segments
}

/// Convenience wrapper over [`TextNormalizer::normalize`]
pub fn normalize(text: &str) -> String {
    TextNormalizer::new().normalize(text)
}
