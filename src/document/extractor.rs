//! Line-oriented segmentation of normalized text into a requirement tree
//!
//! Two states: outside any requirement (preamble, skipped) and inside an
//! open requirement. Header lines are tested before sub-requirement items,
//! so a line that could be either is always a header. Malformed numbering
//! never fails extraction: the line lands in whichever buffer is open and a
//! [`NumberingViolation`] is recorded.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document::types::{leading_segment, Requirement, Subrequirement};

/// Requirement header, anchored to the start of the line
const HEADER_PATTERN: &str = r"(?i)^requirement\s+(\d+)\s*:\s*(.+)$";

/// Dotted sub-requirement item: `3.1 Title` or `3.2.1 Title`
const ITEM_PATTERN: &str = r"^(\d+\.\d+(?:\.\d+)?)\s+(.+)$";

/// Kind of numbering problem seen during extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationKind {
    /// Sub-requirement whose leading segment is not the open requirement
    ForeignSubrequirement,
    /// Header repeating a requirement number that already has content
    DuplicateRequirement,
}

/// A recorded, non-fatal numbering problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingViolation {
    pub kind: ViolationKind,
    pub number: String,
    /// Requirement that absorbed the line
    pub absorbed_by: String,
    pub line: String,
}

/// Extraction output plus the violations found on the way
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    pub requirements: Vec<Requirement>,
    pub violations: Vec<NumberingViolation>,
}

/// Requirement being filled, with its content buffers
#[derive(Debug)]
struct OpenRequirement {
    requirement: Requirement,
    lines: Vec<String>,
    open_sub: Option<OpenSubrequirement>,
}

#[derive(Debug)]
struct OpenSubrequirement {
    sub: Subrequirement,
    lines: Vec<String>,
}

impl OpenRequirement {
    fn new(number: &str, title: &str) -> Self {
        Self {
            requirement: Requirement::new(number, title),
            lines: Vec::new(),
            open_sub: None,
        }
    }

    fn number(&self) -> &str {
        &self.requirement.number
    }

    /// Append a line to whichever buffer is open
    fn push_line(&mut self, line: &str) {
        match &mut self.open_sub {
            Some(open) => open.lines.push(line.to_string()),
            None => self.lines.push(line.to_string()),
        }
    }

    fn open_subrequirement(&mut self, number: &str, title: &str) {
        self.close_subrequirement();
        let sub = Subrequirement::new(number, title, self.requirement.number.clone());
        self.open_sub = Some(OpenSubrequirement {
            sub,
            lines: Vec::new(),
        });
    }

    fn close_subrequirement(&mut self) {
        if let Some(mut open) = self.open_sub.take() {
            open.sub.content = open.lines.join("\n");
            self.requirement.subrequirements.push(open.sub);
        }
    }

    fn finish(mut self) -> Requirement {
        self.close_subrequirement();
        self.requirement.content = self.lines.join("\n");
        self.requirement
    }
}

/// Extractor state
#[derive(Debug)]
enum State {
    Outside,
    Inside(OpenRequirement),
}

/// Segments normalized text into requirements and sub-requirements
#[derive(Debug, Clone)]
pub struct SectionExtractor {
    header: Regex,
    item: Regex,
}

impl SectionExtractor {
    pub fn new() -> Self {
        Self {
            header: Regex::new(HEADER_PATTERN).expect("valid header pattern"),
            item: Regex::new(ITEM_PATTERN).expect("valid item pattern"),
        }
    }

    /// Extract the ordered requirement sequence; no headers yields an empty vec
    pub fn extract(&self, text: &str) -> Vec<Requirement> {
        self.extract_with_report(text).requirements
    }

    /// Extract requirements and record numbering violations
    pub fn extract_with_report(&self, text: &str) -> ExtractionReport {
        let mut report = ExtractionReport::default();
        let mut state = State::Outside;

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            state = match state {
                State::Outside => match self.parse_header(line) {
                    Some((number, title)) => self.open(&number, &title, &mut report),
                    None => State::Outside,
                },
                State::Inside(mut open) => {
                    if let Some((number, title)) = self.parse_header(line) {
                        self.on_header(open, line, &number, &title, &mut report)
                    } else if let Some((number, title)) = self.parse_item(line) {
                        self.on_item(&mut open, line, &number, &title, &mut report);
                        State::Inside(open)
                    } else {
                        open.push_line(line);
                        State::Inside(open)
                    }
                }
            };
        }

        if let State::Inside(open) = state {
            report.requirements.push(open.finish());
        }

        report
    }

    fn parse_header(&self, line: &str) -> Option<(String, String)> {
        let caps = self.header.captures(line)?;
        Some((caps[1].to_string(), caps[2].trim().to_string()))
    }

    fn parse_item(&self, line: &str) -> Option<(String, String)> {
        let caps = self.item.captures(line)?;
        Some((caps[1].to_string(), caps[2].trim().to_string()))
    }

    /// Start a requirement, replacing an earlier empty occurrence of the
    /// same number (a table-of-contents entry).
    fn open(&self, number: &str, title: &str, report: &mut ExtractionReport) -> State {
        if let Some(pos) = report
            .requirements
            .iter()
            .position(|r| r.number == number && r.is_empty())
        {
            report.requirements.remove(pos);
        }
        State::Inside(OpenRequirement::new(number, title))
    }

    fn on_header(
        &self,
        mut open: OpenRequirement,
        line: &str,
        number: &str,
        title: &str,
        report: &mut ExtractionReport,
    ) -> State {
        // Running page header for the requirement already open
        if open.number() == number {
            return State::Inside(open);
        }

        let seen_with_content = report
            .requirements
            .iter()
            .any(|r| r.number == number && !r.is_empty());
        if seen_with_content {
            report.violations.push(NumberingViolation {
                kind: ViolationKind::DuplicateRequirement,
                number: number.to_string(),
                absorbed_by: open.number().to_string(),
                line: line.to_string(),
            });
            open.push_line(line);
            return State::Inside(open);
        }

        report.requirements.push(open.finish());
        self.open(number, title, report)
    }

    fn on_item(
        &self,
        open: &mut OpenRequirement,
        line: &str,
        number: &str,
        title: &str,
        report: &mut ExtractionReport,
    ) {
        if leading_segment(number) != open.number() {
            report.violations.push(NumberingViolation {
                kind: ViolationKind::ForeignSubrequirement,
                number: number.to_string(),
                absorbed_by: open.number().to_string(),
                line: line.to_string(),
            });
            open.push_line(line);
            return;
        }

        let repeats_open_sub = open
            .open_sub
            .as_ref()
            .is_some_and(|s| s.sub.number == number);
        if repeats_open_sub {
            open.push_line(line);
        } else {
            open.open_subrequirement(number, title);
        }
    }
}

impl Default for SectionExtractor {
    fn default() -> Self {
        Self::new()
    }
}
