//! Whitespace normalization that keeps the line structure intact.

use super::Result;
use crate::error::ExtractionError;

/// Payslip text after normalization.
///
/// Line structure is preserved; only whitespace inside a line changes.
#[derive(Debug, Clone)]
pub struct NormalizedText {
    raw_lines: Vec<String>,
    lines: Vec<String>,
    text: String,
}

impl NormalizedText {
    /// Normalize raw OCR/PDF text.
    ///
    /// Fails only when nothing usable remains.
    pub fn new(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(ExtractionError::EmptyInput);
        }
        if !raw.chars().any(char::is_alphanumeric) {
            return Err(ExtractionError::NoData);
        }

        let raw_lines: Vec<String> = raw
            .lines()
            .map(|l| l.trim_end_matches('\r').to_string())
            .collect();

        let lines: Vec<String> = raw_lines
            .iter()
            .map(|l| collapse_whitespace(l))
            .filter(|l| !l.is_empty())
            .collect();

        let text = lines.join("\n");

        Ok(Self {
            raw_lines,
            lines,
            text,
        })
    }

    /// Cleaned, non-empty content lines.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Original lines, blank lines included.
    pub fn raw_lines(&self) -> &[String] {
        &self.raw_lines
    }

    /// Cleaned lines joined with newlines.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Collapse runs of whitespace (including non-breaking spaces) to one space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
