//! Totals block at the foot of the payslip.
//!
//! Two layout families are handled:
//! - same-line: `Jumlah Potongan : 3,277.40`
//! - stacked: every label on its own line, then a run of colon-only lines,
//!   then a run of bare figures mapped back to the labels by position.
//!
//! Gross income is often printed apart from the rest as a three-line
//! label/colon/value triplet and is searched for on its own.

use regex::Regex;
use tracing::debug;

use crate::models::config::ExtractionConfig;
use crate::models::payslip::Field;
use crate::payslip::normalize::NormalizedText;
use crate::payslip::Result;

use super::amounts::{AMOUNT, PERCENT};
use super::patterns::{COLON_LINE, FOOTNOTE_LINE, NUMERIC_LINE};
use super::strategy::{clean_value, FieldMatch};
use super::Candidates;

/// Label order assumed when three figures follow an incomplete label run.
const CANONICAL_ORDER: [Field; 3] = [
    Field::JumlahPotongan,
    Field::GajiBersih,
    Field::PeratusGajiBersih,
];

const SAME_LINE_WEIGHT: f64 = 0.9;
const STACKED_WEIGHT: f64 = 0.85;
const CANONICAL_WEIGHT: f64 = 0.75;
const TRIPLET_WEIGHT: f64 = 0.85;

/// Label regexes for the summary block.
#[derive(Debug, Clone)]
pub struct SummaryPatterns {
    /// Line holding only a label (optionally with a trailing colon).
    labels: Vec<(Field, Regex)>,
    /// Label followed by its value on the same line.
    same_line: Vec<(Field, Regex)>,
}

impl SummaryPatterns {
    pub fn standard() -> Result<Self> {
        let labels = vec![
            (Field::JumlahPendapatan, Regex::new(r"(?i)^jumlah\s+pendapatan\s*:?$")?),
            (Field::JumlahPotongan, Regex::new(r"(?i)^jumlah\s+potongan\s*:?$")?),
            (Field::GajiBersih, Regex::new(r"(?i)^(?:jumlah\s+)?gaji\s+bersih\s*:?$")?),
            (
                Field::PeratusGajiBersih,
                Regex::new(r"(?i)^%?\s*peratus(?:\s+gaji\s+bersih)?\s*:?$")?,
            ),
        ];

        let same_line = vec![
            (
                Field::JumlahPendapatan,
                Regex::new(&format!(r"(?i)\bjumlah\s+pendapatan\s*[:=]?\s*{AMOUNT}"))?,
            ),
            (
                Field::JumlahPotongan,
                Regex::new(&format!(r"(?i)\bjumlah\s+potongan\s*[:=]?\s*{AMOUNT}"))?,
            ),
            (
                Field::GajiBersih,
                Regex::new(&format!(r"(?i)(?:^|\d\s)(?:jumlah\s+)?gaji\s+bersih\s*[:=]?\s*{AMOUNT}"))?,
            ),
            (
                Field::PeratusGajiBersih,
                Regex::new(&format!(r"(?i)peratus(?:\s+gaji\s+bersih)?\s*[:=]?\s*{PERCENT}"))?,
            ),
        ];

        Ok(Self { labels, same_line })
    }

    fn label_of(&self, line: &str) -> Option<Field> {
        self.labels
            .iter()
            .find(|(_, re)| re.is_match(line))
            .map(|(field, _)| *field)
    }

    fn label_regex(&self, field: Field) -> Option<&Regex> {
        self.labels.iter().find(|(f, _)| *f == field).map(|(_, re)| re)
    }
}

/// A stacked label block and the figures collected after it.
#[derive(Debug, Clone, PartialEq)]
struct StackedBlock<'t> {
    start: usize,
    labels: Vec<Field>,
    values: Vec<&'t str>,
}

impl<'t> StackedBlock<'t> {
    /// Three figures under a partial run of the canonical labels cannot be
    /// mapped by discovery order.
    fn is_ambiguous(&self) -> bool {
        self.values.len() == 3
            && self.labels.len() < 3
            && self.labels.iter().all(|l| CANONICAL_ORDER.contains(l))
    }

    fn assignments(&self) -> Vec<(Field, &'t str, f64)> {
        if self.is_ambiguous() {
            return CANONICAL_ORDER
                .iter()
                .zip(&self.values)
                .map(|(field, value)| (*field, *value, CANONICAL_WEIGHT))
                .collect();
        }
        self.labels
            .iter()
            .zip(&self.values)
            .map(|(field, value)| (*field, *value, STACKED_WEIGHT))
            .collect()
    }
}

/// Extract the summary totals.
pub fn extract_summary(
    text: &NormalizedText,
    patterns: &SummaryPatterns,
    config: &ExtractionConfig,
) -> Candidates {
    let lines = text.lines();
    let mut found = Candidates::new();

    if let Some(m) = income_triplet(lines, patterns, config) {
        found.insert(m.field, m);
    }

    let blocks = stacked_blocks(lines, patterns, config);
    if blocks.is_empty() {
        debug!("no stacked summary block, using same-line scan");
    }
    for block in &blocks {
        debug!(
            start = block.start,
            labels = block.labels.len(),
            values = block.values.len(),
            "stacked summary block"
        );
        let description = if block.is_ambiguous() {
            "stacked summary block (canonical order)"
        } else {
            "stacked summary block"
        };
        for (field, raw, weight) in block.assignments() {
            if found.contains_key(&field) {
                continue;
            }
            if let Some(value) = clean_value(field, raw, config) {
                found.insert(
                    field,
                    FieldMatch {
                        field,
                        value,
                        description: description.to_string(),
                        weight,
                    },
                );
            }
        }
    }

    same_line(lines, patterns, config, &mut found);
    found
}

/// `Jumlah Pendapatan` / `:` / value on three consecutive lines.
fn income_triplet(
    lines: &[String],
    patterns: &SummaryPatterns,
    config: &ExtractionConfig,
) -> Option<FieldMatch> {
    let label = patterns.label_regex(Field::JumlahPendapatan)?;

    lines.windows(3).find_map(|w| {
        if !label.is_match(&w[0]) || !COLON_LINE.is_match(&w[1]) {
            return None;
        }
        let raw = NUMERIC_LINE.captures(&w[2])?.get(1)?.as_str();
        let value = clean_value(Field::JumlahPendapatan, raw, config)?;
        Some(FieldMatch {
            field: Field::JumlahPendapatan,
            value,
            description: "Jumlah Pendapatan label, colon and value on three lines".to_string(),
            weight: TRIPLET_WEIGHT,
        })
    })
}

/// Find every stacked label block in document order.
fn stacked_blocks<'t>(
    lines: &'t [String],
    patterns: &SummaryPatterns,
    config: &ExtractionConfig,
) -> Vec<StackedBlock<'t>> {
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        match stacked_block_at(lines, i, patterns, config) {
            Some((block, end)) => {
                blocks.push(block);
                i = end.max(i + 1);
            }
            None => i += 1,
        }
    }

    blocks
}

/// Try to read a stacked block whose first label is on line `start`.
///
/// Returns the block and the index of the first line after it.
fn stacked_block_at<'t>(
    lines: &'t [String],
    start: usize,
    patterns: &SummaryPatterns,
    config: &ExtractionConfig,
) -> Option<(StackedBlock<'t>, usize)> {
    let first = patterns.label_of(&lines[start])?;
    let mut labels = vec![first];
    let mut label_end = start + 1;

    // Remaining labels within the lookahead window; stray lines are skipped
    let window_end = (start + 1 + config.label_window).min(lines.len());
    for (j, line) in lines.iter().enumerate().take(window_end).skip(start + 1) {
        if COLON_LINE.is_match(line) || NUMERIC_LINE.is_match(line) {
            break;
        }
        if let Some(label) = patterns.label_of(line) {
            if !labels.contains(&label) {
                labels.push(label);
            }
            label_end = j + 1;
        }
    }

    // Colon run, unless the figures follow the labels directly
    let mut k = label_end;
    let directly_numeric = lines.get(k).is_some_and(|l| NUMERIC_LINE.is_match(l));
    if !directly_numeric {
        let limit = (label_end + config.value_window).min(lines.len());
        while k < limit && !COLON_LINE.is_match(&lines[k]) {
            if patterns.label_of(&lines[k]).is_some() {
                return None;
            }
            k += 1;
        }
        if k >= limit {
            return None;
        }
        while k < lines.len() && COLON_LINE.is_match(&lines[k]) {
            k += 1;
        }
    }

    let mut values = Vec::new();
    while k < lines.len() {
        let line = &lines[k];
        if let Some(m) = NUMERIC_LINE.captures(line).and_then(|c| c.get(1)) {
            values.push(m.as_str());
        } else if !FOOTNOTE_LINE.is_match(line) {
            break;
        }
        k += 1;
    }

    if values.is_empty() {
        return None;
    }

    Some((
        StackedBlock {
            start,
            labels,
            values,
        },
        k,
    ))
}

/// Per-line `label [:=]? value` scan for labels still unresolved.
fn same_line(
    lines: &[String],
    patterns: &SummaryPatterns,
    config: &ExtractionConfig,
    found: &mut Candidates,
) {
    for (field, re) in &patterns.same_line {
        if found.contains_key(field) {
            continue;
        }
        let hit = lines.iter().find_map(|line| {
            re.captures_iter(line)
                .filter_map(|caps| caps.get(1))
                .find_map(|m| clean_value(*field, m.as_str(), config))
        });
        if let Some(value) = hit {
            found.insert(
                *field,
                FieldMatch {
                    field: *field,
                    value,
                    description: "summary line label with value".to_string(),
                    weight: SAME_LINE_WEIGHT,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::payslip::rules::strategy::FieldValue;

    fn summary(text: &str) -> Candidates {
        let text = NormalizedText::new(text).unwrap();
        let patterns = SummaryPatterns::standard().unwrap();
        extract_summary(&text, &patterns, &ExtractionConfig::default())
    }

    fn number(found: &Candidates, field: Field) -> Option<f64> {
        found.get(&field).and_then(|m| m.value.as_number())
    }

    #[test]
    fn test_same_line_layout() {
        let found = summary(
            "Jumlah Pendapatan : 5,982.76\n\
             Jumlah Potongan : 3,277.40\n\
             Gaji Bersih : 2,705.36\n\
             % Peratus Gaji Bersih : 45.22",
        );

        assert_eq!(number(&found, Field::JumlahPendapatan), Some(5982.76));
        assert_eq!(number(&found, Field::JumlahPotongan), Some(3277.40));
        assert_eq!(number(&found, Field::GajiBersih), Some(2705.36));
        assert_eq!(number(&found, Field::PeratusGajiBersih), Some(45.22));
    }

    #[test]
    fn test_stacked_layout_with_income_triplet() {
        let found = summary(
            "Jumlah Pendapatan\n:\n5,982.76\n\
             Jumlah Potongan\nGaji Bersih\n% Peratus Gaji Bersih\n\
             :\n:\n:\n\
             3,277.40\n2,705.36\n45.22\n\
             Dicetak oleh sistem",
        );

        assert_eq!(number(&found, Field::JumlahPendapatan), Some(5982.76));
        assert_eq!(number(&found, Field::JumlahPotongan), Some(3277.40));
        assert_eq!(number(&found, Field::GajiBersih), Some(2705.36));
        assert_eq!(number(&found, Field::PeratusGajiBersih), Some(45.22));
        assert_eq!(
            found[&Field::JumlahPotongan].description,
            "stacked summary block"
        );
    }

    #[test]
    fn test_stacked_order_follows_discovery() {
        let found = summary(
            "% Peratus Gaji Bersih\nJumlah Potongan\nGaji Bersih\n:\n:\n:\n45.22\n3,277.40\n2,705.36",
        );

        assert_eq!(number(&found, Field::PeratusGajiBersih), Some(45.22));
        assert_eq!(number(&found, Field::JumlahPotongan), Some(3277.40));
        assert_eq!(number(&found, Field::GajiBersih), Some(2705.36));
    }

    #[test]
    fn test_ambiguous_block_uses_canonical_order() {
        // OCR dropped the net salary label
        let found = summary("Jumlah Potongan\nPeratus\n:\n:\n3,277.40\n2,705.36\n45.22");

        assert_eq!(number(&found, Field::JumlahPotongan), Some(3277.40));
        assert_eq!(number(&found, Field::GajiBersih), Some(2705.36));
        assert_eq!(number(&found, Field::PeratusGajiBersih), Some(45.22));
        assert_eq!(found[&Field::GajiBersih].weight, CANONICAL_WEIGHT);
    }

    #[test]
    fn test_footnotes_inside_value_run() {
        let found = summary(
            "Jumlah Potongan\nGaji Bersih\n:\n:\n3,277.40\n* termasuk KWSP\n2,705.36\nTarikh Cetak",
        );

        assert_eq!(number(&found, Field::JumlahPotongan), Some(3277.40));
        assert_eq!(number(&found, Field::GajiBersih), Some(2705.36));
    }

    #[test]
    fn test_out_of_range_value_is_dropped() {
        let found = summary("Jumlah Potongan\n% Peratus Gaji Bersih\n:\n:\n3,277.40\n245.22");

        assert_eq!(number(&found, Field::JumlahPotongan), Some(3277.40));
        assert!(!found.contains_key(&Field::PeratusGajiBersih));
    }

    #[test]
    fn test_same_line_percentage_needs_whole_figure() {
        let found = summary("Jumlah Potongan : 3277,40\nPeratus Gaji Bersih : 3,277.40");

        assert_eq!(number(&found, Field::JumlahPotongan), Some(3277.40));
        assert!(!found.contains_key(&Field::PeratusGajiBersih));

        let found = summary("Peratus : 1000");
        assert!(!found.contains_key(&Field::PeratusGajiBersih));
    }

    #[test]
    fn test_same_line_fills_gaps_after_block() {
        let found = summary(
            "Jumlah Potongan\nGaji Bersih\n:\n:\n3,277.40\n2,705.36\nPeratus Gaji Bersih : 45.22 %",
        );

        assert_eq!(number(&found, Field::PeratusGajiBersih), Some(45.22));
        assert_eq!(
            found[&Field::PeratusGajiBersih].value,
            FieldValue::Number(45.22)
        );
    }
}
