//! Itemized income and deduction tables.
//!
//! Rows look like `0001 Gaji Pokok 4,672.76`. Sections open on a
//! "Pendapatan" or "Potongan" header and close on the matching
//! "Jumlah ..." line. A header naming both switches to side-by-side mode
//! where each row carries an income item followed by a deduction item.

use regex::Regex;
use tracing::debug;

use crate::models::config::ExtractionConfig;
use crate::models::payslip::{Field, LineItem};
use crate::payslip::normalize::NormalizedText;
use crate::payslip::Result;

use super::amounts::{parse_amount, round2, AMOUNT};
use super::strategy::{FieldMatch, FieldValue};
use super::Candidates;

const BASIC_SALARY_WEIGHT: f64 = 0.95;
const TOTAL_LINE_WEIGHT: f64 = 0.9;
const SUMMED_WEIGHT: f64 = 0.7;

/// Section header and row regexes.
#[derive(Debug, Clone)]
pub struct SectionPatterns {
    income_header: Regex,
    deduction_header: Regex,
    dual_header: Regex,
    total_line: Regex,
    total_value: Regex,
    row: Regex,
    basic_salary: Regex,
}

impl SectionPatterns {
    pub fn standard() -> Result<Self> {
        Ok(Self {
            income_header: Regex::new(r"(?i)^(?:kod\s+)?(?:pendapatan|earnings|income)\b")?,
            deduction_header: Regex::new(r"(?i)^(?:kod\s+)?(?:potongan|deductions?)\b")?,
            dual_header: Regex::new(
                r"(?i)^(?:kod\s+)?(?:pendapatan|earnings)\b.*\b(?:potongan|deductions?)\b",
            )?,
            total_line: Regex::new(r"(?i)^jumlah\s+(?:pendapatan|potongan)\b")?,
            total_value: Regex::new(&format!(
                r"(?i)\bjumlah\s+(pendapatan|potongan)\s*[:=]?\s*{AMOUNT}"
            ))?,
            row: Regex::new(&format!(
                r"\b(\d{{4}})\s+([A-Za-z][A-Za-z0-9 .,/&()%'\-]*?)\s+{AMOUNT}(?:\s|$)"
            ))?,
            basic_salary: Regex::new(r"(?i)^gaji\s+pokok\b")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Income,
    Deductions,
    SideBySide,
}

/// Everything recovered from the itemized tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableExtraction {
    /// Income rows in document order.
    pub income: Vec<LineItem>,
    /// Deduction rows in document order.
    pub deductions: Vec<LineItem>,
    /// Amount of the "Gaji Pokok" income row.
    pub basic_salary: Option<f64>,
    /// Explicit "Jumlah Pendapatan" closing an income section.
    pub income_total: Option<f64>,
    /// Explicit "Jumlah Potongan" closing a deduction section.
    pub deduction_total: Option<f64>,
}

impl TableExtraction {
    /// Basic salary and explicit totals, the highest-priority source.
    pub fn candidates(&self) -> Candidates {
        let mut found = Candidates::new();
        let entries = [
            (Field::GajiPokok, self.basic_salary, "income table Gaji Pokok row", BASIC_SALARY_WEIGHT),
            (Field::JumlahPendapatan, self.income_total, "income table total line", TOTAL_LINE_WEIGHT),
            (Field::JumlahPotongan, self.deduction_total, "deduction table total line", TOTAL_LINE_WEIGHT),
        ];
        for (field, value, description, weight) in entries {
            if let Some(value) = value {
                found.insert(field, table_match(field, value, description, weight));
            }
        }
        found
    }

    /// Row sums, used only when no explicit total is found anywhere.
    pub fn summed_candidates(&self, config: &ExtractionConfig) -> Candidates {
        let mut found = Candidates::new();
        let sums = [
            (Field::JumlahPendapatan, &self.income, "sum of income table rows"),
            (Field::JumlahPotongan, &self.deductions, "sum of deduction table rows"),
        ];
        for (field, items, description) in sums {
            if items.is_empty() {
                continue;
            }
            let total = round2(items.iter().map(|i| i.amount).sum());
            if config.is_plausible_amount(total) {
                found.insert(field, table_match(field, total, description, SUMMED_WEIGHT));
            }
        }
        found
    }
}

fn table_match(field: Field, value: f64, description: &str, weight: f64) -> FieldMatch {
    FieldMatch {
        field,
        value: FieldValue::Number(value),
        description: description.to_string(),
        weight,
    }
}

/// Parse the income and deduction tables.
pub fn extract_tables(
    text: &NormalizedText,
    patterns: &SectionPatterns,
    config: &ExtractionConfig,
) -> TableExtraction {
    let mut result = TableExtraction::default();
    let mut section: Option<Section> = None;

    for line in text.lines() {
        if patterns.total_line.is_match(line) {
            if section.is_some() {
                record_totals(line, patterns, config, &mut result);
                debug!(line = line.as_str(), "table section closed");
            }
            section = None;
            continue;
        }

        if patterns.dual_header.is_match(line) {
            section = Some(Section::SideBySide);
            continue;
        }
        if patterns.income_header.is_match(line) {
            section = Some(Section::Income);
            continue;
        }
        if patterns.deduction_header.is_match(line) {
            section = Some(Section::Deductions);
            continue;
        }

        let Some(current) = section else {
            continue;
        };

        let items: Vec<LineItem> = patterns
            .row
            .captures_iter(line)
            .filter_map(|caps| {
                let amount = parse_amount(&caps[3]).filter(|v| config.is_plausible_amount(*v))?;
                Some(LineItem {
                    code: caps[1].to_string(),
                    description: caps[2].trim().to_string(),
                    amount,
                })
            })
            .collect();

        match current {
            Section::Income => result.income.extend(items),
            Section::Deductions => result.deductions.extend(items),
            Section::SideBySide => place_side_by_side(items, &mut result),
        }
    }

    result.basic_salary = result
        .income
        .iter()
        .find(|item| patterns.basic_salary.is_match(&item.description))
        .map(|item| item.amount);

    debug!(
        income = result.income.len(),
        deductions = result.deductions.len(),
        "table rows collected"
    );

    result
}

/// First item of a side-by-side row is income, the second a deduction.
///
/// A lone item joins the column whose codes share its leading digit.
fn place_side_by_side(items: Vec<LineItem>, result: &mut TableExtraction) {
    let mut items = items.into_iter();
    match (items.next(), items.next()) {
        (Some(income), Some(deduction)) => {
            result.income.push(income);
            result.deductions.push(deduction);
        }
        (Some(item), None) => {
            let lead = item.code.chars().next();
            let in_deductions = result
                .deductions
                .iter()
                .any(|d| d.code.chars().next() == lead);
            let in_income = result.income.iter().any(|i| i.code.chars().next() == lead);
            if in_deductions && !in_income {
                result.deductions.push(item);
            } else {
                result.income.push(item);
            }
        }
        _ => {}
    }
}

fn record_totals(
    line: &str,
    patterns: &SectionPatterns,
    config: &ExtractionConfig,
    result: &mut TableExtraction,
) {
    for caps in patterns.total_value.captures_iter(line) {
        let Some(amount) = parse_amount(&caps[2]).filter(|v| config.is_plausible_amount(*v)) else {
            continue;
        };
        let slot = if caps[1].eq_ignore_ascii_case("pendapatan") {
            &mut result.income_total
        } else {
            &mut result.deduction_total
        };
        if slot.is_none() {
            *slot = Some(amount);
        }
    }
}
