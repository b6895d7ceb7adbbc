//! Report assembly and output formats.

use serde::Serialize;

use gaji_core::payslip::rules::format_amount;
use gaji_core::{
    EligibilityEvaluator, EligibilityResult, ExtractionResult, Field, InstitutionRule, LineItem,
    PayslipRecord,
};

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

/// What the CLI prints for one payslip.
#[derive(Debug, Clone, Serialize)]
pub struct PayslipReport {
    pub record: PayslipRecord,
    pub eligibility: Vec<EligibilityResult>,
    pub income: Vec<LineItem>,
    pub deductions: Vec<LineItem>,
    pub warnings: Vec<String>,
}

impl PayslipReport {
    pub fn new(
        result: ExtractionResult,
        evaluator: &EligibilityEvaluator,
        rules: &[InstitutionRule],
    ) -> Self {
        let eligibility = evaluator.evaluate(&result.record, rules);
        Self {
            record: result.record,
            eligibility,
            income: result.income,
            deductions: result.deductions,
            warnings: result.warnings,
        }
    }

    /// Institutions the payslip qualifies for.
    pub fn eligible_institutions(&self) -> Vec<&str> {
        self.eligibility
            .iter()
            .filter(|r| r.eligible)
            .map(|r| r.institution.as_str())
            .collect()
    }
}

/// Display switches for the text format.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detail {
    pub confidence: bool,
    pub events: bool,
}

pub fn format_report(report: &PayslipReport, format: OutputFormat, detail: Detail) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Csv => format_csv(report),
        OutputFormat::Text => Ok(format_text(report, detail)),
    }
}

const CSV_HEADER: [&str; 11] = [
    "nama",
    "no_gaji",
    "bulan",
    "gaji_pokok",
    "jumlah_pendapatan",
    "jumlah_potongan",
    "gaji_bersih",
    "peratus_gaji_bersih",
    "confidence_score",
    "completeness",
    "eligible_institutions",
];

fn format_csv(report: &PayslipReport) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(CSV_HEADER)?;

    let record = &report.record;
    let mut row: Vec<String> = Field::ALL.iter().map(|f| field_cell(record, *f)).collect();
    row.push(format!("{:.1}", record.confidence_score));
    row.push(format!("{:.0}", record.completeness));
    row.push(report.eligible_institutions().join(";"));
    wtr.write_record(&row)?;

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

/// A record field as a CSV cell; empty when missing.
pub fn field_cell(record: &PayslipRecord, field: Field) -> String {
    if field.is_numeric() {
        record.amount(field).map(|v| format!("{v:.2}")).unwrap_or_default()
    } else {
        record.text(field).unwrap_or_default().to_string()
    }
}

fn money(value: Option<f64>) -> String {
    value
        .map(|v| format!("RM {}", format_amount(v)))
        .unwrap_or_else(|| "-".to_string())
}

fn format_text(report: &PayslipReport, detail: Detail) -> String {
    let record = &report.record;
    let mut output = String::new();

    output.push_str(&format!("Nama:    {}\n", record.nama.as_deref().unwrap_or("-")));
    output.push_str(&format!("No Gaji: {}\n", record.no_gaji.as_deref().unwrap_or("-")));
    output.push_str(&format!("Bulan:   {}\n", record.bulan.as_deref().unwrap_or("-")));
    output.push('\n');

    output.push_str("Salary:\n");
    output.push_str(&format!("  Gaji Pokok:        {}\n", money(record.gaji_pokok)));
    output.push_str(&format!("  Jumlah Pendapatan: {}\n", money(record.jumlah_pendapatan)));
    output.push_str(&format!("  Jumlah Potongan:   {}\n", money(record.jumlah_potongan)));
    output.push_str(&format!("  Gaji Bersih:       {}\n", money(record.gaji_bersih)));
    output.push_str(&format!(
        "  Peratus Bersih:    {}\n",
        record
            .peratus_gaji_bersih
            .map(|p| format!("{p:.2}%"))
            .unwrap_or_else(|| "-".to_string())
    ));

    if !report.eligibility.is_empty() {
        output.push_str("\nEligibility:\n");
        for result in &report.eligibility {
            let verdict = if result.eligible { "eligible" } else { "not eligible" };
            output.push_str(&format!(
                "  {} - {} (score {})\n",
                result.institution, verdict, result.score
            ));
            for reason in &result.reasons {
                output.push_str(&format!("      {reason}\n"));
            }
        }
    }

    if !report.warnings.is_empty() {
        output.push_str("\nWarnings:\n");
        for warning in &report.warnings {
            output.push_str(&format!("  - {warning}\n"));
        }
    }

    if detail.confidence {
        output.push_str(&format!(
            "\nConfidence: {:.1} (completeness {:.0}%)\n",
            record.confidence_score, record.completeness
        ));
        for (field, score) in record.confidence.iter() {
            output.push_str(&format!("  {field}: {score:.1}\n"));
        }
    }

    if detail.events {
        output.push_str("\nEvents:\n");
        for event in &record.events {
            output.push_str(&format!(
                "  [{:?}] {}: {} ({:.2})",
                event.kind, event.field, event.strategy, event.weight
            ));
            if let Some(value) = &event.value {
                output.push_str(&format!(" = {value}"));
            }
            output.push('\n');
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> PayslipReport {
        PayslipReport {
            record: PayslipRecord {
                nama: Some("AHMAD BIN ALI".to_string()),
                gaji_bersih: Some(2705.36),
                peratus_gaji_bersih: Some(45.22),
                ..Default::default()
            },
            eligibility: vec![EligibilityResult {
                institution: "Koperasi A".to_string(),
                eligible: true,
                reasons: vec![],
                score: 70,
            }],
            income: vec![],
            deductions: vec![],
            warnings: vec![],
        }
    }

    #[test]
    fn test_csv_row() {
        let csv = format_report(&report(), OutputFormat::Csv, Detail::default()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("nama,no_gaji,bulan"));
        assert_eq!(lines[1], "AHMAD BIN ALI,,,,,,2705.36,45.22,0.0,0,Koperasi A");
    }

    #[test]
    fn test_text_summary() {
        let text = format_report(&report(), OutputFormat::Text, Detail::default()).unwrap();
        assert!(text.contains("RM 2,705.36"));
        assert!(text.contains("45.22%"));
        assert!(text.contains("Koperasi A - eligible"));
        assert!(!text.contains("Events:"));
    }
}
