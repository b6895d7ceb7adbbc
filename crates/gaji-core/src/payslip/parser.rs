//! Payslip parser wiring the normalizer, extractors and reconciler.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::eligibility::evaluate;
use crate::models::config::{ExtractionConfig, GajiConfig, ReconcileConfig};
use crate::models::eligibility::{EligibilityResult, InstitutionRule};
use crate::models::payslip::{EventKind, Field, LineItem, PayslipRecord};

use super::normalize::NormalizedText;
use super::reconcile::{Reconciler, SourceCandidates};
use super::rules::{extract_summary, extract_tables, Candidates, PatternTable};
use super::{PayslipExtractor, Result};

/// Result of payslip extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    /// Reconciled payslip record.
    pub record: PayslipRecord,
    /// Income table rows.
    pub income: Vec<LineItem>,
    /// Deduction table rows.
    pub deductions: Vec<LineItem>,
    /// Repairs and discrepancies worth surfacing to a user.
    pub warnings: Vec<String>,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// A record together with its eligibility results.
#[derive(Debug, Clone, Serialize)]
pub struct PayslipAnalysis {
    pub record: PayslipRecord,
    pub eligibility: Vec<EligibilityResult>,
}

/// Rule-based payslip parser.
///
/// The pattern table is shared behind an `Arc`, so cloning a parser for
/// another worker does not recompile any regex.
#[derive(Debug, Clone)]
pub struct PayslipParser {
    patterns: Arc<PatternTable>,
    extraction: ExtractionConfig,
    reconcile: ReconcileConfig,
}

impl PayslipParser {
    /// Create a parser with the built-in strategies and default thresholds.
    pub fn new() -> Result<Self> {
        Ok(Self::with_patterns(PatternTable::standard()?))
    }

    /// Create a parser over a custom strategy table.
    pub fn with_patterns(patterns: PatternTable) -> Self {
        Self {
            patterns: Arc::new(patterns),
            extraction: ExtractionConfig::default(),
            reconcile: ReconcileConfig::default(),
        }
    }

    /// Apply the extraction and reconciliation sections of a config.
    pub fn with_config(mut self, config: &GajiConfig) -> Self {
        self.extraction = config.extraction.clone();
        self.reconcile = config.reconcile.clone();
        self
    }

    pub fn patterns(&self) -> &PatternTable {
        &self.patterns
    }

    pub fn extraction_config(&self) -> &ExtractionConfig {
        &self.extraction
    }

    /// Parse payslip text into a reconciled record.
    pub fn parse(&self, text: &str) -> Result<ExtractionResult> {
        let start = Instant::now();

        info!("Parsing payslip from {} characters of text", text.len());

        let normalized = NormalizedText::new(text)?;

        let tables = extract_tables(&normalized, &self.patterns.sections, &self.extraction);
        let summary = extract_summary(&normalized, &self.patterns.summary, &self.extraction);
        let pattern = self.run_chains(&normalized);

        debug!(
            table = tables.candidates().len(),
            summary = summary.len(),
            pattern = pattern.len(),
            "extractor candidates"
        );

        let sources = SourceCandidates {
            table: tables.candidates(),
            summary,
            pattern,
            table_sums: tables.summed_candidates(&self.extraction),
        };
        let record = Reconciler::new(&self.reconcile, &self.extraction).reconcile(&sources);

        let warnings = record
            .events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::Repaired | EventKind::Discrepancy))
            .map(|e| format!("{}: {}", e.field, e.strategy))
            .collect();

        info!(
            "Parsed payslip: completeness {:.0}%, confidence {:.1}",
            record.completeness, record.confidence_score
        );

        Ok(ExtractionResult {
            record,
            income: tables.income,
            deductions: tables.deductions,
            warnings,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn run_chains(&self, text: &NormalizedText) -> Candidates {
        Field::ALL
            .into_iter()
            .filter_map(|field| self.patterns.chain(field))
            .filter_map(|chain| chain.resolve(text, &self.extraction))
            .map(|m| (m.field, m))
            .collect()
    }
}

impl PayslipExtractor for PayslipParser {
    fn extract(&self, text: &str) -> Result<ExtractionResult> {
        self.parse(text)
    }
}

/// Parse a payslip and evaluate it against institution rules.
pub fn analyze(
    parser: &PayslipParser,
    text: &str,
    rules: &[InstitutionRule],
) -> Result<PayslipAnalysis> {
    let record = parser.parse(text)?.record;
    let eligibility = evaluate(&record, rules);
    Ok(PayslipAnalysis {
        record,
        eligibility,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionError;
    use crate::payslip::rules::Strategy;
    use pretty_assertions::assert_eq;

    const SAME_LINE: &str = "\
KERAJAAN MALAYSIA
PENYATA GAJI PEGAWAI
Nama : AHMAD BIN ABDULLAH          No. Gaji : 12345678
Bulan : OGOS 2024
PENDAPATAN
0001 Gaji Pokok 4,672.76
0201 Elaun Sara Hidup 300.00
0210 Bantuan Khas Kewangan 1,010.00
Jumlah Pendapatan : 5,982.76
POTONGAN
4011 KWSP 514.00
4301 Cukai Pendapatan 163.40
5402 Pinjaman Perumahan 2,600.00
Jumlah Potongan : 3,277.40
Gaji Bersih : 2,705.36
Peratus Gaji Bersih : 45.22
";

    #[test]
    fn test_parse_same_line_payslip() {
        let parser = PayslipParser::new().unwrap();
        let result = parser.parse(SAME_LINE).unwrap();
        let record = &result.record;

        assert_eq!(record.nama.as_deref(), Some("AHMAD BIN ABDULLAH"));
        assert_eq!(record.no_gaji.as_deref(), Some("12345678"));
        assert_eq!(record.gaji_pokok, Some(4672.76));
        assert_eq!(record.jumlah_pendapatan, Some(5982.76));
        assert_eq!(record.jumlah_potongan, Some(3277.40));
        assert_eq!(record.gaji_bersih, Some(2705.36));
        assert_eq!(record.peratus_gaji_bersih, Some(45.22));
        assert_eq!(record.completeness, 100.0);
        assert_eq!(result.income.len(), 3);
        assert_eq!(result.deductions.len(), 3);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        let parser = PayslipParser::new().unwrap();
        assert!(matches!(parser.parse("  \n\t"), Err(ExtractionError::EmptyInput)));
    }

    #[test]
    fn test_unrecognized_text_degrades_to_nulls() {
        let parser = PayslipParser::new().unwrap();
        let result = parser.parse("lorem ipsum dolor sit amet").unwrap();
        assert_eq!(result.record.missing_fields().len(), Field::ALL.len());
        assert_eq!(result.record.confidence_score, 0.0);
    }

    #[test]
    fn test_custom_strategy_is_consulted() {
        let patterns = PatternTable::standard()
            .unwrap()
            .with(
                Field::PeratusGajiBersih,
                Strategy::text(r"(?i)take[- ]home\s+ratio\s+(\d{1,3}(?:\.\d{1,2})?)", "take-home ratio", 0.5)
                    .unwrap(),
            );
        let parser = PayslipParser::with_patterns(patterns);
        let result = parser.parse("Take-home ratio 62.50").unwrap();
        assert_eq!(result.record.peratus_gaji_bersih, Some(62.5));
    }

    #[test]
    fn test_analyze_bundles_eligibility() {
        let parser = PayslipParser::new().unwrap();
        let rules = vec![
            InstitutionRule::new("Koperasi A", 40.0),
            InstitutionRule::new("Koperasi B", 60.0),
        ];
        let analysis = analyze(&parser, SAME_LINE, &rules).unwrap();
        assert_eq!(analysis.eligibility.len(), 2);
        assert!(analysis.eligibility[0].eligible);
        assert!(!analysis.eligibility[1].eligible);
    }
}
