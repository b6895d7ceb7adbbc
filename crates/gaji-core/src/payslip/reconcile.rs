//! Merging, repair and scoring of extractor results.
//!
//! Order of work: merge by source priority, apply the repair rules, derive
//! still-missing fields arithmetically, sweep the record invariants, then
//! score. Nothing here fails; every decision lands in the event trail.

use tracing::{debug, warn};

use crate::models::config::{ExtractionConfig, ReconcileConfig};
use crate::models::payslip::{EventKind, ExtractionEvent, Field, PayslipRecord};

use super::rules::amounts::round2;
use super::rules::{Candidates, FieldMatch, FieldValue};

/// Extractor outputs, one map per source.
#[derive(Debug, Clone, Default)]
pub struct SourceCandidates {
    /// Table rows and explicit table totals.
    pub table: Candidates,
    /// Summary block.
    pub summary: Candidates,
    /// Pattern strategy chains.
    pub pattern: Candidates,
    /// Table row sums.
    pub table_sums: Candidates,
}

impl SourceCandidates {
    /// Sources from highest to lowest priority.
    fn by_priority(&self) -> [&Candidates; 4] {
        [&self.table, &self.summary, &self.pattern, &self.table_sums]
    }
}

/// Turns extractor candidates into a consistent record.
pub struct Reconciler<'c> {
    config: &'c ReconcileConfig,
    bounds: &'c ExtractionConfig,
}

impl<'c> Reconciler<'c> {
    pub fn new(config: &'c ReconcileConfig, bounds: &'c ExtractionConfig) -> Self {
        Self { config, bounds }
    }

    pub fn reconcile(&self, sources: &SourceCandidates) -> PayslipRecord {
        let mut record = PayslipRecord::new();

        self.merge(sources, &mut record);

        self.swap_transposed_totals(&mut record);
        self.recompute_implausible_net(&mut record);
        self.swap_basic_and_gross(&mut record);
        self.align_net_with_difference(&mut record);
        self.check_percentage(&mut record);

        self.derive(&mut record);
        self.enforce_invariants(&mut record);

        for field in record.missing_fields() {
            record.events.push(ExtractionEvent::new(
                field,
                EventKind::Missing,
                "no strategy matched",
                0.0,
            ));
        }

        record.confidence_score = self.confidence_score(&record);
        record.completeness = completeness(&record);
        record
    }

    fn merge(&self, sources: &SourceCandidates, record: &mut PayslipRecord) {
        for field in Field::ALL {
            let mut winner: Option<&FieldMatch> = None;

            for candidate in sources.by_priority().into_iter().filter_map(|s| s.get(&field)) {
                match winner {
                    None => {
                        apply(record, candidate);
                        record.events.push(
                            ExtractionEvent::new(
                                field,
                                EventKind::Extracted,
                                &candidate.description,
                                candidate.weight,
                            )
                            .with_value(render(&candidate.value)),
                        );
                        winner = Some(candidate);
                    }
                    Some(won) if !same_value(&won.value, &candidate.value) => {
                        record.events.push(
                            ExtractionEvent::new(
                                field,
                                EventKind::Superseded,
                                &candidate.description,
                                candidate.weight,
                            )
                            .with_value(render(&candidate.value)),
                        );
                    }
                    Some(_) => {}
                }
            }
        }
    }

    /// Rule 1: deductions above income means the two were read transposed.
    fn swap_transposed_totals(&self, record: &mut PayslipRecord) {
        let (Some(income), Some(deductions)) = (record.jumlah_pendapatan, record.jumlah_potongan)
        else {
            return;
        };
        if deductions <= income {
            return;
        }

        warn!(income, deductions, "deductions exceed income, swapping");
        record.jumlah_pendapatan = Some(deductions);
        record.jumlah_potongan = Some(income);
        record.confidence.swap(Field::JumlahPendapatan, Field::JumlahPotongan);
        self.repaired(record, Field::JumlahPendapatan, "swapped with deductions (transposed read)", deductions, None);
        self.repaired(record, Field::JumlahPotongan, "swapped with income (transposed read)", income, None);
    }

    /// Rule 2: net/basic ratio out of range, rebuild net from the percentage.
    fn recompute_implausible_net(&self, record: &mut PayslipRecord) {
        let (Some(basic), Some(net), Some(pct)) =
            (record.gaji_pokok, record.gaji_bersih, record.peratus_gaji_bersih)
        else {
            return;
        };
        let ratio = net / basic;
        if (self.config.ratio_min..=self.config.ratio_max).contains(&ratio)
            || pct <= self.config.min_trusted_percentage
        {
            return;
        }

        let recomputed = round2(pct / 100.0 * basic);
        if !self.bounds.is_plausible_amount(recomputed) {
            return;
        }
        warn!(ratio, net, recomputed, "net/basic ratio implausible, recomputing net from percentage");
        record.gaji_bersih = Some(recomputed);
        self.repaired(
            record,
            Field::GajiBersih,
            "recomputed from percentage and basic salary (implausible net/basic ratio)",
            recomputed,
            Some(self.config.derived_weight),
        );
    }

    /// Rule 3: basic salary far above gross income means the two were swapped.
    fn swap_basic_and_gross(&self, record: &mut PayslipRecord) {
        let (Some(basic), Some(income)) = (record.gaji_pokok, record.jumlah_pendapatan) else {
            return;
        };
        if income >= basic || basic / income <= self.config.swap_ratio {
            return;
        }

        warn!(basic, income, "basic salary exceeds gross income, swapping");
        record.gaji_pokok = Some(income);
        record.jumlah_pendapatan = Some(basic);
        record.confidence.swap(Field::GajiPokok, Field::JumlahPendapatan);
        self.repaired(record, Field::GajiPokok, "swapped with gross income", income, None);
        self.repaired(record, Field::JumlahPendapatan, "swapped with basic salary", basic, None);
    }

    /// Rule 4: net salary must agree with income minus deductions.
    fn align_net_with_difference(&self, record: &mut PayslipRecord) {
        let (Some(income), Some(deductions), Some(net)) =
            (record.jumlah_pendapatan, record.jumlah_potongan, record.gaji_bersih)
        else {
            return;
        };
        let difference = round2(income - deductions);
        if (difference - net).abs() <= self.config.net_tolerance * net {
            return;
        }
        if difference <= 0.0 || !self.bounds.is_plausible_amount(difference) {
            return;
        }

        warn!(net, difference, "net salary disagrees with income minus deductions");
        record.gaji_bersih = Some(difference);
        self.repaired(
            record,
            Field::GajiBersih,
            "replaced by income minus deductions",
            difference,
            Some(self.config.derived_weight),
        );
    }

    /// Rule 5: a printed percentage is kept unless it is itself out of range.
    fn check_percentage(&self, record: &mut PayslipRecord) {
        let (Some(basic), Some(net), Some(pct)) =
            (record.gaji_pokok, record.gaji_bersih, record.peratus_gaji_bersih)
        else {
            return;
        };
        let recomputed = round2(net / basic * 100.0);
        if (recomputed - pct).abs() <= self.config.percentage_tolerance {
            return;
        }

        if (0.0..=100.0).contains(&pct) {
            debug!(pct, recomputed, "percentage differs from recomputed value, keeping printed");
            record.events.push(
                ExtractionEvent::new(
                    Field::PeratusGajiBersih,
                    EventKind::Discrepancy,
                    format!("printed percentage kept; recomputed from net/basic is {recomputed:.2}"),
                    record.confidence.get(Field::PeratusGajiBersih).unwrap_or(0.0) / 100.0,
                )
                .with_value(format!("{pct:.2}")),
            );
        } else {
            let replacement = recomputed.clamp(0.0, 100.0);
            warn!(pct, replacement, "percentage out of range, replacing with recomputed");
            record.peratus_gaji_bersih = Some(replacement);
            self.repaired(
                record,
                Field::PeratusGajiBersih,
                "replaced out-of-range percentage with net/basic",
                replacement,
                Some(self.config.derived_weight),
            );
        }
    }

    /// Fill null fields from their arithmetic relationships.
    fn derive(&self, record: &mut PayslipRecord) {
        if record.gaji_bersih.is_none() {
            if let (Some(income), Some(deductions)) = (record.jumlah_pendapatan, record.jumlah_potongan) {
                let net = round2(income - deductions);
                if net > 0.0 && self.bounds.is_plausible_amount(net) {
                    self.derived(record, Field::GajiBersih, "income minus deductions", net);
                } else {
                    record.events.push(
                        ExtractionEvent::new(
                            Field::GajiBersih,
                            EventKind::Discrepancy,
                            "income minus deductions not a plausible net salary, derivation skipped",
                            0.0,
                        )
                        .with_value(format!("{net:.2}")),
                    );
                }
            }
        }

        if record.gaji_bersih.is_none() {
            if let (Some(pct), Some(basic)) = (record.peratus_gaji_bersih, record.gaji_pokok) {
                let net = round2(pct / 100.0 * basic);
                if self.bounds.is_plausible_amount(net) {
                    self.derived(record, Field::GajiBersih, "percentage of basic salary", net);
                }
            }
        }

        if record.peratus_gaji_bersih.is_none() {
            if let (Some(net), Some(basic)) = (record.gaji_bersih, record.gaji_pokok) {
                let pct = net / basic * 100.0;
                if pct <= 100.0 {
                    let pct = round2(pct.clamp(0.0, 100.0));
                    self.derived(record, Field::PeratusGajiBersih, "net salary over basic salary", pct);
                }
            }
        }

        if record.gaji_pokok.is_none() {
            if let (Some(net), Some(pct)) = (record.gaji_bersih, record.peratus_gaji_bersih) {
                if pct > 0.0 {
                    let basic = round2(net / (pct / 100.0));
                    if self.bounds.is_plausible_amount(basic) {
                        self.derived(record, Field::GajiPokok, "net salary over percentage", basic);
                    }
                }
            }
        }
    }

    /// Null out anything that still violates the record invariants.
    fn enforce_invariants(&self, record: &mut PayslipRecord) {
        for field in Field::ALL.into_iter().filter(|f| f.is_numeric()) {
            let Some(value) = record.amount(field) else {
                continue;
            };
            let valid = if field == Field::PeratusGajiBersih {
                (0.0..=100.0).contains(&value)
            } else {
                self.bounds.is_plausible_amount(value)
            };
            if !valid {
                warn!(%field, value, "value violates record invariants, dropping");
                record.set_amount(field, None);
                record.confidence.remove(field);
                record.events.push(
                    ExtractionEvent::new(field, EventKind::Repaired, "dropped out-of-range value", 0.0)
                        .with_value(format!("{value:.2}")),
                );
            }
        }
    }

    fn derived(&self, record: &mut PayslipRecord, field: Field, how: &str, value: f64) {
        debug!(%field, value, how, "derived field");
        record.set_amount(field, Some(value));
        record.confidence.set(field, self.config.derived_weight);
        record.events.push(
            ExtractionEvent::new(field, EventKind::Derived, how, self.config.derived_weight)
                .with_value(format!("{value:.2}")),
        );
    }

    /// Log a repair; `weight` replaces the field's confidence when given.
    fn repaired(
        &self,
        record: &mut PayslipRecord,
        field: Field,
        action: &str,
        value: f64,
        weight: Option<f64>,
    ) {
        if let Some(weight) = weight {
            record.confidence.set(field, weight);
        }
        let weight = record.confidence.get(field).map(|s| s / 100.0).unwrap_or(0.0);
        record.events.push(
            ExtractionEvent::new(field, EventKind::Repaired, action, weight)
                .with_value(format!("{value:.2}")),
        );
    }

    /// Importance-weighted mean of the per-field confidences.
    fn confidence_score(&self, record: &PayslipRecord) -> f64 {
        if record.confidence.is_empty() {
            let has_key_value = [
                Field::Nama,
                Field::PeratusGajiBersih,
                Field::GajiBersih,
                Field::GajiPokok,
            ]
            .into_iter()
            .any(|f| record.has(f));
            return if has_key_value {
                self.config.baseline_confidence
            } else {
                0.0
            };
        }

        let (weighted, total) = record
            .confidence
            .iter()
            .fold((0.0, 0.0), |(weighted, total), (field, score)| {
                let w = importance(field);
                (weighted + w * score, total + w)
            });
        (weighted / total * 10.0).round() / 10.0
    }
}

fn importance(field: Field) -> f64 {
    match field {
        Field::PeratusGajiBersih => 3.0,
        Field::GajiBersih | Field::GajiPokok => 2.0,
        Field::JumlahPendapatan | Field::JumlahPotongan => 1.5,
        Field::Nama => 1.0,
        Field::NoGaji | Field::Bulan => 0.5,
    }
}

/// Share of the key fields that were determined, as a percentage.
pub fn completeness(record: &PayslipRecord) -> f64 {
    let present = Field::COMPLETENESS.iter().filter(|f| record.has(**f)).count();
    present as f64 / Field::COMPLETENESS.len() as f64 * 100.0
}

fn apply(record: &mut PayslipRecord, candidate: &FieldMatch) {
    match &candidate.value {
        FieldValue::Number(n) => record.set_amount(candidate.field, Some(round2(*n))),
        FieldValue::Text(s) => record.set_text(candidate.field, Some(s.clone())),
    }
    record.confidence.set(candidate.field, candidate.weight);
}

fn same_value(a: &FieldValue, b: &FieldValue) -> bool {
    match (a, b) {
        (FieldValue::Number(x), FieldValue::Number(y)) => (x - y).abs() < 0.005,
        (FieldValue::Text(x), FieldValue::Text(y)) => x == y,
        _ => false,
    }
}

fn render(value: &FieldValue) -> String {
    match value {
        FieldValue::Number(n) => format!("{n:.2}"),
        FieldValue::Text(s) => s.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn number(field: Field, value: f64, weight: f64) -> (Field, FieldMatch) {
        (
            field,
            FieldMatch {
                field,
                value: FieldValue::Number(value),
                description: format!("test {field}"),
                weight,
            },
        )
    }

    fn reconcile(sources: &SourceCandidates) -> PayslipRecord {
        let config = ReconcileConfig::default();
        let bounds = ExtractionConfig::default();
        Reconciler::new(&config, &bounds).reconcile(sources)
    }

    #[test]
    fn test_priority_and_superseded_events() {
        let sources = SourceCandidates {
            table: Candidates::from([number(Field::GajiPokok, 4672.76, 0.95)]),
            pattern: Candidates::from([
                number(Field::GajiPokok, 4600.00, 0.95),
                number(Field::JumlahPendapatan, 5982.76, 0.95),
            ]),
            table_sums: Candidates::from([number(Field::JumlahPendapatan, 5900.00, 0.7)]),
            ..Default::default()
        };

        let record = reconcile(&sources);
        assert_eq!(record.gaji_pokok, Some(4672.76));
        assert_eq!(record.jumlah_pendapatan, Some(5982.76));
        assert_eq!(record.events_of(EventKind::Superseded).count(), 2);
        assert_eq!(record.confidence.get(Field::GajiPokok), Some(95.0));
    }

    #[test]
    fn test_swaps_transposed_totals() {
        let sources = SourceCandidates {
            summary: Candidates::from([
                number(Field::JumlahPendapatan, 368.30, 0.9),
                number(Field::JumlahPotongan, 4213.61, 0.85),
            ]),
            ..Default::default()
        };

        let record = reconcile(&sources);
        assert_eq!(record.jumlah_pendapatan, Some(4213.61));
        assert_eq!(record.jumlah_potongan, Some(368.30));
        assert_eq!(record.confidence.get(Field::JumlahPendapatan), Some(85.0));
        assert_eq!(record.gaji_bersih, Some(3845.31));
        assert_eq!(record.events_of(EventKind::Repaired).count(), 2);
    }

    #[test]
    fn test_recomputes_net_from_percentage_when_ratio_implausible() {
        let sources = SourceCandidates {
            pattern: Candidates::from([
                number(Field::GajiPokok, 4000.00, 0.95),
                number(Field::GajiBersih, 40.00, 0.95),
                number(Field::PeratusGajiBersih, 55.00, 0.95),
            ]),
            ..Default::default()
        };

        let record = reconcile(&sources);
        assert_eq!(record.gaji_bersih, Some(2200.00));
        assert_eq!(record.confidence.get(Field::GajiBersih), Some(60.0));
    }

    #[test]
    fn test_swaps_basic_and_gross() {
        let sources = SourceCandidates {
            pattern: Candidates::from([
                number(Field::GajiPokok, 5982.76, 0.95),
                number(Field::JumlahPendapatan, 1200.00, 0.95),
            ]),
            ..Default::default()
        };

        let record = reconcile(&sources);
        assert_eq!(record.gaji_pokok, Some(1200.00));
        assert_eq!(record.jumlah_pendapatan, Some(5982.76));
    }

    #[test]
    fn test_net_aligned_with_difference() {
        let sources = SourceCandidates {
            summary: Candidates::from([
                number(Field::JumlahPendapatan, 5982.76, 0.9),
                number(Field::JumlahPotongan, 3277.40, 0.9),
                number(Field::GajiBersih, 3705.36, 0.9),
            ]),
            ..Default::default()
        };

        let record = reconcile(&sources);
        assert_eq!(record.gaji_bersih, Some(2705.36));
    }

    #[test]
    fn test_printed_percentage_kept_with_discrepancy() {
        let sources = SourceCandidates {
            summary: Candidates::from([
                number(Field::GajiBersih, 2705.36, 0.9),
                number(Field::PeratusGajiBersih, 45.22, 0.9),
            ]),
            table: Candidates::from([number(Field::GajiPokok, 4672.76, 0.95)]),
            ..Default::default()
        };

        let record = reconcile(&sources);
        assert_eq!(record.peratus_gaji_bersih, Some(45.22));
        assert_eq!(record.events_of(EventKind::Discrepancy).count(), 1);
    }

    #[test]
    fn test_out_of_range_percentage_replaced() {
        let sources = SourceCandidates {
            pattern: Candidates::from([
                number(Field::GajiPokok, 4000.00, 0.95),
                number(Field::GajiBersih, 2000.00, 0.95),
                number(Field::PeratusGajiBersih, 145.00, 0.95),
            ]),
            ..Default::default()
        };

        let record = reconcile(&sources);
        assert_eq!(record.gaji_bersih, Some(2000.00));
        assert_eq!(record.peratus_gaji_bersih, Some(50.0));
        assert_eq!(record.confidence.get(Field::PeratusGajiBersih), Some(60.0));

        let repairs: Vec<_> = record
            .events_of(EventKind::Repaired)
            .filter(|e| e.field == Field::PeratusGajiBersih)
            .collect();
        assert_eq!(repairs.len(), 1);
        assert_eq!(repairs[0].value.as_deref(), Some("50.00"));
        assert_eq!(record.events_of(EventKind::Discrepancy).count(), 0);
    }

    #[test]
    fn test_replacement_percentage_is_clamped() {
        let sources = SourceCandidates {
            pattern: Candidates::from([
                number(Field::GajiPokok, 1000.00, 0.95),
                number(Field::GajiBersih, 1200.00, 0.95),
                number(Field::PeratusGajiBersih, -5.00, 0.95),
            ]),
            ..Default::default()
        };

        let record = reconcile(&sources);
        assert_eq!(record.peratus_gaji_bersih, Some(100.0));
        assert_eq!(
            record
                .events_of(EventKind::Repaired)
                .filter(|e| e.field == Field::PeratusGajiBersih)
                .count(),
            1
        );
    }

    #[test]
    fn test_derivations_fill_gaps() {
        let sources = SourceCandidates {
            pattern: Candidates::from([
                number(Field::GajiBersih, 2000.00, 0.95),
                number(Field::PeratusGajiBersih, 50.00, 0.95),
            ]),
            ..Default::default()
        };

        let record = reconcile(&sources);
        assert_eq!(record.gaji_pokok, Some(4000.00));
        assert_eq!(record.events_of(EventKind::Derived).count(), 1);
        assert_eq!(record.completeness, 75.0);
    }

    #[test]
    fn test_negative_difference_is_not_derived() {
        let sources = SourceCandidates {
            pattern: Candidates::from([
                number(Field::JumlahPendapatan, 3000.00, 0.95),
                number(Field::JumlahPotongan, 3000.00, 0.95),
            ]),
            ..Default::default()
        };

        let record = reconcile(&sources);
        assert_eq!(record.gaji_bersih, None);
        assert!(record
            .events_of(EventKind::Discrepancy)
            .any(|e| e.field == Field::GajiBersih));
    }

    #[test]
    fn test_confidence_score() {
        let sources = SourceCandidates {
            pattern: Candidates::from([
                number(Field::GajiBersih, 2705.36, 1.0),
                number(Field::JumlahPotongan, 3277.40, 0.5),
            ]),
            ..Default::default()
        };

        let record = reconcile(&sources);
        // (2 * 100 + 1.5 * 50) / 3.5
        assert_eq!(record.confidence_score, 78.6);
    }

    #[test]
    fn test_empty_sources() {
        let record = reconcile(&SourceCandidates::default());
        assert_eq!(record.confidence_score, 0.0);
        assert_eq!(record.completeness, 0.0);
        assert_eq!(record.events_of(EventKind::Missing).count(), Field::ALL.len());
    }
}
