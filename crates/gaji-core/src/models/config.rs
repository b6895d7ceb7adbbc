//! Configuration structures for the extraction pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GajiError, Result};

use super::eligibility::InstitutionRule;

/// Main configuration for the gaji pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GajiConfig {
    /// Field extraction configuration.
    pub extraction: ExtractionConfig,

    /// Reconciliation thresholds.
    pub reconcile: ReconcileConfig,

    /// Institution eligibility rules.
    pub institutions: Vec<InstitutionRule>,
}

/// Field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Amounts must be strictly greater than this (RM).
    pub min_amount: f64,

    /// Amounts must not exceed this (RM).
    pub max_amount: f64,

    /// Lines scanned after the first stacked summary label for the others.
    pub label_window: usize,

    /// Lines scanned after the stacked labels for the colon run.
    pub value_window: usize,

    /// Lines scanned after a lone label for its value.
    pub split_line_window: usize,

    /// Largest input accepted by callers before invoking the engine.
    pub max_input_bytes: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_amount: 0.0,
            max_amount: 100_000.0,
            label_window: 5,
            value_window: 10,
            split_line_window: 3,
            max_input_bytes: 1024 * 1024,
        }
    }
}

impl ExtractionConfig {
    /// Whether an amount lies in the plausible monetary range.
    pub fn is_plausible_amount(&self, value: f64) -> bool {
        value.is_finite() && value > self.min_amount && value <= self.max_amount
    }
}

/// Thresholds used when merging, repairing and scoring a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Lowest plausible net/basic salary ratio.
    pub ratio_min: f64,

    /// Highest plausible net/basic salary ratio.
    pub ratio_max: f64,

    /// A percentage must exceed this to be used for recomputing net salary.
    pub min_trusted_percentage: f64,

    /// Basic salary over gross income ratio that marks a transposed read.
    pub swap_ratio: f64,

    /// Allowed relative gap between net salary and income minus deductions.
    pub net_tolerance: f64,

    /// Allowed gap (points) between printed and recomputed percentage.
    pub percentage_tolerance: f64,

    /// Confidence weight given to derived values (0.0 - 1.0).
    pub derived_weight: f64,

    /// Overall score when values exist but none carries a confidence.
    pub baseline_confidence: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            ratio_min: 0.2,
            ratio_max: 1.5,
            min_trusted_percentage: 20.0,
            swap_ratio: 2.0,
            net_tolerance: 0.10,
            percentage_tolerance: 10.0,
            derived_weight: 0.6,
            baseline_confidence: 50.0,
        }
    }
}

impl GajiConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| GajiError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| GajiError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject thresholds the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        let extraction = &self.extraction;
        if extraction.min_amount >= extraction.max_amount {
            return Err(GajiError::Config(format!(
                "extraction.min_amount ({}) must be below extraction.max_amount ({})",
                extraction.min_amount, extraction.max_amount
            )));
        }

        let reconcile = &self.reconcile;
        if reconcile.ratio_min > reconcile.ratio_max {
            return Err(GajiError::Config(format!(
                "reconcile.ratio_min ({}) must not exceed reconcile.ratio_max ({})",
                reconcile.ratio_min, reconcile.ratio_max
            )));
        }
        if !(reconcile.derived_weight > 0.0 && reconcile.derived_weight <= 1.0) {
            return Err(GajiError::Config(format!(
                "reconcile.derived_weight ({}) must be in (0, 1]",
                reconcile.derived_weight
            )));
        }

        Ok(())
    }
}
