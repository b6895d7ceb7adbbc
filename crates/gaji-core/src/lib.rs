//! Core library for Malaysian government payslip processing.
//!
//! This crate provides:
//! - Text normalization for OCR/PDF-extracted payslip text
//! - Multi-strategy field extraction (labelled patterns, summary blocks, itemized tables)
//! - Cross-field reconciliation that repairs transposed or inconsistent reads
//! - Per-institution loan eligibility evaluation on the net-salary percentage

pub mod eligibility;
pub mod error;
pub mod models;
pub mod payslip;

pub use eligibility::{evaluate, EligibilityEvaluator};
pub use error::{ExtractionError, GajiError, Result};
pub use models::config::GajiConfig;
pub use models::eligibility::{EligibilityResult, InstitutionRule};
pub use models::payslip::{
    EventKind, ExtractionEvent, Field, FieldConfidence, FieldKind, LineItem, PayslipRecord,
};
pub use payslip::{
    analyze, ExtractionResult, PatternTable, PayslipAnalysis, PayslipExtractor, PayslipParser,
};
