//! Payslip field extraction module.

pub mod normalize;
mod parser;
pub mod reconcile;
pub mod rules;

pub use parser::{analyze, ExtractionResult, PayslipAnalysis, PayslipParser};
pub use rules::PatternTable;

use crate::error::ExtractionError;

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Trait for payslip field extractors.
pub trait PayslipExtractor {
    /// Extract a reconciled payslip from plain text.
    fn extract(&self, text: &str) -> Result<ExtractionResult>;
}
