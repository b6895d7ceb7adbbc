//! Rule-based field extractors for Malaysian payslips.

pub mod amounts;
pub mod patterns;
pub mod strategy;
pub mod summary;
pub mod table;

use std::collections::BTreeMap;

use crate::models::payslip::Field;

pub use amounts::{format_amount, parse_amount, parse_percentage};
pub use patterns::PatternTable;
pub use strategy::{FieldMatch, FieldValue, Matcher, Strategy, StrategyChain};
pub use summary::{extract_summary, SummaryPatterns};
pub use table::{extract_tables, SectionPatterns, TableExtraction};

/// Per-field results of one extractor.
pub type Candidates = BTreeMap<Field, FieldMatch>;
