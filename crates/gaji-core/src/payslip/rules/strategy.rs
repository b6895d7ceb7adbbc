//! Ordered "first valid match wins" strategy chains.

use regex::Regex;
use tracing::{debug, trace};

use crate::error::ExtractionError;
use crate::models::config::ExtractionConfig;
use crate::models::payslip::{Field, FieldKind};
use crate::payslip::normalize::{collapse_whitespace, NormalizedText};
use crate::payslip::Result;

use super::amounts::{parse_amount, parse_percentage};
use super::patterns::COLON_LINE;

/// How a strategy locates raw value text.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Regex over the normalized text; the value is capture group 1.
    Text(Regex),
    /// Label alone on a line, value on one of the following lines.
    ///
    /// Colon-only lines between the two are skipped.
    SplitLine { label: Regex, value: Regex },
}

/// One extraction technique for a field.
#[derive(Debug, Clone)]
pub struct Strategy {
    matcher: Matcher,
    description: String,
    weight: f64,
}

impl Strategy {
    /// Strategy matching `pattern` against the whole normalized text.
    pub fn text(pattern: &str, description: impl Into<String>, weight: f64) -> Result<Self> {
        Self::build(Matcher::Text(Regex::new(pattern)?), description.into(), weight)
    }

    /// Strategy for a label line followed by a value line.
    pub fn split_line(
        label: &str,
        value: &str,
        description: impl Into<String>,
        weight: f64,
    ) -> Result<Self> {
        let matcher = Matcher::SplitLine {
            label: Regex::new(label)?,
            value: Regex::new(value)?,
        };
        Self::build(matcher, description.into(), weight)
    }

    fn build(matcher: Matcher, description: String, weight: f64) -> Result<Self> {
        if !(weight > 0.0 && weight <= 1.0) {
            return Err(ExtractionError::Validation {
                field: description,
                reason: format!("weight {} outside (0, 1]", weight),
            });
        }
        if let Matcher::Text(re) = &matcher {
            if re.captures_len() < 2 {
                return Err(ExtractionError::Validation {
                    field: description,
                    reason: "pattern has no capture group".to_string(),
                });
            }
        }
        Ok(Self {
            matcher,
            description,
            weight,
        })
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Raw candidate values in document order.
    fn candidates<'t>(&self, text: &'t NormalizedText, window: usize) -> Vec<&'t str> {
        match &self.matcher {
            Matcher::Text(re) => re
                .captures_iter(text.text())
                .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
                .collect(),
            Matcher::SplitLine { label, value } => {
                let lines = text.lines();
                let mut found = Vec::new();

                for (i, line) in lines.iter().enumerate() {
                    if !label.is_match(line) {
                        continue;
                    }
                    for next in lines.iter().skip(i + 1).take(window) {
                        if COLON_LINE.is_match(next) {
                            continue;
                        }
                        if let Some(m) = value.captures(next).and_then(|caps| caps.get(1)) {
                            found.push(m.as_str());
                        }
                        break;
                    }
                }

                found
            }
        }
    }
}

/// A cleaned and validated field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Number(_) => None,
        }
    }
}

/// The winning match of a strategy chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch {
    pub field: Field,
    pub value: FieldValue,
    pub description: String,
    pub weight: f64,
}

/// Ordered strategies for one field.
#[derive(Debug, Clone)]
pub struct StrategyChain {
    field: Field,
    strategies: Vec<Strategy>,
}

impl StrategyChain {
    pub fn new(field: Field) -> Self {
        Self {
            field,
            strategies: Vec::new(),
        }
    }

    pub fn field(&self) -> Field {
        self.field
    }

    /// Append a strategy with the lowest priority so far.
    pub fn push(&mut self, strategy: Strategy) {
        self.strategies.push(strategy);
    }

    pub fn with(mut self, strategy: Strategy) -> Self {
        self.push(strategy);
        self
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Try strategies in order; the first candidate passing validation wins.
    pub fn resolve(&self, text: &NormalizedText, config: &ExtractionConfig) -> Option<FieldMatch> {
        for strategy in &self.strategies {
            for raw in strategy.candidates(text, config.split_line_window) {
                match clean_value(self.field, raw, config) {
                    Some(value) => {
                        debug!(
                            field = %self.field,
                            strategy = strategy.description(),
                            "strategy matched"
                        );
                        return Some(FieldMatch {
                            field: self.field,
                            value,
                            description: strategy.description.clone(),
                            weight: strategy.weight,
                        });
                    }
                    None => trace!(field = %self.field, raw, "candidate rejected"),
                }
            }
        }
        None
    }
}

/// Post-process a raw match and apply field-specific validation.
pub fn clean_value(field: Field, raw: &str, config: &ExtractionConfig) -> Option<FieldValue> {
    match field.kind() {
        FieldKind::Amount => parse_amount(raw)
            .filter(|v| config.is_plausible_amount(*v))
            .map(FieldValue::Number),
        FieldKind::Percentage => parse_percentage(raw)
            .filter(|v| (0.0..=100.0).contains(v))
            .map(FieldValue::Number),
        FieldKind::Name => {
            let name = collapse_whitespace(raw)
                .trim_matches(|c: char| !c.is_alphanumeric() && c != ')')
                .to_uppercase();
            (name.chars().filter(|c| c.is_alphabetic()).count() >= 2).then_some(FieldValue::Text(name))
        }
        FieldKind::Identifier => {
            let id: String = raw
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_uppercase();
            (id.chars().any(|c| c.is_ascii_digit())).then_some(FieldValue::Text(id))
        }
        FieldKind::Month => {
            let month = collapse_whitespace(raw).to_uppercase();
            (!month.is_empty()).then_some(FieldValue::Text(month))
        }
    }
}
