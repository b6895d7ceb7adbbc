//! Payslip record model and its extraction audit trail.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A field recovered from a payslip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Employee name.
    Nama,
    /// Employee/salary number.
    NoGaji,
    /// Pay month.
    Bulan,
    /// Basic salary.
    GajiPokok,
    /// Gross income.
    JumlahPendapatan,
    /// Total deductions.
    JumlahPotongan,
    /// Net salary.
    GajiBersih,
    /// Printed net-salary percentage.
    PeratusGajiBersih,
}

/// How a field's raw match is cleaned and validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Upper-cased, whitespace-normalized person name.
    Name,
    /// Alphanumeric-only identifier.
    Identifier,
    /// Upper-cased month label.
    Month,
    /// Monetary amount in RM.
    Amount,
    /// Percentage in [0, 100].
    Percentage,
}

impl Field {
    /// Every field, in record order.
    pub const ALL: [Field; 8] = [
        Field::Nama,
        Field::NoGaji,
        Field::Bulan,
        Field::GajiPokok,
        Field::JumlahPendapatan,
        Field::JumlahPotongan,
        Field::GajiBersih,
        Field::PeratusGajiBersih,
    ];

    /// Fields counted by the completeness score.
    pub const COMPLETENESS: [Field; 4] = [
        Field::GajiBersih,
        Field::PeratusGajiBersih,
        Field::GajiPokok,
        Field::Nama,
    ];

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::Nama => FieldKind::Name,
            Field::NoGaji => FieldKind::Identifier,
            Field::Bulan => FieldKind::Month,
            Field::GajiPokok
            | Field::JumlahPendapatan
            | Field::JumlahPotongan
            | Field::GajiBersih => FieldKind::Amount,
            Field::PeratusGajiBersih => FieldKind::Percentage,
        }
    }

    /// Whether the field holds a number rather than text.
    pub fn is_numeric(&self) -> bool {
        matches!(self.kind(), FieldKind::Amount | FieldKind::Percentage)
    }

    /// Snake-case field name as used in serialized records.
    pub fn name(&self) -> &'static str {
        match self {
            Field::Nama => "nama",
            Field::NoGaji => "no_gaji",
            Field::Bulan => "bulan",
            Field::GajiPokok => "gaji_pokok",
            Field::JumlahPendapatan => "jumlah_pendapatan",
            Field::JumlahPotongan => "jumlah_potongan",
            Field::GajiBersih => "gaji_bersih",
            Field::PeratusGajiBersih => "peratus_gaji_bersih",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What an audit event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The winning extracted value for a field.
    Extracted,
    /// A lower-priority source disagreed with the winner.
    Superseded,
    /// Value computed from other fields.
    Derived,
    /// Value changed by a consistency repair.
    Repaired,
    /// Inconsistency noticed but left in place.
    Discrepancy,
    /// No source produced the field.
    Missing,
}

/// One entry of the append-only extraction audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionEvent {
    /// Field the event concerns.
    pub field: Field,

    /// Event category.
    pub kind: EventKind,

    /// Human-readable strategy or action description.
    pub strategy: String,

    /// Confidence weight of the strategy (0.0 - 1.0).
    pub weight: f64,

    /// Value involved, rendered as text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ExtractionEvent {
    pub fn new(field: Field, kind: EventKind, strategy: impl Into<String>, weight: f64) -> Self {
        Self {
            field,
            kind,
            strategy: strategy.into(),
            weight,
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Winning confidence per field, as a score from 0 to 100.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldConfidence(BTreeMap<Field, f64>);

impl FieldConfidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a strategy weight (0.0 - 1.0) as the field's score.
    pub fn set(&mut self, field: Field, weight: f64) {
        let score = (weight.clamp(0.0, 1.0) * 1000.0).round() / 10.0;
        self.0.insert(field, score);
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        self.0.get(&field).copied()
    }

    pub fn remove(&mut self, field: Field) -> Option<f64> {
        self.0.remove(&field)
    }

    /// Exchange the scores of two fields whose values were swapped.
    pub fn swap(&mut self, a: Field, b: Field) {
        let score_a = self.0.remove(&a);
        let score_b = self.0.remove(&b);
        if let Some(score) = score_a {
            self.0.insert(b, score);
        }
        if let Some(score) = score_b {
            self.0.insert(a, score);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, f64)> + '_ {
        self.0.iter().map(|(field, score)| (*field, *score))
    }
}

/// A structured payslip recovered from one text input.
///
/// Numeric fields are `None` when they could not be determined; zero is
/// never used as a placeholder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayslipRecord {
    /// Employee name.
    pub nama: Option<String>,

    /// Employee/salary number.
    pub no_gaji: Option<String>,

    /// Pay month as printed (e.g. "JANUARI 2024").
    pub bulan: Option<String>,

    /// Basic salary.
    pub gaji_pokok: Option<f64>,

    /// Gross income.
    pub jumlah_pendapatan: Option<f64>,

    /// Total deductions.
    pub jumlah_potongan: Option<f64>,

    /// Net salary.
    pub gaji_bersih: Option<f64>,

    /// Net-salary percentage (0 - 100).
    pub peratus_gaji_bersih: Option<f64>,

    /// Extraction audit trail.
    pub events: Vec<ExtractionEvent>,

    /// Per-field confidence of the winning source.
    pub confidence: FieldConfidence,

    /// Overall confidence score (0 - 100).
    pub confidence_score: f64,

    /// Percentage of key fields that were determined (0 - 100).
    pub completeness: f64,
}

impl PayslipRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Numeric value of an amount or percentage field.
    pub fn amount(&self, field: Field) -> Option<f64> {
        match field {
            Field::GajiPokok => self.gaji_pokok,
            Field::JumlahPendapatan => self.jumlah_pendapatan,
            Field::JumlahPotongan => self.jumlah_potongan,
            Field::GajiBersih => self.gaji_bersih,
            Field::PeratusGajiBersih => self.peratus_gaji_bersih,
            Field::Nama | Field::NoGaji | Field::Bulan => None,
        }
    }

    /// Set an amount or percentage field. Text fields are ignored.
    pub fn set_amount(&mut self, field: Field, value: Option<f64>) {
        match field {
            Field::GajiPokok => self.gaji_pokok = value,
            Field::JumlahPendapatan => self.jumlah_pendapatan = value,
            Field::JumlahPotongan => self.jumlah_potongan = value,
            Field::GajiBersih => self.gaji_bersih = value,
            Field::PeratusGajiBersih => self.peratus_gaji_bersih = value,
            Field::Nama | Field::NoGaji | Field::Bulan => {}
        }
    }

    /// Text value of a name, identifier or month field.
    pub fn text(&self, field: Field) -> Option<&str> {
        match field {
            Field::Nama => self.nama.as_deref(),
            Field::NoGaji => self.no_gaji.as_deref(),
            Field::Bulan => self.bulan.as_deref(),
            _ => None,
        }
    }

    /// Set a text field. Numeric fields are ignored.
    pub fn set_text(&mut self, field: Field, value: Option<String>) {
        match field {
            Field::Nama => self.nama = value,
            Field::NoGaji => self.no_gaji = value,
            Field::Bulan => self.bulan = value,
            _ => {}
        }
    }

    /// Whether a field has been determined.
    pub fn has(&self, field: Field) -> bool {
        if field.is_numeric() {
            self.amount(field).is_some()
        } else {
            self.text(field).is_some()
        }
    }

    /// Fields that are still undetermined.
    pub fn missing_fields(&self) -> Vec<Field> {
        Field::ALL.into_iter().filter(|f| !self.has(*f)).collect()
    }

    /// Events of a given kind.
    pub fn events_of(&self, kind: EventKind) -> impl Iterator<Item = &ExtractionEvent> {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    /// First day of the pay month, parsed from `bulan`.
    pub fn pay_period(&self) -> Option<NaiveDate> {
        self.bulan.as_deref().and_then(parse_pay_month)
    }
}

/// Parse a pay month such as "JANUARI 2024", "Jan 2024" or "01/2024".
pub fn parse_pay_month(s: &str) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();
    let year: i32 = s
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| part.len() == 4)
        .last()?
        .parse()
        .ok()?;

    let month = month_from_name(&s).or_else(|| {
        s.split(|c: char| !c.is_ascii_digit())
            .find(|part| !part.is_empty() && part.len() <= 2)
            .and_then(|part| part.parse::<u32>().ok())
    })?;

    NaiveDate::from_ymd_opt(year, month, 1)
}

fn month_from_name(s: &str) -> Option<u32> {
    // Malay and English names; three-letter prefixes cover both spellings.
    const MONTHS: [(&str, u32); 15] = [
        ("jan", 1),
        ("feb", 2),
        ("mac", 3),
        ("mar", 3),
        ("apr", 4),
        ("mei", 5),
        ("may", 5),
        ("jun", 6),
        ("jul", 7),
        ("ogo", 8),
        ("aug", 8),
        ("sep", 9),
        ("okt", 10),
        ("oct", 10),
        ("nov", 11),
    ];

    let word = s.split_whitespace().find(|w| w.chars().all(char::is_alphabetic))?;
    if word.starts_with("dis") || word.starts_with("dec") {
        return Some(12);
    }
    MONTHS
        .iter()
        .find(|(prefix, _)| word.starts_with(prefix))
        .map(|(_, month)| *month)
}

/// One row of an income or deduction table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Four-digit item code.
    pub code: String,

    /// Item description as printed.
    pub description: String,

    /// Amount in RM.
    pub amount: f64,
}
