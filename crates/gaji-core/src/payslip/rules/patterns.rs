//! Built-in strategy table for Malaysian government payslips.

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::payslip::Field;
use crate::payslip::Result;

use super::amounts::{AMOUNT, PERCENT};
use super::strategy::{Strategy, StrategyChain};
use super::summary::SummaryPatterns;
use super::table::SectionPatterns;

lazy_static! {
    // Line-shape classifiers shared by the block and table scanners
    pub static ref COLON_LINE: Regex = Regex::new(r"^[:=](?:\s*[:=])*$").unwrap();

    pub static ref NUMERIC_LINE: Regex = Regex::new(
        r"^(?i:RM)?\s*(\d{1,3}(?:\.\d{3})+,\d{2}|\d{1,3}(?:,\d{3})+(?:\.\d{1,2})?|\d+,\d{2}|\d+(?:\.\d{1,2})?)\s*%?$"
    ).unwrap();

    pub static ref FOOTNOTE_LINE: Regex = Regex::new(
        r"(?i)^(?:\*.*|\(.*\)|rm|-+|muka\s*(?:surat)?\s*\d.*|page\s*\d.*|nota\b.*)$"
    ).unwrap();
}

/// Separator between an inline label and its value; never crosses a line.
const SEP: &str = r"[ \t]*[:=]?[ \t]*";

const MONTHS: &str = "januari|februari|mac|april|mei|jun|julai|ogos|september|oktober|november|disember|january|february|march|may|june|july|august|october|december";

/// Immutable strategy configuration handed to the parser.
///
/// Build once and share; nothing in the table is mutated during
/// extraction, so one table can serve concurrent parses.
#[derive(Debug, Clone)]
pub struct PatternTable {
    chains: Vec<StrategyChain>,
    pub(crate) summary: SummaryPatterns,
    pub(crate) sections: SectionPatterns,
}

impl PatternTable {
    /// The built-in strategies, highest confidence first.
    pub fn standard() -> Result<Self> {
        let chains = vec![
            name_chain()?,
            id_chain()?,
            month_chain()?,
            basic_salary_chain()?,
            gross_income_chain()?,
            deductions_chain()?,
            net_salary_chain()?,
            percentage_chain()?,
        ];

        Ok(Self {
            chains,
            summary: SummaryPatterns::standard()?,
            sections: SectionPatterns::standard()?,
        })
    }

    /// Append a strategy for a field, after the existing ones.
    pub fn push(&mut self, field: Field, strategy: Strategy) {
        match self.chains.iter_mut().find(|c| c.field() == field) {
            Some(chain) => chain.push(strategy),
            None => self.chains.push(StrategyChain::new(field).with(strategy)),
        }
    }

    pub fn with(mut self, field: Field, strategy: Strategy) -> Self {
        self.push(field, strategy);
        self
    }

    pub fn chain(&self, field: Field) -> Option<&StrategyChain> {
        self.chains.iter().find(|c| c.field() == field)
    }

    pub fn chains(&self) -> &[StrategyChain] {
        &self.chains
    }
}

fn name_chain() -> Result<StrategyChain> {
    let name = r"([A-Za-z@'./\- ]+?)";
    Ok(StrategyChain::new(Field::Nama)
        .with(Strategy::text(
            &format!(r"(?im)^nama(?:\s+pegawai|\s+pekerja)?[ \t]*[:=][ \t]*{name}\s*(?:\bno\.?\s|\bk/?p\b|\bjawatan\b|$)"),
            "Nama label with value",
            0.95,
        )?)
        .with(Strategy::text(
            &format!(r"(?im)\b(?:employee\s+)?name[ \t]*[:=][ \t]*{name}\s*(?:\bemployee\b|\bno\.?\s|\bic\b|$)"),
            "English name label",
            0.85,
        )?)
        .with(Strategy::split_line(
            r"(?i)^nama(?:\s+pegawai|\s+pekerja)?\s*:?$",
            r"^:?\s*([A-Za-z@'./\- ]{3,})$",
            "Nama label with name on next line",
            0.7,
        )?))
}

fn id_chain() -> Result<StrategyChain> {
    let id = r"([A-Za-z0-9][A-Za-z0-9\-/]{3,19})";
    Ok(StrategyChain::new(Field::NoGaji)
        .with(Strategy::text(
            &format!(r"(?i)\bno\.?\s*gaji{SEP}{id}"),
            "No. Gaji label with value",
            0.95,
        )?)
        .with(Strategy::text(
            &format!(r"(?i)\b(?:no\.?\s*pekerja|employee\s*(?:no|id|number)\.?){SEP}{id}"),
            "employee number label",
            0.85,
        )?)
        .with(Strategy::split_line(
            r"(?i)^no\.?\s*(?:gaji|pekerja)\s*:?$",
            &format!(r"^:?\s*{id}$"),
            "No. Gaji label with number on next line",
            0.7,
        )?))
}

fn month_chain() -> Result<StrategyChain> {
    Ok(StrategyChain::new(Field::Bulan)
        .with(Strategy::text(
            &format!(r"(?i)\bbulan{SEP}((?:{MONTHS})\s*,?\s*\d{{4}})"),
            "Bulan label with month name",
            0.95,
        )?)
        .with(Strategy::text(
            &format!(r"(?i)\bbulan{SEP}(\d{{1,2}}\s*[/\-]\s*\d{{4}})"),
            "Bulan label with numeric month",
            0.85,
        )?)
        .with(Strategy::text(
            &format!(r"(?i)\b(?:pay\s+)?(?:month|period){SEP}((?:{MONTHS})\s*,?\s*\d{{4}})"),
            "English month label",
            0.8,
        )?)
        .with(Strategy::text(
            &format!(r"(?i)\b((?:{MONTHS})\s*,?\s*\d{{4}})\b"),
            "bare month and year",
            0.6,
        )?))
}

fn basic_salary_chain() -> Result<StrategyChain> {
    Ok(StrategyChain::new(Field::GajiPokok)
        .with(Strategy::text(
            &format!(r"(?i)\bgaji\s+pokok{SEP}{AMOUNT}"),
            "Gaji Pokok label with value",
            0.95,
        )?)
        .with(Strategy::text(
            &format!(r"(?i)\bbasic\s+(?:salary|pay){SEP}{AMOUNT}"),
            "Basic Salary label",
            0.85,
        )?)
        .with(Strategy::split_line(
            r"(?i)^(?:\d{4}\s+)?gaji\s+pokok\s*:?$",
            &format!(r"^:?\s*{AMOUNT}$"),
            "Gaji Pokok label with value on next line",
            0.75,
        )?)
        .with(Strategy::text(
            &format!(r"(?i)\bgaji\s+asas{SEP}{AMOUNT}"),
            "Gaji Asas synonym",
            0.6,
        )?))
}

fn gross_income_chain() -> Result<StrategyChain> {
    Ok(StrategyChain::new(Field::JumlahPendapatan)
        .with(Strategy::text(
            &format!(r"(?i)\bjumlah\s+pendapatan{SEP}{AMOUNT}"),
            "Jumlah Pendapatan label with value",
            0.95,
        )?)
        .with(Strategy::text(
            &format!(r"(?i)\b(?:pendapatan|gaji)\s+kasar{SEP}{AMOUNT}"),
            "Pendapatan Kasar synonym",
            0.85,
        )?)
        .with(Strategy::text(
            &format!(r"(?i)\b(?:gross\s+(?:income|pay|salary|earnings)|total\s+(?:income|earnings)){SEP}{AMOUNT}"),
            "English gross income label",
            0.85,
        )?)
        .with(Strategy::split_line(
            r"(?i)^jumlah\s+pendapatan\s*:?$",
            &format!(r"^:?\s*{AMOUNT}$"),
            "Jumlah Pendapatan label with value on next line",
            0.7,
        )?))
}

fn deductions_chain() -> Result<StrategyChain> {
    Ok(StrategyChain::new(Field::JumlahPotongan)
        .with(Strategy::text(
            &format!(r"(?i)\bjumlah\s+potongan{SEP}{AMOUNT}"),
            "Jumlah Potongan label with value",
            0.95,
        )?)
        .with(Strategy::text(
            &format!(r"(?i)\btotal\s+deductions?{SEP}{AMOUNT}"),
            "English total deductions label",
            0.85,
        )?)
        .with(Strategy::split_line(
            r"(?i)^jumlah\s+potongan\s*:?$",
            &format!(r"^:?\s*{AMOUNT}$"),
            "Jumlah Potongan label with value on next line",
            0.7,
        )?))
}

fn net_salary_chain() -> Result<StrategyChain> {
    // Anchored to a line start or a preceding figure so that the
    // "Peratus Gaji Bersih" label never yields a net salary.
    Ok(StrategyChain::new(Field::GajiBersih)
        .with(Strategy::text(
            &format!(r"(?im)(?:^|\d\s)(?:jumlah\s+)?gaji\s+bersih{SEP}{AMOUNT}"),
            "Gaji Bersih label with value",
            0.95,
        )?)
        .with(Strategy::text(
            &format!(r"(?i)\bnet\s+(?:salary|pay|income){SEP}{AMOUNT}"),
            "English net salary label",
            0.85,
        )?)
        .with(Strategy::text(
            &format!(r"(?i)\b(?:pendapatan|gaji)\s+bersih\s+(?:bulanan|diterima){SEP}{AMOUNT}"),
            "Gaji Bersih variant wording",
            0.8,
        )?)
        .with(Strategy::split_line(
            r"(?i)^(?:jumlah\s+)?gaji\s+bersih\s*:?$",
            &format!(r"^:?\s*{AMOUNT}$"),
            "Gaji Bersih label with value on next line",
            0.7,
        )?))
}

fn percentage_chain() -> Result<StrategyChain> {
    Ok(StrategyChain::new(Field::PeratusGajiBersih)
        .with(Strategy::text(
            &format!(r"(?i)%?\s*peratus\s+gaji\s+bersih{SEP}{PERCENT}"),
            "Peratus Gaji Bersih label with value",
            0.95,
        )?)
        .with(Strategy::text(
            &format!(r"(?i)\bperatus{SEP}(\d{{1,3}}(?:\.\d{{1,2}})?)[ \t]*%"),
            "Peratus label with percent sign",
            0.8,
        )?)
        .with(Strategy::text(
            &format!(r"(?i)\bnet\s+(?:salary|pay)\s+(?:percentage|%){SEP}{PERCENT}"),
            "English net salary percentage",
            0.75,
        )?)
        .with(Strategy::split_line(
            r"(?i)^%?\s*peratus(?:\s+gaji\s+bersih)?\s*:?$",
            &format!(r"^:?\s*{PERCENT}$"),
            "Peratus label with value on next line",
            0.7,
        )?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::models::config::ExtractionConfig;
    use crate::payslip::normalize::NormalizedText;
    use crate::payslip::rules::strategy::FieldValue;

    fn resolve(table: &PatternTable, field: Field, text: &str) -> Option<FieldValue> {
        let text = NormalizedText::new(text).unwrap();
        table
            .chain(field)
            .and_then(|c| c.resolve(&text, &ExtractionConfig::default()))
            .map(|m| m.value)
    }

    #[test]
    fn test_line_shapes() {
        assert!(COLON_LINE.is_match(":"));
        assert!(COLON_LINE.is_match(": :"));
        assert!(!COLON_LINE.is_match(": 45.22"));
        assert!(NUMERIC_LINE.is_match("3,277.40"));
        assert!(NUMERIC_LINE.is_match("RM 3,277.40"));
        assert!(NUMERIC_LINE.is_match("45.22%"));
        assert!(NUMERIC_LINE.is_match("3277,40"));
        assert!(NUMERIC_LINE.is_match("3.277,40"));
        assert!(!NUMERIC_LINE.is_match("Gaji 45.22"));
        assert!(FOOTNOTE_LINE.is_match("* Termasuk potongan KWSP"));
        assert!(!FOOTNOTE_LINE.is_match("Gaji Bersih"));
    }

    #[test]
    fn test_header_fields() {
        let table = PatternTable::standard().unwrap();
        let text = "Nama : Ahmad bin Ali No. Gaji : 12345678\nBulan : Januari 2024";

        assert_eq!(
            resolve(&table, Field::Nama, text),
            Some(FieldValue::Text("AHMAD BIN ALI".to_string()))
        );
        assert_eq!(
            resolve(&table, Field::NoGaji, text),
            Some(FieldValue::Text("12345678".to_string()))
        );
        assert_eq!(
            resolve(&table, Field::Bulan, text),
            Some(FieldValue::Text("JANUARI 2024".to_string()))
        );
    }

    #[test]
    fn test_net_salary_ignores_percentage_label() {
        let table = PatternTable::standard().unwrap();
        let text = "% Peratus Gaji Bersih : 45.22\nGaji Bersih : 2,705.36";

        assert_eq!(
            resolve(&table, Field::GajiBersih, text),
            Some(FieldValue::Number(2705.36))
        );
        assert_eq!(
            resolve(&table, Field::PeratusGajiBersih, text),
            Some(FieldValue::Number(45.22))
        );
    }

    #[test]
    fn test_percentage_rejects_amount_tokens() {
        let table = PatternTable::standard().unwrap();

        assert_eq!(
            resolve(&table, Field::PeratusGajiBersih, "Peratus Gaji Bersih : 3,277.40"),
            None
        );
        assert_eq!(
            resolve(&table, Field::PeratusGajiBersih, "Peratus Gaji Bersih : 1000"),
            None
        );
        assert_eq!(
            resolve(&table, Field::PeratusGajiBersih, "Peratus Gaji Bersih\n:\n1000"),
            None
        );
        assert_eq!(
            resolve(&table, Field::PeratusGajiBersih, "Peratus Gaji Bersih : 45,22 %"),
            Some(FieldValue::Number(45.22))
        );
    }

    #[test]
    fn test_decimal_comma_amounts() {
        let table = PatternTable::standard().unwrap();
        let text = "Jumlah Pendapatan : 5982,76\nJumlah Potongan : 3.277,40";

        assert_eq!(
            resolve(&table, Field::JumlahPendapatan, text),
            Some(FieldValue::Number(5982.76))
        );
        assert_eq!(
            resolve(&table, Field::JumlahPotongan, text),
            Some(FieldValue::Number(3277.40))
        );
    }

    #[test]
    fn test_english_synonyms() {
        let table = PatternTable::standard().unwrap();
        let text = "Basic Salary: RM 4,672.76\nGross Pay: RM5,982.76\nTotal Deductions 3,277.40\nNet Pay: 2,705.36";

        assert_eq!(resolve(&table, Field::GajiPokok, text), Some(FieldValue::Number(4672.76)));
        assert_eq!(
            resolve(&table, Field::JumlahPendapatan, text),
            Some(FieldValue::Number(5982.76))
        );
        assert_eq!(
            resolve(&table, Field::JumlahPotongan, text),
            Some(FieldValue::Number(3277.40))
        );
        assert_eq!(resolve(&table, Field::GajiBersih, text), Some(FieldValue::Number(2705.36)));
    }

    #[test]
    fn test_pushed_strategy_runs_last() {
        let table = PatternTable::standard()
            .unwrap()
            .with(
                Field::GajiPokok,
                Strategy::text(&format!(r"(?i)\bpokok\s+bulanan\s*{AMOUNT}"), "custom layout", 0.5)
                    .unwrap(),
            );

        assert_eq!(
            resolve(&table, Field::GajiPokok, "Pokok Bulanan 3,100.00"),
            Some(FieldValue::Number(3100.0))
        );
        let chain = table.chain(Field::GajiPokok).unwrap();
        assert_eq!(chain.strategies().last().unwrap().description(), "custom layout");
    }
}
