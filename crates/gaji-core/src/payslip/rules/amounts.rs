//! Ringgit amount and percentage parsing.

/// Regex fragment capturing an amount with optional "RM" prefix.
///
/// Grouped forms are tried before bare digits so "3,277.40" is not cut at
/// the comma and "3.277,40" is not cut at the dot. A decimal comma must be
/// followed by a word boundary, which keeps "3,277" out of that branch.
pub const AMOUNT: &str = concat!(
    r"(?:RM\s*)?(",
    r"\d{1,3}(?:\.\d{3})+,\d{2}\b",
    r"|\d{1,3}(?:,\d{3})+(?:\.\d{1,2})?",
    r"|\d+,\d{2}\b",
    r"|\d+(?:\.\d{1,2})?",
    r")"
);

/// Regex fragment capturing a percentage figure.
///
/// The whole numeric token is captured so that "3,277.40" or "1000" are
/// rejected by validation instead of being read as "3" or "100".
pub const PERCENT: &str = r"(\d[\d,.]*)\s*%?";

/// Parse a ringgit amount (e.g. "RM 3,277.40", "3277.40", "3.277,40").
pub fn parse_amount(s: &str) -> Option<f64> {
    let s = s.trim();
    let s = strip_currency(s);

    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        // Both present: whichever comes last is the decimal separator
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        // Lone comma followed by exactly two digits reads as a decimal comma
        (Some(c), None) if cleaned.len() - c == 3 && cleaned.matches(',').count() == 1 => {
            cleaned.replace(',', ".")
        }
        (Some(_), None) => cleaned.replace(',', ""),
        // Several dots: a trailing three-digit group is still thousands
        (None, Some(d)) if cleaned.matches('.').count() > 1 => {
            if cleaned.len() - d == 4 {
                cleaned.replace('.', "")
            } else {
                let (int_part, frac) = cleaned.split_at(d);
                format!("{}{}", int_part.replace('.', ""), frac)
            }
        }
        _ => cleaned,
    };

    normalized.parse().ok()
}

/// Parse a percentage, ignoring a trailing "%" sign.
///
/// A single decimal comma ("45,22") is accepted. Any other comma means the
/// token is an amount, not a percentage.
pub fn parse_percentage(s: &str) -> Option<f64> {
    let s = s.trim().trim_end_matches('%').trim().trim_end_matches(['.', ',']);
    let s = match s.split_once(',') {
        None => s.to_string(),
        Some((int_part, frac))
            if !frac.is_empty()
                && frac.len() <= 2
                && frac.chars().all(|c| c.is_ascii_digit())
                && !int_part.contains('.') =>
        {
            format!("{}.{}", int_part, frac)
        }
        Some(_) => return None,
    };
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn strip_currency(s: &str) -> &str {
    let upper = s.get(..2).map(|p| p.eq_ignore_ascii_case("rm")).unwrap_or(false);
    if upper { s[2..].trim_start() } else { s }
}

/// Format an amount with thousands separators (3,277.40).
pub fn format_amount(amount: f64) -> String {
    let s = format!("{:.2}", amount.abs());
    let (integer_part, decimal_part) = s.split_once('.').unwrap_or((&s, "00"));

    let chars: Vec<char> = integer_part.chars().collect();
    let mut formatted = String::new();
    if amount < 0.0 {
        formatted.push('-');
    }
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(*c);
    }

    format!("{}.{}", formatted, decimal_part)
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
