//! Projection of raw spreadsheet rows onto (identifier, amount) pairs

use bigdecimal::{BigDecimal, RoundingMode};
use std::str::FromStr;

use crate::types::*;

/// Fraction digits used when comparing and displaying amounts
pub const AMOUNT_SCALE: i64 = 2;

/// Round an amount to displayed precision
pub fn round_amount(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(AMOUNT_SCALE, RoundingMode::HalfUp)
}

/// Project a raw record onto its canonical identifier and amount.
///
/// A column name of `None` yields the default for that field (empty
/// identifier, zero amount), which allows identifier-only or amount-only
/// projections.
pub fn normalize(
    record: &LedgerRecord,
    identifier_column: Option<&str>,
    amount_column: Option<&str>,
) -> NormalizedView {
    let identifier = identifier_column
        .and_then(|column| record.raw_fields.get(column))
        .map(normalize_identifier)
        .unwrap_or_default();

    let amount = amount_column
        .and_then(|column| record.raw_fields.get(column))
        .map(parse_amount)
        .unwrap_or_else(|| BigDecimal::from(0));

    NormalizedView {
        identifier,
        amount,
        original_ref: record.record_id,
    }
}

/// Normalize a record with the columns the mapping assigns to its source
pub fn normalize_with(record: &LedgerRecord, mapping: &ColumnMapping) -> NormalizedView {
    normalize(
        record,
        mapping.identifier_column(record.source),
        mapping.amount_column(record.source),
    )
}

/// Identifier-only projection, used for grouping by counterparty
pub fn identifier_of(record: &LedgerRecord, mapping: &ColumnMapping) -> String {
    normalize(record, mapping.identifier_column(record.source), None).identifier
}

/// Amount-only projection
pub fn amount_of(record: &LedgerRecord, mapping: &ColumnMapping) -> BigDecimal {
    normalize(record, None, mapping.amount_column(record.source)).amount
}

/// Strip everything but ASCII letters and digits and uppercase the rest
pub fn normalize_identifier(value: &RawValue) -> String {
    let text = match value {
        RawValue::Text(text) => text.clone(),
        RawValue::Number(number) => format_number(*number),
        RawValue::Date(date) => date.format("%Y%m%d").to_string(),
    };
    text.trim()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Parse a cell into an amount; anything unparsable becomes zero
pub fn parse_amount(value: &RawValue) -> BigDecimal {
    let parsed = match value {
        RawValue::Number(number) if number.is_finite() => {
            BigDecimal::from_str(&number.to_string()).ok()
        }
        RawValue::Number(_) | RawValue::Date(_) => None,
        RawValue::Text(text) => parse_amount_text(text),
    };
    parsed.unwrap_or_else(|| {
        if !value.is_blank() {
            tracing::debug!(value = ?value, "Unparsable amount, treating as zero");
        }
        BigDecimal::from(0)
    })
}

/// Longest run of letters accepted as a currency code on either side
const MAX_CURRENCY_CODE_LEN: usize = 3;

fn is_currency_mark(c: char) -> bool {
    c.is_whitespace() || c.is_ascii_alphabetic() || matches!(c, '$' | '€' | '£' | '¥')
}

/// Trim currency symbols, codes and whitespace from both ends
fn strip_currency(text: &str) -> Option<&str> {
    let rest = text.trim_start_matches(is_currency_mark);
    let prefix = &text[..text.len() - rest.len()];
    let body = rest.trim_end_matches(is_currency_mark);
    let suffix = &rest[body.len()..];

    let letters = |s: &str| s.chars().filter(char::is_ascii_alphabetic).count();
    if letters(prefix) > MAX_CURRENCY_CODE_LEN || letters(suffix) > MAX_CURRENCY_CODE_LEN {
        return None;
    }
    Some(body)
}

/// Parse a locale-formatted decimal string.
///
/// Currency symbols, currency codes of up to three letters and whitespace
/// around the number are discarded. A single sign marker is then accepted: a
/// leading or trailing minus, or surrounding parentheses. What remains may
/// only hold digits, separators and whitespace; anything else, or a second
/// sign marker, makes the text unparsable.
///
/// When both `,` and `.` appear, the one occurring last separates the
/// fraction. A separator that appears more than once groups thousands. A lone
/// separator is the fraction separator.
pub fn parse_amount_text(text: &str) -> Option<BigDecimal> {
    let mut body = strip_currency(text)?;
    let mut negative = false;
    loop {
        let unsigned = body
            .strip_prefix('-')
            .or_else(|| body.strip_suffix('-'))
            .or_else(|| body.strip_prefix('(').and_then(|b| b.strip_suffix(')')));
        match unsigned {
            Some(_) if negative => return None,
            Some(rest) => {
                negative = true;
                body = strip_currency(rest)?;
            }
            None => break,
        }
    }

    let kept: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if !kept.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.')
        || !kept.chars().any(|c| c.is_ascii_digit())
    {
        return None;
    }

    let fraction_separator = match (kept.rfind(','), kept.rfind('.')) {
        (Some(comma), Some(dot)) => Some(if comma > dot { ',' } else { '.' }),
        (Some(_), None) if kept.matches(',').count() == 1 => Some(','),
        (None, Some(_)) if kept.matches('.').count() == 1 => Some('.'),
        _ => None,
    };

    let canonical: String = kept
        .chars()
        .filter_map(|c| match c {
            d if d.is_ascii_digit() => Some(d),
            s if Some(s) == fraction_separator => Some('.'),
            _ => None,
        })
        .collect();

    let amount = BigDecimal::from_str(&canonical).ok()?;
    Some(if negative { -amount } else { amount })
}

fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(cells: &[(&str, RawValue)]) -> LedgerRecord {
        let raw = cells.iter().cloned().collect::<RawRecord>();
        LedgerRecord::new(SourceSystem::TaxAuthority, 0, raw)
    }

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_identifier_is_stripped_and_uppercased() {
        let rec = record(&[("CUIT", " 20-12345678-9 ".into()), ("Ref", "ab-12".into())]);
        assert_eq!(normalize(&rec, Some("CUIT"), None).identifier, "20123456789");
        assert_eq!(normalize(&rec, Some("Ref"), None).identifier, "AB12");
    }

    #[test]
    fn test_numeric_identifier_has_no_fraction() {
        let rec = record(&[("CUIT", RawValue::Number(20123456789.0))]);
        assert_eq!(normalize(&rec, Some("CUIT"), None).identifier, "20123456789");
    }

    #[test]
    fn test_missing_columns_default() {
        let rec = record(&[("CUIT", "30-1".into()), ("Monto", "10".into())]);
        let view = normalize(&rec, None, None);
        assert_eq!(view.identifier, "");
        assert_eq!(view.amount, BigDecimal::from(0));

        let view = normalize(&rec, Some("Nope"), Some("Nope"));
        assert_eq!(view.identifier, "");
        assert_eq!(view.amount, BigDecimal::from(0));
        assert_eq!(view.original_ref, rec.record_id);
    }

    #[test]
    fn test_partial_projection() {
        let rec = record(&[("CUIT", "30-1".into()), ("Monto", "10".into())]);
        let id_only = normalize(&rec, Some("CUIT"), None);
        assert_eq!(id_only.identifier, "301");
        assert_eq!(id_only.amount, BigDecimal::from(0));

        let amount_only = normalize(&rec, None, Some("Monto"));
        assert_eq!(amount_only.identifier, "");
        assert_eq!(amount_only.amount, BigDecimal::from(10));
    }

    #[test]
    fn test_numeric_amount_used_directly() {
        assert_eq!(parse_amount(&RawValue::Number(1234.5)), dec("1234.5"));
        assert_eq!(parse_amount(&RawValue::Number(f64::NAN)), BigDecimal::from(0));
    }

    #[test]
    fn test_locale_formatted_amounts() {
        assert_eq!(parse_amount_text("$ 1.234,56"), Some(dec("1234.56")));
        assert_eq!(parse_amount_text("1,234.56 USD"), Some(dec("1234.56")));
        assert_eq!(parse_amount_text("100,5"), Some(dec("100.5")));
        assert_eq!(parse_amount_text("100.5"), Some(dec("100.5")));
        assert_eq!(parse_amount_text("1.234.567"), Some(dec("1234567")));
        assert_eq!(parse_amount_text("-$ 50,00"), Some(dec("-50")));
        assert_eq!(parse_amount_text("(75.25)"), Some(dec("-75.25")));
        assert_eq!(parse_amount_text("1 234,56"), Some(dec("1234.56")));
    }

    #[test]
    fn test_sign_after_currency_symbol() {
        assert_eq!(parse_amount_text("$ -50,00"), Some(dec("-50")));
        assert_eq!(parse_amount_text("ARS -1.234,56"), Some(dec("-1234.56")));
        assert_eq!(parse_amount_text("$ (1.000,00)"), Some(dec("-1000")));
        assert_eq!(parse_amount_text("50,00 $-"), Some(dec("-50")));
        assert_eq!(
            parse_amount(&RawValue::from("$ -1.234,56")),
            dec("-1234.56")
        );
    }

    #[test]
    fn test_text_with_digits_can_still_be_unparsable() {
        assert_eq!(parse_amount_text("2024-03-01"), None);
        assert_eq!(parse_amount_text("1e3"), None);
        assert_eq!(parse_amount_text("--5"), None);
        assert_eq!(parse_amount_text("(-5)"), None);
        assert_eq!(parse_amount_text("Total 150"), None);
        assert_eq!(parse_amount_text("12/03"), None);

        for text in ["2024-03-01", "1e3", "--5"] {
            assert_eq!(parse_amount(&RawValue::from(text)), BigDecimal::from(0));
        }
    }

    #[test]
    fn test_unparsable_amount_is_zero() {
        assert_eq!(parse_amount(&RawValue::from("n/a")), BigDecimal::from(0));
        assert_eq!(parse_amount(&RawValue::empty()), BigDecimal::from(0));
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(parse_amount(&RawValue::Date(date)), BigDecimal::from(0));
    }

    #[test]
    fn test_round_amount_to_cents() {
        assert_eq!(round_amount(&dec("100.004")), dec("100.00"));
        assert_eq!(round_amount(&dec("100.005")), dec("100.01"));
        assert_eq!(round_amount(&dec("-3.333")), dec("-3.33"));
    }
}
