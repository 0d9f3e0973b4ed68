// Normalization helpers for numbers and column headers.
//
// This module centralizes all the "dirty" spreadsheet/number handling so the
// rest of the code can assume clean, typed values. Every coercion here is
// total: bad input becomes a default, never an error.
use num_format::{Locale, ToFormattedString};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

const CURRENCY_SYMBOLS: [char; 4] = ['€', '$', '£', '¥'];

/// Any value a numeric cell can hold before coercion.
#[derive(Debug, Clone, Copy)]
pub enum RawNumber<'a> {
    Absent,
    Number(f64),
    Text(&'a str),
}

impl<'a> From<&'a str> for RawNumber<'a> {
    fn from(s: &'a str) -> Self {
        RawNumber::Text(s)
    }
}

impl<'a> From<Option<&'a str>> for RawNumber<'a> {
    fn from(s: Option<&'a str>) -> Self {
        s.map_or(RawNumber::Absent, RawNumber::Text)
    }
}

impl From<f64> for RawNumber<'_> {
    fn from(n: f64) -> Self {
        RawNumber::Number(n)
    }
}

impl<'a> From<&'a serde_json::Value> for RawNumber<'a> {
    fn from(v: &'a serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => RawNumber::Absent,
            serde_json::Value::Number(n) => n.as_f64().map_or(RawNumber::Absent, RawNumber::Number),
            serde_json::Value::String(s) => RawNumber::Text(s),
            // Booleans, arrays and objects carry no number.
            _ => RawNumber::Text(""),
        }
    }
}

impl<'a> From<Option<&'a serde_json::Value>> for RawNumber<'a> {
    fn from(v: Option<&'a serde_json::Value>) -> Self {
        v.map_or(RawNumber::Absent, RawNumber::from)
    }
}

/// Coerce a cell into a finite `f64`, defaulting to `0.0`.
///
/// Accepts both `.` and `,` as decimal separator, space or separator
/// grouping (`"1 234,50 €"` is `1234.5`), and percent or currency
/// decorations (`"12%"` is `12`).
///
/// A single comma followed by exactly three digits, with a nonzero integer
/// part, is read as thousands grouping: `"1,000"` is `1000`. The cost is
/// that a comma-decimal value with three decimals is read the same way, so
/// `"12,500 %"` is `12500`, not `12.5`. Two or fewer decimals (`"12,5"`),
/// four or more (`"1,2345"`), or a zero integer part (`"0,125"`) stay
/// decimals.
pub fn to_number<'a>(raw: impl Into<RawNumber<'a>>) -> f64 {
    match raw.into() {
        RawNumber::Absent => 0.0,
        RawNumber::Number(n) if n.is_finite() => n,
        RawNumber::Number(_) => 0.0,
        RawNumber::Text(s) => parse_text_number(s).unwrap_or(0.0),
    }
}

/// Like [`to_number`], but absent or blank input stays `None` so "no value"
/// is distinguishable from zero.
pub fn to_nullable_number<'a>(raw: impl Into<RawNumber<'a>>) -> Option<f64> {
    match raw.into() {
        RawNumber::Absent => None,
        RawNumber::Text(s) if s.trim().is_empty() => None,
        other => Some(to_number(other)),
    }
}

fn parse_text_number(s: &str) -> Option<f64> {
    let cleaned: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '%' && !CURRENCY_SYMBOLS.contains(c))
        .collect();

    // Separators are only resolved inside the leading numeric span so a
    // suffix like "MAD" cannot change how "1,000" is read.
    let end = cleaned
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, ',' | '.' | '-' | '+')))
        .unwrap_or(cleaned.len());
    let (head, tail) = cleaned.split_at(end);
    let mut normalized = resolve_separators(head);
    normalized.push_str(tail);

    parse_float_prefix(&normalized).filter(|n| n.is_finite())
}

/// Rewrite grouping/decimal separators of a numeric span to plain `1234.5` form.
fn resolve_separators(span: &str) -> String {
    let commas = span.matches(',').count();
    let dots = span.matches('.').count();

    match (commas, dots) {
        (0, 0) => span.to_string(),
        (c, d) if c > 0 && d > 0 => {
            // Whichever comes last is the decimal separator.
            let last_comma = span.rfind(',').unwrap_or(0);
            let last_dot = span.rfind('.').unwrap_or(0);
            if last_comma > last_dot {
                span.replace('.', "").replace(',', ".")
            } else {
                span.replace(',', "")
            }
        }
        (1, 0) if is_comma_grouping(span) => span.replace(',', ""),
        (1, 0) => span.replace(',', "."),
        (_, 0) => span.replace(',', ""),
        (0, 1) => span.to_string(),
        _ => span.replace('.', ""),
    }
}

// A lone comma followed by exactly three digits groups thousands ("1,000"),
// unless the integer part is zero ("0,125").
fn is_comma_grouping(span: &str) -> bool {
    let Some((int_part, frac_part)) = span.split_once(',') else {
        return false;
    };
    let int_digits = int_part.trim_start_matches(['-', '+']);
    frac_part.len() == 3
        && frac_part.chars().all(|c| c.is_ascii_digit())
        && !int_digits.is_empty()
        && int_digits.chars().all(|c| c.is_ascii_digit())
        && int_digits.chars().any(|c| c != '0')
}

/// Parse the longest prefix of `s` that is a decimal floating-point literal.
///
/// Returns `None` when the prefix contains no digit.
fn parse_float_prefix(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut i = 0usize;
    if i < bytes.len() && (bytes[i] == b'-' || bytes[i] == b'+') {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut mantissa_digits = i - int_start;
    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        mantissa_digits += j - frac_start;
        i = j;
    }
    if mantissa_digits == 0 {
        return None;
    }
    // Exponent only counts when at least one digit follows it.
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'-' || bytes[j] == b'+') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    let literal = s[..i].trim_end_matches('.');
    literal.parse::<f64>().ok()
}

/// Map a free-form column label onto the stable header vocabulary.
///
/// `"CA Part du SSF %"` and `"ca_part_du_ssf_pct"` both become
/// `ca_part_du_ssf_pct`. Idempotent.
pub fn canonicalize_header(label: &str) -> String {
    let folded: String = label
        .replace('\u{a0}', " ")
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .replace('%', "pct");

    let mut out = String::with_capacity(folded.len());
    let mut pending_sep = false;
    for c in folded.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Format with French grouping and a fixed number of decimals, as shown on
/// dashboard cards (`1 234,50`).
pub fn format_number(n: f64, decimals: usize) -> String {
    let n = if n.is_finite() { n } else { 0.0 };
    let s = format!("{:.*}", decimals, n.abs());
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s.as_str(), None),
    };
    let int_val: u64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::fr);
    if let Some(frac) = frac_part {
        res.push_str(Locale::fr.decimal());
        res.push_str(frac);
    }
    let is_zero = s.chars().all(|c| c == '0' || c == '.');
    if n.is_sign_negative() && !is_zero {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_mad(n: f64) -> String {
    format!("{} MAD", format_number(n, 2))
}

pub fn format_pct(n: f64) -> String {
    format!("{} %", format_number(n, 2))
}

/// Export rendering: comma decimal separator, no grouping, at most four
/// decimals with trailing zeros dropped (`1234.5` -> `1234,5`).
pub fn format_export_number(n: f64) -> String {
    let n = if n.is_finite() { n } else { 0.0 };
    let s = format!("{:.4}", n);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        return "0".to_string();
    }
    s.replace('.', ",")
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::fr)
}
