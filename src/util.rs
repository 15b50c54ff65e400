// Cell-level parsing and formatting shared by the loader and the exports.
//
// The extracts come out of a Norwegian locale export, so numbers use a
// decimal comma and dates appear in more than one layout.
use chrono::{NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

/// Parse a decimal-comma value (`"12,5"`) into `f64`.
///
/// - Accepts `Option<&str>` so callers can pass through optional fields.
/// - Trims whitespace and drops inner spaces used as thousands separators.
/// - Accepts a decimal point as well, since some exports mix the two.
/// - Rejects alphabetic content (`"nan"`, `"n/a"`) and non-finite results.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_decimal(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    // Dates arrive as `YYYY-MM-DD`, sometimes with a midnight timestamp
    // appended by the database export, and occasionally in display format.
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| NaiveDate::parse_from_str(s, "%d.%m.%Y"))
        .ok()
}

/// Trimmed, non-empty text or `None`.
pub fn clean_text(s: Option<&str>) -> Option<String> {
    let s = s?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Sortable integer for a quarter label, built by stripping every separator:
/// `"2024-1"` and `"2024-Q1"` both become `20241`.
pub fn quarter_sort_key(label: &str) -> Option<u32> {
    let digits: String = label.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u32>().ok()
}

/// Round to a fixed number of decimals. Non-finite input has no value.
pub fn round_to(value: f64, decimals: i32) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    let factor = 10f64.powi(decimals);
    Some((value * factor).round() / factor)
}

pub fn round_opt(value: Option<f64>, decimals: i32) -> Option<f64> {
    value.and_then(|v| round_to(v, decimals))
}

/// Display format used on the date axis (`15.01.2024`).
pub fn display_date(d: NaiveDate) -> String {
    d.format("%d.%m.%Y").to_string()
}

pub fn iso_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

/// Format an optional number for a decimal-comma CSV cell; `None` is empty.
pub fn decimal_comma(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string().replace('.', ","),
        None => String::new(),
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thin wrapper around `num-format` for integer-like values. This is used
    // for counts in console messages (e.g., `9,855 rows loaded`).
    n.to_formatted_string(&Locale::en)
}
