//! Pixel/rem conversion with fixed four-decimal precision.

const PRECISION: f64 = 10_000.0;

/// Converts a pixel length to rem against `base_font_size`.
///
/// Anything that is not a pixel length (`100%`, `1.2`, `2rem`) is returned
/// unchanged, as is every input when the base size is not a positive number.
pub fn px_to_rem(length: &str, base_font_size: f64) -> String {
    if !(base_font_size.is_finite() && base_font_size > 0.0) {
        return length.to_string();
    }
    match parse_length(length) {
        Some((value, "px")) => format!("{}rem", format_number(value / base_font_size)),
        _ => length.to_string(),
    }
}

/// Converts a rem length back to pixels. Returns `None` for any other shape.
pub fn rem_to_px(length: &str, base_font_size: f64) -> Option<String> {
    if !(base_font_size.is_finite() && base_font_size > 0.0) {
        return None;
    }
    match parse_length(length) {
        Some((value, "rem")) => Some(format!("{}px", format_number(value * base_font_size))),
        _ => None,
    }
}

/// Formats a number rounded to four decimals without trailing zeros.
pub fn format_number(value: f64) -> String {
    let rounded = (value * PRECISION).round() / PRECISION;
    let text = format!("{:.4}", rounded);
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Splits a numeric-looking value into its number text and unit suffix.
///
/// The unit may be empty (`700`, `1.5`) and otherwise consists of ASCII
/// letters or a single `%`.
pub(crate) fn split_numeric(raw: &str) -> Option<(&str, &str)> {
    let value = raw.trim();
    let body_start = usize::from(value.starts_with(['-', '+']));
    let split_idx = value[body_start..]
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit() && *ch != '.')
        .map(|(idx, _)| idx + body_start)
        .unwrap_or(value.len());
    let number = &value[..split_idx];
    let digits = &number[body_start..];
    if !digits.chars().any(|ch| ch.is_ascii_digit()) || digits.matches('.').count() > 1 {
        return None;
    }
    let unit = &value[split_idx..];
    let unit_ok = unit == "%" || unit.chars().all(|ch| ch.is_ascii_alphabetic());
    if !unit_ok {
        return None;
    }
    Some((number, unit))
}

/// Parses a length into its numeric value and unit.
pub(crate) fn parse_length(raw: &str) -> Option<(f64, &str)> {
    let (number, unit) = split_numeric(raw)?;
    let value = number.parse::<f64>().ok()?;
    value.is_finite().then_some((value, unit))
}
