//! Numeric parsing for prices, counts and ratings.

/// Parse a number after stripping currency symbols, thousands separators and
/// whitespace. `None` on anything that is still not a finite number.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches("GBP")
        .trim_end_matches("GBP")
        .chars()
        .filter(|c| !matches!(c, '£' | '$' | '€' | ',') && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a whole-number count; fractional values are rejected.
pub fn parse_count(raw: &str) -> Option<i64> {
    let value = parse_number(raw)?;
    if value.fract() != 0.0 || value.abs() > i64::MAX as f64 {
        return None;
    }
    Some(value as i64)
}

/// Median of a sample, `None` when empty. NaNs are never passed in.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_currency_and_separators() {
        assert_eq!(parse_number("£1,200"), Some(1200.0));
        assert_eq!(parse_number(" $ 950.50 "), Some(950.5));
        assert_eq!(parse_number("GBP 800"), Some(800.0));
        assert_eq!(parse_number("750GBP"), Some(750.0));
    }

    #[test]
    fn unparseable_is_null() {
        assert_eq!(parse_number("POA"), None);
        assert_eq!(parse_number("£"), None);
        assert_eq!(parse_number("£500 each"), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn counts_must_be_whole() {
        assert_eq!(parse_count("4"), Some(4));
        assert_eq!(parse_count("4.0"), Some(4));
        assert_eq!(parse_count("2.5"), None);
        assert_eq!(parse_count("2026"), Some(2026));
    }

    #[test]
    fn median_handles_even_and_odd() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
    }
}
