use once_cell::sync::Lazy;
use regex::Regex;

static AGE_COMPONENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(weeks?|wks?|w\b|months?|mths?|mos?|years?|yrs?|days?)")
        .expect("static regex")
});

const WEEKS_PER_MONTH: f64 = 52.0 / 12.0;

/// Age in weeks from free text such as "8 weeks", "3 months" or
/// "1 year 6 months". Components are summed.
pub fn parse_age_weeks(raw: &str) -> Option<f64> {
    let mut total = 0.0;
    let mut matched = false;

    for caps in AGE_COMPONENT.captures_iter(raw) {
        let Ok(n) = caps[1].parse::<f64>() else {
            continue;
        };
        let unit = caps[2].to_lowercase();
        let weeks = if unit.starts_with('w') {
            n
        } else if unit.starts_with('m') {
            n * WEEKS_PER_MONTH
        } else if unit.starts_with('y') {
            n * 52.0
        } else {
            n / 7.0
        };
        total += weeks;
        matched = true;
    }

    matched.then_some(total)
}
