//! Unit-aware rendering of metric values
//!
//! Percent metrics are stored as 0-1 fractions. `format_value` multiplies by
//! 100 exactly once; callers must pass the stored value unchanged.

use crate::metrics::value::{MetricValue, Unit};

/// Render a metric for display according to its unit
///
/// - `USD`: en-US currency, grouped, two decimals
/// - `%`: `value * 100` rounded half up (toward +inf) followed by `%`
/// - other units: grouped decimal, at most two fraction digits
/// - no unit: the plain number
pub fn format_value(metric: &MetricValue) -> String {
    match &metric.unit {
        Some(Unit::Usd) => format_currency(metric.value),
        Some(Unit::Percent) => format!("{}%", round_half_up(metric.value * 100.0)),
        Some(Unit::Other(_)) => format_grouped(metric.value, 0, 2),
        None => format_plain(metric.value),
    }
}

/// Halves round toward positive infinity, so `-2.5` becomes `-2`; never `-0`
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor() + 0.0
}

/// `$1,234.50`, `-$0.75`
pub fn format_currency(value: f64) -> String {
    let grouped = format_grouped(value.abs(), 2, 2);
    if value < 0.0 && grouped.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

/// Whole dollars with grouping: `$12,346`
pub fn format_whole_dollars(value: f64) -> String {
    format_currency(value.round()).trim_end_matches(".00").to_string()
}

/// Signed percent change from `base` to `current`, two decimals
///
/// `"0%"` when the base is zero or either side is not a finite number.
pub fn format_percent_change(base: f64, current: f64) -> String {
    if base == 0.0 || !base.is_finite() || !current.is_finite() {
        return "0%".into();
    }
    let mut diff = ((current - base) / base) * 100.0;
    if diff == 0.0 {
        diff = 0.0; // normalise -0.0
    }
    let sign = if diff >= 0.0 { "+" } else { "" };
    format!("{}{:.2}%", sign, diff)
}

/// Axis-friendly abbreviation: `1.2B`, `3.4M`, `5.6K`
pub fn format_compact(value: f64) -> String {
    if value >= 1e9 {
        format!("{:.1}B", value / 1e9)
    } else if value >= 1e6 {
        format!("{:.1}M", value / 1e6)
    } else if value >= 1e3 {
        format!("{:.1}K", value / 1e3)
    } else {
        format_grouped(value, 0, 3)
    }
}

/// Plain number the way a script runtime prints one: no grouping, no
/// trailing `.0` for integers.
pub fn format_plain(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// Grouped decimal with between `min_frac` and `max_frac` fraction digits
pub fn format_grouped(value: f64, min_frac: usize, max_frac: usize) -> String {
    if !value.is_finite() {
        return format!("{}", value);
    }

    let fixed = format!("{:.*}", max_frac, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (fixed.as_str(), ""),
    };

    let mut frac = frac_part.to_string();
    while frac.len() > min_frac && frac.ends_with('0') {
        frac.pop();
    }

    let mut out = group_digits(int_part);
    if !frac.is_empty() {
        out.push('.');
        out.push_str(&frac);
    }

    let is_zero = !out.chars().any(|c| c.is_ascii_digit() && c != '0');
    if value < 0.0 && !is_zero {
        out.insert(0, '-');
    }
    out
}

fn group_digits(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
