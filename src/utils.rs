use crate::error::{AnalyticsError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Percentage change between two period values.
///
/// A zero previous value never divides: no activity on either side is `0`,
/// new positive activity is `100`. Anything else is the plain relative change.
pub fn percentage_change(current: f64, previous: f64) -> f64 {
    let current = finite_or_zero(current);
    let previous = finite_or_zero(previous);

    if previous == 0.0 {
        return if current > 0.0 { 100.0 } else { 0.0 };
    }

    finite_or_zero((current - previous) / previous * 100.0)
}

/// `numerator / denominator`, or `0.0` when the denominator is zero.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    finite_or_zero(numerator / denominator)
}

/// Share of `part` in `whole` as a percentage, `0.0` when `whole` is zero.
pub fn share_pct(part: f64, whole: f64) -> f64 {
    safe_ratio(part, whole) * 100.0
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    safe_ratio(values.iter().sum(), values.len() as f64)
}

pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Decimal form of a monetary amount, with binary floating-point noise dropped
/// (`0.1` becomes exactly `0.1`). Non-finite or out-of-range amounts are zero.
///
/// Every money total is accumulated in this form so that the result does not
/// depend on the order records arrive in.
pub fn to_money(amount: f64) -> Decimal {
    Decimal::from_f64(finite_or_zero(amount)).unwrap_or(Decimal::ZERO)
}

/// Nearest `f64` to a decimal money value, correctly rounded.
pub fn money_to_f64(value: Decimal) -> f64 {
    value
        .to_string()
        .parse::<f64>()
        .map(finite_or_zero)
        .unwrap_or(0.0)
}

/// Rounds to a fixed number of decimal places, e.g. `round_to(88.888, 1) == 88.9`.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    finite_or_zero((value * factor).round() / factor)
}

/// Whole days from `start` to `end`, clamped at zero for out-of-order dates.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days().max(0)
}

/// Parses a calendar date as stored by the record source.
///
/// Accepts `YYYY-MM-DD`, an RFC 3339 timestamp, or a naive `YYYY-MM-DDTHH:MM:SS`
/// timestamp; for timestamps only the date part is kept.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(timestamp.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(timestamp.date());
        }
    }

    Err(AnalyticsError::DateError(format!(
        "Invalid date '{}'. Expected YYYY-MM-DD or an ISO 8601 timestamp",
        value
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_change_zero_previous() {
        assert_eq!(percentage_change(0.0, 0.0), 0.0);
        assert_eq!(percentage_change(500.0, 0.0), 100.0);
        assert_eq!(percentage_change(0.01, 0.0), 100.0);
        assert_eq!(percentage_change(-20.0, 0.0), 0.0);
    }

    #[test]
    fn test_percentage_change_regular() {
        assert_eq!(percentage_change(300.0, 100.0), 200.0);
        assert_eq!(percentage_change(50.0, 100.0), -50.0);
        assert_eq!(percentage_change(0.0, 80.0), -100.0);
        // Negative baselines keep the literal formula
        assert_eq!(percentage_change(-50.0, -100.0), -50.0);
    }

    #[test]
    fn test_percentage_change_never_produces_nan() {
        assert_eq!(percentage_change(f64::NAN, 10.0), -100.0);
        assert_eq!(percentage_change(f64::INFINITY, 0.0), 0.0);
        assert!(percentage_change(f64::MAX, 1e-300).is_finite());
    }

    #[test]
    fn test_safe_ratio_and_share() {
        assert_eq!(safe_ratio(3.0, 0.0), 0.0);
        assert_eq!(safe_ratio(1.0, 4.0), 0.25);
        assert_eq!(share_pct(50.0, 0.0), 0.0);
        assert_eq!(share_pct(50.0, 200.0), 25.0);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[1.0, 2.0, 6.0]), 3.0);
    }

    #[test]
    fn test_money_sums_ignore_order() {
        let amounts = [0.1, 0.2, 0.3, 19.99, 1250.75];
        let forward = amounts.iter().fold(Decimal::ZERO, |acc, &a| acc + to_money(a));
        let reverse = amounts.iter().rev().fold(Decimal::ZERO, |acc, &a| acc + to_money(a));

        assert_eq!(forward, reverse);
        assert_eq!(money_to_f64(forward), 1271.34);
        assert_eq!(money_to_f64(to_money(0.1) + to_money(0.2)), 0.3);
    }

    #[test]
    fn test_money_rejects_non_finite() {
        assert_eq!(to_money(f64::NAN), Decimal::ZERO);
        assert_eq!(to_money(f64::INFINITY), Decimal::ZERO);
        assert_eq!(to_money(1e300), Decimal::ZERO);
        assert_eq!(to_money(-42.5), Decimal::new(-425, 1));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(88.8888, 1), 88.9);
        assert_eq!(round_to(11.1111, 1), 11.1);
        assert_eq!(round_to(2.0, 2), 2.0);
    }

    #[test]
    fn test_days_between_clamps_negative() {
        let issued = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let paid = NaiveDate::from_ymd_opt(2024, 2, 9).unwrap();
        assert_eq!(days_between(issued, paid), 30);
        assert_eq!(days_between(paid, issued), 0);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(parse_date("2024-03-05").unwrap(), expected);
        assert_eq!(parse_date(" 2024-03-05 ").unwrap(), expected);
        assert_eq!(parse_date("2024-03-05T10:15:00Z").unwrap(), expected);
        assert_eq!(parse_date("2024-03-05T10:15:00+02:00").unwrap(), expected);
        assert_eq!(parse_date("2024-03-05T10:15:00.123").unwrap(), expected);
        assert!(parse_date("March 5th").is_err());
        assert!(parse_date("").is_err());
    }
}
