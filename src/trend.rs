use crate::schema::{Dimension, TransactionRecord, YearMonth};
use crate::utils::{money_to_f64, safe_ratio};
use chrono::{Days, NaiveDate};
use log::debug;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
    #[schemars(description = "Sum of record amounts in the month")]
    TotalAmount,

    #[schemars(description = "Number of records in the month")]
    RecordCount,

    #[schemars(description = "Number of paid or settled records in the month")]
    PaidCount,

    #[schemars(description = "Amount of paid or settled records in the month")]
    PaidAmount,

    #[schemars(description = "Paid amount over total amount, in [0, 1] for non-negative data")]
    PaymentRate,

    #[schemars(description = "Paid record count over total record count, in [0, 1]")]
    CollectionRate,
}

/// One calendar month of a trailing series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrendPoint {
    pub period: YearMonth,
    pub total_amount: f64,
    pub record_count: usize,
    /// Records that are paid (invoices) or settled (expenses).
    pub paid_count: usize,
    pub paid_amount: f64,
    /// Mean amount per record, `0` for an empty month.
    pub average_amount: f64,
    /// Distinct category labels seen in the month, `"Unknown"` included.
    pub category_count: usize,
}

impl TrendPoint {
    pub fn empty(period: YearMonth) -> Self {
        Self {
            period,
            total_amount: 0.0,
            record_count: 0,
            paid_count: 0,
            paid_amount: 0.0,
            average_amount: 0.0,
            category_count: 0,
        }
    }

    pub fn payment_rate(&self) -> f64 {
        safe_ratio(self.paid_amount, self.total_amount)
    }

    pub fn collection_rate(&self) -> f64 {
        safe_ratio(self.paid_count as f64, self.record_count as f64)
    }

    pub fn metric(&self, metric: TrendMetric) -> f64 {
        match metric {
            TrendMetric::TotalAmount => self.total_amount,
            TrendMetric::RecordCount => self.record_count as f64,
            TrendMetric::PaidCount => self.paid_count as f64,
            TrendMetric::PaidAmount => self.paid_amount,
            TrendMetric::PaymentRate => self.payment_rate(),
            TrendMetric::CollectionRate => self.collection_rate(),
        }
    }
}

#[derive(Default)]
struct MonthAccumulator<'a> {
    total: Decimal,
    paid: Decimal,
    record_count: usize,
    paid_count: usize,
    categories: BTreeSet<&'a str>,
}

impl<'a> MonthAccumulator<'a> {
    fn add(&mut self, record: &'a TransactionRecord) {
        let amount = record.money();
        self.total = self.total.saturating_add(amount);
        self.record_count += 1;
        if record.status.is_settled() {
            self.paid = self.paid.saturating_add(amount);
            self.paid_count += 1;
        }
        self.categories.insert(record.label(Dimension::Category));
    }

    fn into_point(self, period: YearMonth) -> TrendPoint {
        let total_amount = money_to_f64(self.total);
        TrendPoint {
            period,
            total_amount,
            record_count: self.record_count,
            paid_count: self.paid_count,
            paid_amount: money_to_f64(self.paid),
            average_amount: safe_ratio(total_amount, self.record_count as f64),
            category_count: self.categories.len(),
        }
    }
}

/// The `window` calendar months ending at `anchor` (inclusive), oldest first.
pub fn trailing_months(anchor: YearMonth, window: usize) -> Vec<YearMonth> {
    (0..window)
        .rev()
        .filter_map(|back| anchor.offset(-i32::try_from(back).ok()?))
        .collect()
}

/// Buckets records into exactly `window` monthly points ending at `anchor`.
///
/// Months without records are present with zero totals. Records dated outside
/// the window are skipped. Only `occurred_on` decides the bucket.
pub fn generate_trend_series(
    records: &[TransactionRecord],
    window: usize,
    anchor: YearMonth,
) -> Vec<TrendPoint> {
    let mut grid: BTreeMap<YearMonth, MonthAccumulator> = trailing_months(anchor, window)
        .into_iter()
        .map(|month| (month, MonthAccumulator::default()))
        .collect();

    let mut skipped = 0usize;
    for record in records {
        match grid.get_mut(&record.month()) {
            Some(month) => month.add(record),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(
            "Trend ending {}: {} of {} records fall outside the {}-month window",
            anchor,
            skipped,
            records.len(),
            window
        );
    }

    grid.into_iter()
        .map(|(period, month)| month.into_point(period))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WeeklyPoint {
    /// `0` is the week ending on the anchor date.
    pub weeks_ago: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub total_amount: f64,
    pub record_count: usize,
    pub average_amount: f64,
}

fn days_before(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(days))
        .unwrap_or(NaiveDate::MIN)
}

/// Seven-day buckets counted back from `as_of`, most recent week first.
///
/// Week `k` covers the days `7k..=7k + 6` before `as_of`. Records dated after
/// `as_of` or older than the last week are skipped. Every week is present.
pub fn generate_weekly_series(
    records: &[TransactionRecord],
    weeks: usize,
    as_of: NaiveDate,
) -> Vec<WeeklyPoint> {
    let mut totals = vec![(Decimal::ZERO, 0usize); weeks];

    for record in records {
        let age_days = (as_of - record.occurred_on).num_days();
        if age_days < 0 {
            continue;
        }
        if let Some((total, count)) = totals.get_mut((age_days / 7) as usize) {
            *total = total.saturating_add(record.money());
            *count += 1;
        }
    }

    totals
        .into_iter()
        .enumerate()
        .map(|(weeks_ago, (total, record_count))| {
            let end_offset = weeks_ago as u64 * 7;
            let total_amount = money_to_f64(total);
            WeeklyPoint {
                weeks_ago,
                start: days_before(as_of, end_offset + 6),
                end: days_before(as_of, end_offset),
                total_amount,
                record_count,
                average_amount: safe_ratio(total_amount, record_count as f64),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RecordStatus;
    use chrono::NaiveDate;

    fn record(id: &str, amount: f64, y: i32, m: u32, d: u32) -> TransactionRecord {
        TransactionRecord::new(id, amount, NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn ym(year: i32, month: u32) -> YearMonth {
        YearMonth::new(year, month).unwrap()
    }

    #[test]
    fn test_trailing_months_wraps_year() {
        let months = trailing_months(ym(2024, 2), 4);
        assert_eq!(
            months,
            vec![ym(2023, 11), ym(2023, 12), ym(2024, 1), ym(2024, 2)]
        );
        assert!(trailing_months(ym(2024, 2), 0).is_empty());
    }

    #[test]
    fn test_empty_input_still_fills_window() {
        let series = generate_trend_series(&[], 6, ym(2024, 6));

        assert_eq!(series.len(), 6);
        assert_eq!(series[0].period, ym(2024, 1));
        assert_eq!(series[5].period, ym(2024, 6));
        assert!(series.iter().all(|p| p.record_count == 0 && p.total_amount == 0.0));
    }

    #[test]
    fn test_records_land_in_their_month() {
        let records = vec![
            record("c", 30.0, 2024, 3, 31).with_status(RecordStatus::Pending),
            record("a", 100.0, 2024, 1, 2).with_status(RecordStatus::Paid),
            record("b", 50.0, 2024, 1, 28).with_status(RecordStatus::Pending),
        ];

        let series = generate_trend_series(&records, 3, ym(2024, 3));

        assert_eq!(series[0].total_amount, 150.0);
        assert_eq!(series[0].record_count, 2);
        assert_eq!(series[0].paid_count, 1);
        assert_eq!(series[0].paid_amount, 100.0);
        assert_eq!(series[0].average_amount, 75.0);
        assert_eq!(series[1], TrendPoint::empty(ym(2024, 2)));
        assert_eq!(series[2].total_amount, 30.0);
        assert_eq!(series[2].paid_count, 0);
    }

    #[test]
    fn test_out_of_window_records_are_ignored() {
        let records = vec![
            record("old", 999.0, 2023, 6, 1),
            record("future", 999.0, 2024, 7, 1),
            record("in", 10.0, 2024, 6, 15),
        ];

        let series = generate_trend_series(&records, 2, ym(2024, 6));

        assert_eq!(series.len(), 2);
        let total: f64 = series.iter().map(|p| p.total_amount).sum();
        assert_eq!(total, 10.0);
    }

    #[test]
    fn test_paid_on_does_not_move_records() {
        let records = vec![record("late-payer", 75.0, 2024, 1, 20)
            .with_status(RecordStatus::Paid)
            .with_paid_on(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap())];

        let series = generate_trend_series(&records, 3, ym(2024, 3));

        assert_eq!(series[0].paid_amount, 75.0);
        assert_eq!(series[2].paid_amount, 0.0);
    }

    #[test]
    fn test_point_metrics() {
        let point = TrendPoint {
            period: ym(2024, 1),
            total_amount: 200.0,
            record_count: 4,
            paid_count: 1,
            paid_amount: 150.0,
            average_amount: 50.0,
            category_count: 2,
        };

        assert_eq!(point.metric(TrendMetric::TotalAmount), 200.0);
        assert_eq!(point.metric(TrendMetric::RecordCount), 4.0);
        assert_eq!(point.metric(TrendMetric::PaymentRate), 0.75);
        assert_eq!(point.metric(TrendMetric::CollectionRate), 0.25);
        assert_eq!(TrendPoint::empty(ym(2024, 2)).payment_rate(), 0.0);
    }

    #[test]
    fn test_month_average_and_category_count() {
        let records = vec![
            record("a", 10.0, 2024, 5, 1).with_label(Dimension::Category, "Fuel"),
            record("b", 20.0, 2024, 5, 2).with_label(Dimension::Category, "Fuel"),
            record("c", 30.0, 2024, 5, 3).with_label(Dimension::Category, "Travel"),
            record("d", 40.0, 2024, 5, 4),
        ];

        let series = generate_trend_series(&records, 2, ym(2024, 5));

        assert_eq!(series[0], TrendPoint::empty(ym(2024, 4)));
        assert_eq!(series[1].average_amount, 25.0);
        assert_eq!(series[1].category_count, 3);
    }

    #[test]
    fn test_month_totals_do_not_depend_on_order() {
        let mut records = vec![
            record("a", 0.1, 2024, 5, 1).with_status(RecordStatus::Paid),
            record("b", 0.2, 2024, 5, 2).with_status(RecordStatus::Paid),
            record("c", 0.3, 2024, 5, 3),
        ];

        let forward = generate_trend_series(&records, 1, ym(2024, 5));
        records.reverse();
        let reversed = generate_trend_series(&records, 1, ym(2024, 5));

        assert_eq!(forward, reversed);
        assert_eq!(forward[0].total_amount, 0.6);
        assert_eq!(forward[0].paid_amount, 0.3);
    }

    #[test]
    fn test_weekly_series_buckets_back_from_anchor() {
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let records = vec![
            record("today", 10.0, 2024, 6, 30),
            record("six-days", 20.0, 2024, 6, 24),
            record("seven-days", 40.0, 2024, 6, 23),
            record("week-11", 5.0, 2024, 4, 8),
            record("week-12", 999.0, 2024, 4, 7),
            record("future", 999.0, 2024, 7, 1),
        ];

        let weeks = generate_weekly_series(&records, 12, as_of);

        assert_eq!(weeks.len(), 12);
        assert_eq!(weeks[0].weeks_ago, 0);
        assert_eq!(weeks[0].start, NaiveDate::from_ymd_opt(2024, 6, 24).unwrap());
        assert_eq!(weeks[0].end, as_of);
        assert_eq!(weeks[0].total_amount, 30.0);
        assert_eq!(weeks[0].record_count, 2);
        assert_eq!(weeks[0].average_amount, 15.0);
        assert_eq!(weeks[1].total_amount, 40.0);
        assert_eq!(weeks[11].total_amount, 5.0);
        assert_eq!(weeks[5].record_count, 0);
        assert_eq!(weeks[5].average_amount, 0.0);
    }

    #[test]
    fn test_weekly_series_empty() {
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        assert!(generate_weekly_series(&[], 0, as_of).is_empty());
        assert_eq!(generate_weekly_series(&[], 4, as_of).len(), 4);
    }
}
