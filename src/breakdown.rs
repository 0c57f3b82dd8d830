use crate::error::{AnalyticsError, Result};
use crate::schema::{Dimension, TransactionRecord, YearMonth};
use crate::utils::{money_to_f64, percentage_change, safe_ratio, share_pct};
use log::debug;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BreakdownEntry {
    pub label: String,
    pub total: f64,
    pub record_count: usize,
    pub average_amount: f64,
    /// Group total over the grand total, as a percentage.
    pub share_pct: f64,
    /// Latest populated month against the populated month before it.
    pub mom_change_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Breakdown {
    pub dimension: Dimension,
    pub grand_total: f64,
    /// Every group, largest total first, ties by label.
    pub entries: Vec<BreakdownEntry>,
}

impl Breakdown {
    /// The first `limit` groups.
    pub fn top(&self, limit: usize) -> Vec<BreakdownEntry> {
        self.entries.iter().take(limit).cloned().collect()
    }

    pub fn group_sum(&self) -> f64 {
        self.entries.iter().map(|entry| entry.total).sum()
    }

    pub fn find(&self, label: &str) -> Option<&BreakdownEntry> {
        self.entries.iter().find(|entry| entry.label == label)
    }
}

#[derive(Default)]
struct GroupAccumulator {
    total: Decimal,
    record_count: usize,
    monthly: BTreeMap<YearMonth, Decimal>,
}

impl GroupAccumulator {
    fn add(&mut self, record: &TransactionRecord) {
        let amount = record.money();
        self.total = self.total.saturating_add(amount);
        self.record_count += 1;
        let month = self.monthly.entry(record.month()).or_default();
        *month = month.saturating_add(amount);
    }

    /// Populated months in calendar order.
    fn monthly_totals(&self) -> Vec<f64> {
        self.monthly.values().map(|&total| money_to_f64(total)).collect()
    }

    fn mom_change_pct(&self) -> f64 {
        let mut latest_first = self.monthly.values().rev();
        match (latest_first.next(), latest_first.next()) {
            (Some(&current), Some(&previous)) => {
                percentage_change(money_to_f64(current), money_to_f64(previous))
            }
            _ => 0.0,
        }
    }
}

/// Groups records by label in one pass, totals held as [`Decimal`].
fn group_by_label(
    records: &[TransactionRecord],
    dimension: Dimension,
) -> (BTreeMap<&str, GroupAccumulator>, Decimal) {
    let mut groups: BTreeMap<&str, GroupAccumulator> = BTreeMap::new();
    let mut grand_total = Decimal::ZERO;

    for record in records {
        grand_total = grand_total.saturating_add(record.money());
        groups.entry(record.label(dimension)).or_default().add(record);
    }

    (groups, grand_total)
}

/// Largest total first; equal totals fall back to ascending label order.
pub(crate) fn by_total_then_label(a: &BreakdownEntry, b: &BreakdownEntry) -> Ordering {
    b.total
        .total_cmp(&a.total)
        .then_with(|| a.label.cmp(&b.label))
}

/// Groups every record under its label for `dimension`.
///
/// Records without a usable label are grouped under `"Unknown"`, so the group
/// totals always add back up to the grand total.
pub fn aggregate_breakdown(records: &[TransactionRecord], dimension: Dimension) -> Breakdown {
    let (groups, grand_total) = group_by_label(records, dimension);
    let grand_total = money_to_f64(grand_total);

    let mut entries: Vec<BreakdownEntry> = groups
        .into_iter()
        .map(|(label, group)| {
            let total = money_to_f64(group.total);
            BreakdownEntry {
                label: label.to_string(),
                total,
                record_count: group.record_count,
                average_amount: safe_ratio(total, group.record_count as f64),
                share_pct: share_pct(total, grand_total),
                mom_change_pct: group.mom_change_pct(),
            }
        })
        .collect();

    entries.sort_by(by_total_then_label);

    debug!(
        "Breakdown by {}: {} groups over {} records",
        dimension,
        entries.len(),
        records.len()
    );

    Breakdown {
        dimension,
        grand_total,
        entries,
    }
}

/// The `limit` largest groups for `dimension`.
pub fn top_breakdown(
    records: &[TransactionRecord],
    dimension: Dimension,
    limit: usize,
) -> Vec<BreakdownEntry> {
    aggregate_breakdown(records, dimension).top(limit)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GroupTrend {
    pub label: String,
    pub total: f64,
    /// Least-squares slope of the monthly totals against their position among
    /// the group's populated months, in amount per month.
    pub slope: f64,
    pub populated_months: usize,
    pub is_increasing: bool,
    pub is_decreasing: bool,
}

/// Ordinary least-squares slope of `values` against `0..n`. `0` for fewer than
/// two values.
pub fn regression_slope(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 2 {
        return 0.0;
    }

    let sum_x = n * (n - 1.0) / 2.0;
    let sum_x2 = n * (n - 1.0) * (2.0 * n - 1.0) / 6.0;
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();

    safe_ratio(n * sum_xy - sum_x * sum_y, n * sum_x2 - sum_x * sum_x)
}

/// Direction of each group's monthly totals over the months it was active,
/// for the `limit` groups with the largest totals.
///
/// Gaps between populated months are not zero-filled; the regression runs over
/// the populated months in calendar order.
pub fn group_trends(
    records: &[TransactionRecord],
    dimension: Dimension,
    limit: usize,
) -> Vec<GroupTrend> {
    let (groups, _) = group_by_label(records, dimension);

    let mut trends: Vec<GroupTrend> = groups
        .into_iter()
        .map(|(label, group)| {
            let slope = regression_slope(&group.monthly_totals());
            GroupTrend {
                label: label.to_string(),
                total: money_to_f64(group.total),
                slope,
                populated_months: group.monthly.len(),
                is_increasing: slope > 0.0,
                is_decreasing: slope < 0.0,
            }
        })
        .collect();

    trends.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.label.cmp(&b.label))
    });
    trends.truncate(limit);
    trends
}

/// Checks that the groups of a full breakdown add back up to its grand total.
pub fn verify_conservation(breakdown: &Breakdown, tolerance: f64) -> Result<()> {
    let group_sum = breakdown.group_sum();
    let difference = (group_sum - breakdown.grand_total).abs();

    if difference > tolerance {
        return Err(AnalyticsError::ConservationViolation {
            dimension: breakdown.dimension.to_string(),
            grand_total: breakdown.grand_total,
            group_sum,
            difference,
        });
    }

    Ok(())
}
