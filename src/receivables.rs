use crate::schema::{RecordStatus, TransactionRecord};
use crate::utils::{days_between, mean, money_to_f64, safe_ratio, share_pct};
use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Upper bound (inclusive, in days) and label of each aging bucket. The last
/// bucket is open-ended.
const AGING_BUCKETS: [(Option<i64>, &str); 4] = [
    (Some(30), "0-30"),
    (Some(60), "31-60"),
    (Some(90), "61-90"),
    (None, "90+"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AgingBucket {
    pub label: String,
    pub count: usize,
    pub amount: f64,
    /// Bucket amount over total outstanding, as a percentage.
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AgingReport {
    pub as_of: NaiveDate,
    pub total_outstanding: f64,
    pub outstanding_count: usize,
    /// Mean age in whole days, rounded to nearest.
    pub average_age_days: i64,
    /// Always four buckets, youngest first.
    pub buckets: Vec<AgingBucket>,
}

fn bucket_index(age_days: i64) -> usize {
    AGING_BUCKETS
        .iter()
        .position(|(upper, _)| upper.map_or(true, |upper| age_days <= upper))
        .unwrap_or(AGING_BUCKETS.len() - 1)
}

/// Ages every pending or overdue record against `as_of`.
///
/// Records dated after `as_of` count as age 0.
pub fn aging_report(records: &[TransactionRecord], as_of: NaiveDate) -> AgingReport {
    let mut counts = [0usize; 4];
    let mut amounts = [Decimal::ZERO; 4];
    let mut ages = Vec::new();

    for record in records.iter().filter(|r| r.status.is_outstanding()) {
        let age = days_between(record.occurred_on, as_of);
        let idx = bucket_index(age);
        counts[idx] += 1;
        amounts[idx] = amounts[idx].saturating_add(record.money());
        ages.push(age as f64);
    }

    let total_outstanding = money_to_f64(
        amounts
            .iter()
            .fold(Decimal::ZERO, |total, amount| total.saturating_add(*amount)),
    );
    let buckets = AGING_BUCKETS
        .iter()
        .zip(amounts)
        .enumerate()
        .map(|(idx, ((_, label), amount))| {
            let amount = money_to_f64(amount);
            AgingBucket {
                label: label.to_string(),
                count: counts[idx],
                amount,
                share_pct: share_pct(amount, total_outstanding),
            }
        })
        .collect();

    debug!(
        "Aging as of {}: {} outstanding records totalling {:.2}",
        as_of,
        ages.len(),
        total_outstanding
    );

    AgingReport {
        as_of,
        total_outstanding,
        outstanding_count: ages.len(),
        average_age_days: mean(&ages).round() as i64,
        buckets,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PaymentLatency {
    pub sample_count: usize,
    pub mean_days: f64,
    pub median_days: f64,
    pub max_days: i64,
}

/// Days from issue to payment over every record that carries a payment date.
pub fn payment_latency(records: &[TransactionRecord]) -> PaymentLatency {
    let mut days: Vec<i64> = records
        .iter()
        .filter_map(|record| {
            record
                .paid_on
                .map(|paid_on| days_between(record.occurred_on, paid_on))
        })
        .collect();

    if days.is_empty() {
        return PaymentLatency::default();
    }

    days.sort_unstable();
    let mid = days.len() / 2;
    let median_days = if days.len() % 2 == 0 {
        (days[mid - 1] + days[mid]) as f64 / 2.0
    } else {
        days[mid] as f64
    };
    let as_f64: Vec<f64> = days.iter().map(|&d| d as f64).collect();

    PaymentLatency {
        sample_count: days.len(),
        mean_days: mean(&as_f64),
        median_days,
        max_days: days[days.len() - 1],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusShare {
    pub status: RecordStatus,
    pub count: usize,
    pub amount: f64,
    /// Record count over all records, as a percentage.
    pub share_pct: f64,
}

/// One entry per status, in [`RecordStatus::ALL`] order, zero-filled.
pub fn status_distribution(records: &[TransactionRecord]) -> Vec<StatusShare> {
    let total = records.len() as f64;

    RecordStatus::ALL
        .iter()
        .map(|&status| {
            let (count, amount) = records
                .iter()
                .filter(|record| record.status == status)
                .fold((0usize, Decimal::ZERO), |(count, amount), record| {
                    (count + 1, amount.saturating_add(record.money()))
                });
            StatusShare {
                status,
                count,
                amount: money_to_f64(amount),
                share_pct: safe_ratio(count as f64, total) * 100.0,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RecentPayment {
    pub id: String,
    pub amount: f64,
    pub occurred_on: NaiveDate,
    pub paid_on: NaiveDate,
    pub days_to_payment: i64,
}

/// The `limit` most recently paid records, newest first.
pub fn recent_payments(records: &[TransactionRecord], limit: usize) -> Vec<RecentPayment> {
    let mut payments: Vec<RecentPayment> = records
        .iter()
        .filter(|record| record.status == RecordStatus::Paid)
        .filter_map(|record| {
            record.paid_on.map(|paid_on| RecentPayment {
                id: record.id.clone(),
                amount: record.amount_or_zero(),
                occurred_on: record.occurred_on,
                paid_on,
                days_to_payment: days_between(record.occurred_on, paid_on),
            })
        })
        .collect();

    payments.sort_by(|a, b| b.paid_on.cmp(&a.paid_on).then_with(|| a.id.cmp(&b.id)));
    payments.truncate(limit);
    payments
}
