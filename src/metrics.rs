use crate::schema::{RecordStatus, TransactionRecord};
use crate::utils::{money_to_f64, percentage_change, safe_ratio};
use log::debug;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodSnapshot {
    pub total_amount: f64,
    pub record_count: usize,
    pub paid_count: usize,
    pub pending_count: usize,
    pub overdue_count: usize,
    pub cancelled_count: usize,
    pub settled_count: usize,
    /// Amount of paid invoices and settled expenses.
    pub collected_amount: f64,
    /// Amount of pending and overdue invoices.
    pub outstanding_amount: f64,
    pub pending_amount: f64,
    pub overdue_amount: f64,
    /// Paid or settled records over all records, in `[0, 1]`; `0` for an empty period.
    pub collection_rate: f64,
    /// Mean amount per record; `0` for an empty period.
    pub average_value: f64,
}

/// Reduces a period to totals, one record at a time. Money is held as
/// [`Decimal`] until the snapshot is built.
#[derive(Default)]
struct SnapshotAccumulator {
    total: Decimal,
    collected: Decimal,
    pending: Decimal,
    overdue: Decimal,
}

impl PeriodSnapshot {
    pub fn from_records(records: &[TransactionRecord]) -> Self {
        let mut snapshot = Self::default();
        let mut money = SnapshotAccumulator::default();

        for record in records {
            let amount = record.money();
            money.total = money.total.saturating_add(amount);
            snapshot.record_count += 1;

            match record.status {
                RecordStatus::Paid => snapshot.paid_count += 1,
                RecordStatus::Pending => {
                    snapshot.pending_count += 1;
                    money.pending = money.pending.saturating_add(amount);
                }
                RecordStatus::Overdue => {
                    snapshot.overdue_count += 1;
                    money.overdue = money.overdue.saturating_add(amount);
                }
                RecordStatus::Cancelled => snapshot.cancelled_count += 1,
                RecordStatus::Settled => snapshot.settled_count += 1,
            }

            if record.status.is_settled() {
                money.collected = money.collected.saturating_add(amount);
            }
        }

        snapshot.total_amount = money_to_f64(money.total);
        snapshot.collected_amount = money_to_f64(money.collected);
        snapshot.pending_amount = money_to_f64(money.pending);
        snapshot.overdue_amount = money_to_f64(money.overdue);
        snapshot.outstanding_amount = money_to_f64(money.pending.saturating_add(money.overdue));

        let count = snapshot.record_count as f64;
        snapshot.collection_rate = safe_ratio(snapshot.settled_or_paid_count() as f64, count);
        snapshot.average_value = safe_ratio(snapshot.total_amount, count);
        snapshot
    }

    pub fn settled_or_paid_count(&self) -> usize {
        self.paid_count + self.settled_count
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodChanges {
    pub total_amount_change_pct: f64,
    pub record_count_change_pct: f64,
    pub paid_count_change_pct: f64,
    pub pending_count_change_pct: f64,
    pub overdue_count_change_pct: f64,
    pub cancelled_count_change_pct: f64,
    pub settled_count_change_pct: f64,
    pub collected_amount_change_pct: f64,
    pub outstanding_amount_change_pct: f64,
    pub pending_amount_change_pct: f64,
    pub overdue_amount_change_pct: f64,
    pub collection_rate_change_pct: f64,
    pub average_value_change_pct: f64,
}

impl PeriodChanges {
    pub fn between(current: &PeriodSnapshot, previous: &PeriodSnapshot) -> Self {
        let count = |c: usize, p: usize| percentage_change(c as f64, p as f64);

        Self {
            total_amount_change_pct: percentage_change(
                current.total_amount,
                previous.total_amount,
            ),
            record_count_change_pct: count(current.record_count, previous.record_count),
            paid_count_change_pct: count(current.paid_count, previous.paid_count),
            pending_count_change_pct: count(current.pending_count, previous.pending_count),
            overdue_count_change_pct: count(current.overdue_count, previous.overdue_count),
            cancelled_count_change_pct: count(current.cancelled_count, previous.cancelled_count),
            settled_count_change_pct: count(current.settled_count, previous.settled_count),
            collected_amount_change_pct: percentage_change(
                current.collected_amount,
                previous.collected_amount,
            ),
            outstanding_amount_change_pct: percentage_change(
                current.outstanding_amount,
                previous.outstanding_amount,
            ),
            pending_amount_change_pct: percentage_change(
                current.pending_amount,
                previous.pending_amount,
            ),
            overdue_amount_change_pct: percentage_change(
                current.overdue_amount,
                previous.overdue_amount,
            ),
            collection_rate_change_pct: percentage_change(
                current.collection_rate,
                previous.collection_rate,
            ),
            average_value_change_pct: percentage_change(
                current.average_value,
                previous.average_value,
            ),
        }
    }

    /// Every change field with its name, in declaration order.
    pub fn values(&self) -> [(&'static str, f64); 13] {
        [
            ("total_amount_change_pct", self.total_amount_change_pct),
            ("record_count_change_pct", self.record_count_change_pct),
            ("paid_count_change_pct", self.paid_count_change_pct),
            ("pending_count_change_pct", self.pending_count_change_pct),
            ("overdue_count_change_pct", self.overdue_count_change_pct),
            ("cancelled_count_change_pct", self.cancelled_count_change_pct),
            ("settled_count_change_pct", self.settled_count_change_pct),
            ("collected_amount_change_pct", self.collected_amount_change_pct),
            ("outstanding_amount_change_pct", self.outstanding_amount_change_pct),
            ("pending_amount_change_pct", self.pending_amount_change_pct),
            ("overdue_amount_change_pct", self.overdue_amount_change_pct),
            ("collection_rate_change_pct", self.collection_rate_change_pct),
            ("average_value_change_pct", self.average_value_change_pct),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodMetrics {
    pub current: PeriodSnapshot,
    pub previous: PeriodSnapshot,
    pub changes: PeriodChanges,
}

/// Reduces two caller-delimited record sets (typically consecutive calendar
/// months) into KPIs with period-over-period deltas.
pub fn calculate_period_metrics(
    current: &[TransactionRecord],
    previous: &[TransactionRecord],
) -> PeriodMetrics {
    let current = PeriodSnapshot::from_records(current);
    let previous = PeriodSnapshot::from_records(previous);
    let changes = PeriodChanges::between(&current, &previous);

    debug!(
        "Period metrics: {} current records totalling {:.2}, {} previous records totalling {:.2}",
        current.record_count, current.total_amount, previous.record_count, previous.total_amount
    );

    PeriodMetrics {
        current,
        previous,
        changes,
    }
}
