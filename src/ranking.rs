use crate::schema::{Dimension, RecordStatus, TransactionRecord};
use crate::trend::{TrendMetric, TrendPoint};
use crate::utils::{days_between, mean, money_to_f64, percentage_change, safe_ratio};
use log::debug;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub const DEFAULT_MIN_SAMPLE_SIZE: usize = 3;
pub const DEFAULT_RANKING_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EntityAggregate {
    pub label: String,
    pub total_invoiced: f64,
    /// Amount on records with status [`RecordStatus::Paid`]. Settled records
    /// count towards `total_invoiced` only.
    pub total_paid: f64,
    /// `total_paid / total_invoiced`, `0` when nothing was invoiced.
    pub payment_rate: f64,
    pub record_count: usize,
    pub paid_count: usize,
    /// Mean days from issue to payment over records with a payment date.
    pub average_days_to_payment: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RankedEntity {
    /// 1-based position within its leaderboard.
    pub rank: usize,
    #[serde(flatten)]
    pub entity: EntityAggregate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RankingOptions {
    pub limit: usize,
    pub min_sample_size: usize,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RANKING_LIMIT,
            min_sample_size: DEFAULT_MIN_SAMPLE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EntityRanking {
    pub dimension: Dimension,
    /// Every entity, including those too small to rank, sorted by label.
    pub entities: Vec<EntityAggregate>,
    /// Highest payment rate first.
    pub top_performers: Vec<RankedEntity>,
    /// Lowest payment rate first.
    pub bottom_performers: Vec<RankedEntity>,
    /// Entities left out of both leaderboards for having too few records.
    pub excluded_count: usize,
}

#[derive(Default)]
struct EntityAccumulator {
    total_invoiced: Decimal,
    total_paid: Decimal,
    record_count: usize,
    paid_count: usize,
    payment_days: Vec<f64>,
}

/// Per-entity totals for `dimension`, sorted by label. No sample-size filter.
pub fn aggregate_entities(
    records: &[TransactionRecord],
    dimension: Dimension,
) -> Vec<EntityAggregate> {
    let mut entities: BTreeMap<&str, EntityAccumulator> = BTreeMap::new();

    for record in records {
        let amount = record.money();
        let entity = entities.entry(record.label(dimension)).or_default();

        entity.total_invoiced = entity.total_invoiced.saturating_add(amount);
        entity.record_count += 1;
        if record.status == RecordStatus::Paid {
            entity.total_paid = entity.total_paid.saturating_add(amount);
            entity.paid_count += 1;
        }
        if let Some(paid_on) = record.paid_on {
            entity
                .payment_days
                .push(days_between(record.occurred_on, paid_on) as f64);
        }
    }

    entities
        .into_iter()
        .map(|(label, acc)| {
            let total_invoiced = money_to_f64(acc.total_invoiced);
            let total_paid = money_to_f64(acc.total_paid);
            EntityAggregate {
                label: label.to_string(),
                total_invoiced,
                total_paid,
                payment_rate: safe_ratio(total_paid, total_invoiced),
                record_count: acc.record_count,
                paid_count: acc.paid_count,
                average_days_to_payment: (!acc.payment_days.is_empty())
                    .then(|| mean(&acc.payment_days)),
            }
        })
        .collect()
}

fn leaderboard<F>(eligible: &[&EntityAggregate], limit: usize, order: F) -> Vec<RankedEntity>
where
    F: Fn(&EntityAggregate, &EntityAggregate) -> Ordering,
{
    let mut sorted = eligible.to_vec();
    sorted.sort_by(|a, b| order(a, b).then_with(|| a.label.cmp(&b.label)));

    sorted
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(idx, entity)| RankedEntity {
            rank: idx + 1,
            entity: entity.clone(),
        })
        .collect()
}

/// Ranks entities of `dimension` by payment rate.
///
/// Entities with fewer than `min_sample_size` records stay in
/// [`EntityRanking::entities`] but never reach either leaderboard.
pub fn rank_entities(
    records: &[TransactionRecord],
    dimension: Dimension,
    options: &RankingOptions,
) -> EntityRanking {
    let entities = aggregate_entities(records, dimension);

    let eligible: Vec<&EntityAggregate> = entities
        .iter()
        .filter(|entity| entity.record_count >= options.min_sample_size)
        .collect();
    let excluded_count = entities.len() - eligible.len();

    let top_performers = leaderboard(&eligible, options.limit, |a, b| {
        b.payment_rate.total_cmp(&a.payment_rate)
    });
    let bottom_performers = leaderboard(&eligible, options.limit, |a, b| {
        a.payment_rate.total_cmp(&b.payment_rate)
    });

    debug!(
        "Ranking by {}: {} entities, {} below the minimum sample size of {}",
        dimension,
        entities.len(),
        excluded_count,
        options.min_sample_size
    );

    EntityRanking {
        dimension,
        entities,
        top_performers,
        bottom_performers,
        excluded_count,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

impl TrendDirection {
    pub fn between(recent: f64, previous: f64) -> Self {
        if recent > previous {
            TrendDirection::Up
        } else if recent < previous {
            TrendDirection::Down
        } else {
            TrendDirection::Stable
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrendSummary {
    pub metric: TrendMetric,
    pub direction: TrendDirection,
    pub recent_mean: f64,
    pub previous_mean: f64,
    pub change_pct: f64,
    pub recent_periods: usize,
    pub previous_periods: usize,
}

/// Compares the mean of `metric` over the last `span` points with the mean over
/// the (up to) `span` points before them. An empty sub-window has a mean of 0.
pub fn classify_trend(points: &[TrendPoint], metric: TrendMetric, span: usize) -> TrendSummary {
    let recent_start = points.len().saturating_sub(span);
    let previous_start = recent_start.saturating_sub(span);

    let values = |window: &[TrendPoint]| -> Vec<f64> {
        window.iter().map(|point| point.metric(metric)).collect()
    };
    let recent = values(&points[recent_start..]);
    let previous = values(&points[previous_start..recent_start]);

    let recent_mean = mean(&recent);
    let previous_mean = mean(&previous);

    TrendSummary {
        metric,
        direction: TrendDirection::between(recent_mean, previous_mean),
        recent_mean,
        previous_mean,
        change_pct: percentage_change(recent_mean, previous_mean),
        recent_periods: recent.len(),
        previous_periods: previous.len(),
    }
}
