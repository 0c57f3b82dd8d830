//! # Finance Analytics Engine
//!
//! Aggregation core for a finance dashboard: turns flat lists of invoices and
//! expenses into period KPIs, gap-filled monthly trends, dimensional
//! breakdowns, payment leaderboards and receivables views.
//!
//! ## Core Concepts
//!
//! - **Records**: [`TransactionRecord`]s carry an amount, a date, a lifecycle
//!   status and a set of grouping labels keyed by [`Dimension`]
//! - **Zero-denominator rule**: every ratio or percentage change with a zero
//!   base resolves to a finite value (0, or 100 for new activity)
//! - **Unknown bucket**: records without a label for a dimension are grouped
//!   under `"Unknown"`, so breakdowns always add back up to the grand total
//! - **Exact money**: amounts are summed as decimals, so totals do not depend
//!   on the order records arrive in
//! - **Explicit anchor**: nothing reads the clock; trend windows and aging are
//!   anchored at a caller-supplied date
//!
//! ## Example
//!
//! ```rust,ignore
//! use finance_analytics_engine::*;
//! use chrono::NaiveDate;
//!
//! let outcome = ingest_json(r#"[
//!     {"id": "1", "amount": "$1,200.00", "date_issued": "2024-05-02",
//!      "status": "paid", "date_paid": "2024-05-20", "client_name": "Acme"},
//!     {"id": "2", "amount": 300, "date_issued": "2024-06-11",
//!      "status": "sent", "client_name": "Birch"}
//! ]"#)?;
//! assert!(outcome.skipped.is_empty());
//!
//! let query = AnalyticsQuery::new(
//!     outcome.records,
//!     vec![],
//!     NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
//! );
//! let report = AnalyticsProcessor::process(&AnalyticsConfig::default(), &query)?;
//! println!("{}", report.to_json_pretty()?);
//! ```

pub mod breakdown;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod metrics;
pub mod ranking;
pub mod receivables;
pub mod report;
pub mod schema;
pub mod trend;
pub mod utils;

pub use breakdown::{
    aggregate_breakdown, group_trends, regression_slope, top_breakdown, verify_conservation,
    Breakdown, BreakdownEntry, GroupTrend,
};
pub use config::{
    AnalyticsConfig, BreakdownSpec, MAX_TREND_WINDOW_MONTHS, MAX_WEEKLY_WINDOW_WEEKS,
};
pub use error::{AnalyticsError, Result};
pub use ingestion::*;
pub use metrics::{calculate_period_metrics, PeriodChanges, PeriodMetrics, PeriodSnapshot};
pub use ranking::{
    aggregate_entities, classify_trend, rank_entities, EntityAggregate, EntityRanking,
    RankedEntity, RankingOptions, TrendDirection, TrendSummary,
};
pub use receivables::{
    aging_report, payment_latency, recent_payments, status_distribution, AgingBucket,
    AgingReport, PaymentLatency, RecentPayment, StatusShare,
};
pub use report::{AnalyticsQuery, AnalyticsReport, DimensionBreakdown};
pub use schema::*;
pub use trend::{
    generate_trend_series, generate_weekly_series, trailing_months, TrendMetric, TrendPoint,
    WeeklyPoint,
};
pub use utils::*;

use log::{debug, info};

pub struct AnalyticsProcessor;

impl AnalyticsProcessor {
    pub fn process(config: &AnalyticsConfig, query: &AnalyticsQuery) -> Result<AnalyticsReport> {
        config.validate()?;

        info!(
            "Building analytics report anchored at {} from {} current, {} previous and {} history records",
            query.anchor,
            query.current.len(),
            query.previous.len(),
            query.history.len()
        );

        let (report, _) = build_report(config, query);

        info!(
            "Report ready: {} trend points, {} breakdowns, {} ranked entities",
            report.trend.len(),
            report.breakdowns.len(),
            report.ranking.entities.len()
        );

        Ok(report)
    }

    /// Like [`AnalyticsProcessor::process`], then checks that every configured
    /// breakdown conserves its grand total within `tolerance`.
    pub fn process_with_verification(
        config: &AnalyticsConfig,
        query: &AnalyticsQuery,
        tolerance: f64,
    ) -> Result<AnalyticsReport> {
        config.validate()?;

        info!(
            "Building verified analytics report anchored at {} (tolerance {})",
            query.anchor, tolerance
        );

        let (report, full_breakdowns) = build_report(config, query);

        for breakdown in &full_breakdowns {
            verify_conservation(breakdown, tolerance)?;
        }
        debug!("Conservation verified for {} breakdowns", full_breakdowns.len());

        Ok(report)
    }
}

pub fn process_analytics(
    config: &AnalyticsConfig,
    query: &AnalyticsQuery,
) -> Result<AnalyticsReport> {
    AnalyticsProcessor::process(config, query)
}

pub fn process_with_verification(
    config: &AnalyticsConfig,
    query: &AnalyticsQuery,
    tolerance: f64,
) -> Result<AnalyticsReport> {
    AnalyticsProcessor::process_with_verification(config, query, tolerance)
}

/// Runs every stage over an already validated config. Also hands back the
/// untruncated breakdowns for verification.
fn build_report(
    config: &AnalyticsConfig,
    query: &AnalyticsQuery,
) -> (AnalyticsReport, Vec<Breakdown>) {
    let records = query.current.as_slice();
    let history = query.history_or_current();
    let anchor_month = YearMonth::from_date(query.anchor);

    let metrics = calculate_period_metrics(records, &query.previous);

    let trend = generate_trend_series(history, config.trend_window_months, anchor_month);
    let trend_summary = classify_trend(&trend, config.trend_metric, config.trend_comparison_span);
    debug!(
        "Trend ending {}: {:?} ({:.2} vs {:.2})",
        anchor_month,
        trend_summary.direction,
        trend_summary.recent_mean,
        trend_summary.previous_mean
    );

    let weekly_trend = generate_weekly_series(history, config.weekly_window_weeks, query.anchor);
    let group_trends = group_trends(
        history,
        config.group_trend_dimension,
        config.group_trend_limit,
    );

    let full_breakdowns: Vec<Breakdown> = config
        .breakdowns
        .iter()
        .map(|spec| aggregate_breakdown(records, spec.dimension))
        .collect();
    let breakdowns = config
        .breakdowns
        .iter()
        .zip(&full_breakdowns)
        .map(|(spec, breakdown)| DimensionBreakdown {
            dimension: breakdown.dimension,
            grand_total: breakdown.grand_total,
            group_count: breakdown.entries.len(),
            entries: breakdown.top(spec.limit),
        })
        .collect();

    let ranking = rank_entities(
        history,
        config.ranking_dimension,
        &RankingOptions {
            limit: config.ranking_limit,
            min_sample_size: config.min_sample_size,
        },
    );

    let report = AnalyticsReport {
        anchor: query.anchor,
        metrics,
        trend,
        trend_summary,
        weekly_trend,
        group_trends,
        breakdowns,
        ranking,
        aging: aging_report(records, query.anchor),
        payment_latency: payment_latency(records),
        status_distribution: status_distribution(records),
        recent_payments: recent_payments(records, config.recent_payments_limit),
    };

    (report, full_breakdowns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn invoice(id: &str, client: &str, amount: f64, issued: NaiveDate) -> TransactionRecord {
        TransactionRecord::new(id, amount, issued)
            .with_status(RecordStatus::Pending)
            .with_label(Dimension::ClientName, client)
            .with_label(Dimension::Category, "Services")
    }

    #[test]
    fn test_end_to_end_processing() {
        let current = vec![
            invoice("1", "Acme", 100.0, date(2024, 4, 3))
                .with_status(RecordStatus::Paid)
                .with_paid_on(date(2024, 4, 13)),
            invoice("2", "Acme", 200.0, date(2024, 5, 3))
                .with_status(RecordStatus::Paid)
                .with_paid_on(date(2024, 5, 23)),
            invoice("3", "Acme", 300.0, date(2024, 6, 3)),
            invoice("4", "Birch", 50.0, date(2024, 6, 20)).with_status(RecordStatus::Overdue),
        ];
        let previous = vec![invoice("0", "Acme", 650.0, date(2024, 3, 1))];
        let query = AnalyticsQuery::new(current, previous, date(2024, 6, 30));

        let config = AnalyticsConfig {
            trend_window_months: 6,
            ..Default::default()
        };
        let report = AnalyticsProcessor::process(&config, &query).unwrap();

        assert_eq!(report.trend.len(), 6);
        assert_eq!(report.trend[5].period, YearMonth::new(2024, 6).unwrap());
        assert_eq!(report.metrics.current.total_amount, 650.0);
        assert_eq!(report.metrics.changes.total_amount_change_pct, 0.0);

        assert_eq!(report.breakdowns.len(), 3);
        let category = &report.breakdowns[0];
        assert_eq!(category.dimension, Dimension::Category);
        assert_eq!(category.entries[0].label, "Services");
        assert_eq!(report.breakdowns[1].entries[0].label, UNKNOWN_LABEL);

        assert_eq!(report.ranking.top_performers.len(), 1);
        assert_eq!(report.ranking.top_performers[0].entity.label, "Acme");
        assert_eq!(report.ranking.excluded_count, 1);

        assert_eq!(report.aging.outstanding_count, 2);
        assert_eq!(report.aging.total_outstanding, 350.0);
        assert_eq!(report.payment_latency.sample_count, 2);
        assert_eq!(report.payment_latency.mean_days, 15.0);
        assert_eq!(report.recent_payments[0].id, "2");

        // June 20 and June 3 fall in weeks 1 and 3 back from June 30.
        assert_eq!(report.weekly_trend.len(), 12);
        assert_eq!(report.weekly_trend[1].total_amount, 50.0);
        assert_eq!(report.weekly_trend[3].total_amount, 300.0);
        assert_eq!(report.group_trends.len(), 1);
        // Services per month: 100, 200, 350
        assert_eq!(report.group_trends[0].slope, 125.0);
    }

    #[test]
    fn test_history_drives_trend_and_ranking() {
        let current = vec![invoice("9", "Acme", 100.0, date(2024, 6, 5))];
        let history: Vec<TransactionRecord> = (1..=6u32)
            .map(|month| {
                invoice(&month.to_string(), "Acme", 1000.0 - 100.0 * month as f64, date(2024, month, 5))
                    .with_status(RecordStatus::Paid)
                    .with_paid_on(date(2024, month, 20))
            })
            .collect();
        let config = AnalyticsConfig {
            trend_window_months: 6,
            trend_metric: TrendMetric::TotalAmount,
            ..Default::default()
        };

        let without_history = AnalyticsQuery::new(current.clone(), vec![], date(2024, 6, 30));
        let report = AnalyticsProcessor::process(&config, &without_history).unwrap();
        assert_eq!(report.trend_summary.direction, TrendDirection::Up);
        assert_eq!(report.trend_summary.change_pct, 100.0);
        assert!(report.ranking.top_performers.is_empty());

        let with_history = without_history.with_history(history);
        let report = AnalyticsProcessor::process(&config, &with_history).unwrap();

        // 900, 800, 700 then 600, 500, 400
        assert_eq!(report.trend_summary.direction, TrendDirection::Down);
        assert_eq!(report.trend_summary.recent_mean, 500.0);
        assert_eq!(report.trend_summary.previous_mean, 800.0);
        assert!(report.trend.iter().all(|point| point.record_count == 1));

        assert_eq!(report.ranking.entities[0].record_count, 6);
        assert_eq!(report.ranking.top_performers[0].entity.label, "Acme");
        assert_eq!(report.group_trends[0].label, "Services");
        assert!(report.group_trends[0].is_decreasing);
        assert_eq!(report.weekly_trend.len(), 12);

        // Period KPIs stay on the current records.
        assert_eq!(report.metrics.current.total_amount, 100.0);
        assert_eq!(report.aging.total_outstanding, 100.0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let query = AnalyticsQuery::new(vec![], vec![], date(2024, 1, 31));
        let config = AnalyticsConfig {
            trend_window_months: 0,
            ..Default::default()
        };

        assert!(matches!(
            AnalyticsProcessor::process(&config, &query),
            Err(AnalyticsError::InvalidConfig { .. })
        ));
        assert!(process_with_verification(&config, &query, 1e-6).is_err());
    }

    #[test]
    fn test_verification_passes_on_truncated_breakdowns() {
        let records: Vec<TransactionRecord> = (0..20)
            .map(|i| {
                TransactionRecord::new(i.to_string(), 10.0 + i as f64, date(2024, 2, 1))
                    .with_label(Dimension::Category, &format!("Cat {}", i))
            })
            .collect();
        let query = AnalyticsQuery::new(records, vec![], date(2024, 2, 29));

        let report =
            process_with_verification(&AnalyticsConfig::default(), &query, 1e-6).unwrap();

        let category = &report.breakdowns[0];
        assert_eq!(category.entries.len(), 10);
        assert_eq!(category.group_count, 20);
        assert_eq!(category.grand_total, 390.0);
    }
}
