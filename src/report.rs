use crate::breakdown::{BreakdownEntry, GroupTrend};
use crate::metrics::PeriodMetrics;
use crate::ranking::{EntityRanking, TrendSummary};
use crate::receivables::{AgingReport, PaymentLatency, RecentPayment, StatusShare};
use crate::schema::{Dimension, TransactionRecord};
use crate::trend::{TrendPoint, WeeklyPoint};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input for one dashboard report. Period boundaries are chosen by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyticsQuery {
    #[schemars(description = "Records of the period being reported on")]
    pub current: Vec<TransactionRecord>,

    #[schemars(description = "Records of the comparison period")]
    #[serde(default)]
    pub previous: Vec<TransactionRecord>,

    #[schemars(
        description = "Reference date. Its month closes the trend window and receivables are aged against it."
    )]
    pub anchor: NaiveDate,

    #[schemars(
        description = "Longer record history for the trend series, weekly series, group trends and ranking. When empty those views use the current records."
    )]
    #[serde(default)]
    pub history: Vec<TransactionRecord>,
}

impl AnalyticsQuery {
    pub fn new(
        current: Vec<TransactionRecord>,
        previous: Vec<TransactionRecord>,
        anchor: NaiveDate,
    ) -> Self {
        Self {
            current,
            previous,
            anchor,
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<TransactionRecord>) -> Self {
        self.history = history;
        self
    }

    /// Records behind the multi-period views.
    pub fn history_or_current(&self) -> &[TransactionRecord] {
        if self.history.is_empty() {
            &self.current
        } else {
            &self.history
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DimensionBreakdown {
    pub dimension: Dimension,
    /// Sum over every group, including those cut by the limit.
    pub grand_total: f64,
    pub group_count: usize,
    pub entries: Vec<BreakdownEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalyticsReport {
    pub anchor: NaiveDate,
    pub metrics: PeriodMetrics,
    pub trend: Vec<TrendPoint>,
    pub trend_summary: TrendSummary,
    /// Most recent week first.
    pub weekly_trend: Vec<WeeklyPoint>,
    pub group_trends: Vec<GroupTrend>,
    pub breakdowns: Vec<DimensionBreakdown>,
    pub ranking: EntityRanking,
    pub aging: AgingReport,
    pub payment_latency: PaymentLatency,
    pub status_distribution: Vec<StatusShare>,
    pub recent_payments: Vec<RecentPayment>,
}

impl AnalyticsReport {
    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AnalyticsReport)
    }
}
