use crate::error::{AnalyticsError, Result};
use crate::schema::Dimension;
use crate::trend::TrendMetric;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const MAX_TREND_WINDOW_MONTHS: usize = 120;
pub const MAX_WEEKLY_WINDOW_WEEKS: usize = 520;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct BreakdownSpec {
    #[schemars(description = "Dimension to group records by")]
    pub dimension: Dimension,

    #[schemars(description = "Maximum number of groups to return, largest totals first")]
    pub limit: usize,
}

impl BreakdownSpec {
    pub fn new(dimension: Dimension, limit: usize) -> Self {
        Self { dimension, limit }
    }
}

/// Knobs for a full dashboard report. Every field has a default, so an empty
/// JSON object is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct AnalyticsConfig {
    #[schemars(
        description = "Number of calendar months in the trailing trend series, ending at the anchor month. Range 1..=120."
    )]
    pub trend_window_months: usize,

    #[schemars(description = "Metric compared between the recent and previous trend sub-windows")]
    pub trend_metric: TrendMetric,

    #[schemars(
        description = "Number of trend buckets in each comparison sub-window (e.g. 3 compares the last quarter with the one before)"
    )]
    pub trend_comparison_span: usize,

    #[schemars(
        description = "Entities with fewer records than this are left out of ranked views. Defaults to 3."
    )]
    pub min_sample_size: usize,

    #[schemars(description = "Dimension whose entities are ranked by payment rate")]
    pub ranking_dimension: Dimension,

    #[schemars(description = "Length of each of the top and bottom ranked lists")]
    pub ranking_limit: usize,

    #[schemars(description = "Dimensional breakdowns to include in the report")]
    pub breakdowns: Vec<BreakdownSpec>,

    #[schemars(description = "Number of most recent payments to list")]
    pub recent_payments_limit: usize,

    #[schemars(
        description = "Number of seven-day buckets in the weekly series, counted back from the anchor date. Range 1..=520."
    )]
    pub weekly_window_weeks: usize,

    #[schemars(description = "Dimension whose groups get a per-month regression trend")]
    pub group_trend_dimension: Dimension,

    #[schemars(description = "Number of groups with a regression trend, largest totals first")]
    pub group_trend_limit: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            trend_window_months: 12,
            trend_metric: TrendMetric::PaymentRate,
            trend_comparison_span: 3,
            min_sample_size: 3,
            ranking_dimension: Dimension::ClientName,
            ranking_limit: 5,
            breakdowns: vec![
                BreakdownSpec::new(Dimension::Category, 10),
                BreakdownSpec::new(Dimension::Company, 8),
                BreakdownSpec::new(Dimension::JobType, 6),
            ],
            recent_payments_limit: 10,
            weekly_window_weeks: 12,
            group_trend_dimension: Dimension::Category,
            group_trend_limit: 8,
        }
    }
}

impl AnalyticsConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_TREND_WINDOW_MONTHS).contains(&self.trend_window_months) {
            return Err(invalid(
                "trend_window_months",
                format!(
                    "{} is outside 1..={}",
                    self.trend_window_months, MAX_TREND_WINDOW_MONTHS
                ),
            ));
        }

        if self.trend_comparison_span == 0 {
            return Err(invalid("trend_comparison_span", "must be at least 1"));
        }

        if self.min_sample_size == 0 {
            return Err(invalid("min_sample_size", "must be at least 1"));
        }

        if self.ranking_limit == 0 {
            return Err(invalid("ranking_limit", "must be at least 1"));
        }

        if !(1..=MAX_WEEKLY_WINDOW_WEEKS).contains(&self.weekly_window_weeks) {
            return Err(invalid(
                "weekly_window_weeks",
                format!(
                    "{} is outside 1..={}",
                    self.weekly_window_weeks, MAX_WEEKLY_WINDOW_WEEKS
                ),
            ));
        }

        if self.group_trend_limit == 0 {
            return Err(invalid("group_trend_limit", "must be at least 1"));
        }

        for (idx, spec) in self.breakdowns.iter().enumerate() {
            if spec.limit == 0 {
                return Err(invalid(
                    "breakdowns",
                    format!("Breakdown #{} ({}) has a limit of 0", idx, spec.dimension),
                ));
            }
        }

        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AnalyticsConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

fn invalid(field: &str, details: impl Into<String>) -> AnalyticsError {
    AnalyticsError::InvalidConfig {
        field: field.to_string(),
        details: details.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AnalyticsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_sample_size, 3);
        assert_eq!(config.breakdowns.len(), 3);
        assert_eq!(config.weekly_window_weeks, 12);
        assert_eq!(config.group_trend_dimension, Dimension::Category);
        assert_eq!(config.group_trend_limit, 8);
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = AnalyticsConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AnalyticsConfig::default());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config = AnalyticsConfig::from_json_str(
            r#"{
                "trend_window_months": 6,
                "ranking_dimension": "payee",
                "breakdowns": [{"dimension": "department", "limit": 4}]
            }"#,
        )
        .unwrap();

        assert_eq!(config.trend_window_months, 6);
        assert_eq!(config.ranking_dimension, Dimension::Payee);
        assert_eq!(
            config.breakdowns,
            vec![BreakdownSpec::new(Dimension::Department, 4)]
        );
        assert_eq!(config.min_sample_size, 3);
    }

    #[test]
    fn test_validation_rejects_out_of_range_values() {
        let mut config = AnalyticsConfig {
            trend_window_months: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AnalyticsError::InvalidConfig { ref field, .. }) if field == "trend_window_months"
        ));

        config.trend_window_months = 121;
        assert!(config.validate().is_err());

        config.trend_window_months = 12;
        config.min_sample_size = 0;
        assert!(config.validate().is_err());

        config.min_sample_size = 3;
        config.weekly_window_weeks = 0;
        assert!(matches!(
            config.validate(),
            Err(AnalyticsError::InvalidConfig { ref field, .. }) if field == "weekly_window_weeks"
        ));

        config.weekly_window_weeks = 12;
        config.group_trend_limit = 0;
        assert!(config.validate().is_err());

        config.group_trend_limit = 8;
        config.breakdowns.push(BreakdownSpec::new(Dimension::Payee, 0));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Breakdown #3 (payee)"));
    }

    #[test]
    fn test_unknown_dimension_is_rejected() {
        let result =
            AnalyticsConfig::from_json_str(r#"{"ranking_dimension": "favourite_colour"}"#);
        assert!(matches!(result, Err(AnalyticsError::SerializationError(_))));
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = AnalyticsConfig::schema_as_json().unwrap();
        assert!(schema_json.contains("trend_window_months"));
        assert!(schema_json.contains("min_sample_size"));
        assert!(schema_json.contains("client_name"));
    }
}
