use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Invalid configuration value for '{field}': {details}")]
    InvalidConfig { field: String, details: String },

    #[error("Invalid record '{id}': {details}")]
    InvalidRecord { id: String, details: String },

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Breakdown by {dimension} does not conserve the grand total: groups sum to {group_sum}, expected {grand_total} (difference {difference})")]
    ConservationViolation {
        dimension: String,
        grand_total: f64,
        group_sum: f64,
        difference: f64,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
