use crate::error::{AnalyticsError, Result};
use crate::utils::{finite_or_zero, to_money};
use chrono::{Datelike, NaiveDate};
use log::warn;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Sentinel label for records with a missing, empty or whitespace-only dimension value.
pub const UNKNOWN_LABEL: &str = "Unknown";

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[schemars(description = "Invoice has been paid in full")]
    Paid,

    #[schemars(description = "Invoice has been issued and is awaiting payment")]
    Pending,

    #[schemars(description = "Invoice is past its due date without payment")]
    Overdue,

    #[schemars(description = "Invoice was voided and will not be collected")]
    Cancelled,

    #[schemars(
        description = "Record carries no payment lifecycle (e.g. an approved expense) and counts as settled"
    )]
    Settled,
}

impl RecordStatus {
    pub const ALL: [RecordStatus; 5] = [
        RecordStatus::Paid,
        RecordStatus::Pending,
        RecordStatus::Overdue,
        RecordStatus::Cancelled,
        RecordStatus::Settled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Paid => "paid",
            RecordStatus::Pending => "pending",
            RecordStatus::Overdue => "overdue",
            RecordStatus::Cancelled => "cancelled",
            RecordStatus::Settled => "settled",
        }
    }

    /// Paid invoices and settled expenses both count towards collection.
    pub fn is_settled(&self) -> bool {
        matches!(self, RecordStatus::Paid | RecordStatus::Settled)
    }

    pub fn is_outstanding(&self) -> bool {
        matches!(self, RecordStatus::Pending | RecordStatus::Overdue)
    }

    /// Maps a raw lifecycle string onto a status.
    ///
    /// Expense rows have no status column, so an absent value means settled.
    /// Unrecognized values fall back to `Pending` so they stay visible as receivables.
    pub fn from_raw(raw: Option<&str>) -> Self {
        let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
            return RecordStatus::Settled;
        };

        match value.to_ascii_lowercase().as_str() {
            "paid" => RecordStatus::Paid,
            "pending" | "sent" | "draft" => RecordStatus::Pending,
            "overdue" => RecordStatus::Overdue,
            "cancelled" | "canceled" | "void" => RecordStatus::Cancelled,
            "settled" | "approved" | "active" => RecordStatus::Settled,
            other => {
                warn!("Unrecognized record status '{}', treating as pending", other);
                RecordStatus::Pending
            }
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    #[schemars(description = "Expense or revenue category")]
    Category,

    #[schemars(description = "Operating company the record is booked against")]
    Company,

    #[schemars(description = "Invoiced client")]
    ClientName,

    #[schemars(description = "Expense payee")]
    Payee,

    #[schemars(description = "Job type or line of work")]
    JobType,

    #[schemars(description = "Department or location")]
    Department,

    #[schemars(description = "Lifecycle status, derived from the record's status field")]
    Status,

    #[schemars(description = "Currency code the amount is denominated in")]
    Currency,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Category => "category",
            Dimension::Company => "company",
            Dimension::ClientName => "client_name",
            Dimension::Payee => "payee",
            Dimension::JobType => "job_type",
            Dimension::Department => "department",
            Dimension::Status => "status",
            Dimension::Currency => "currency",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calendar month used as the bucket key for every time-based aggregation.
///
/// Ordering is chronological (year first, then month). `Display` renders the
/// locale-independent `YYYY-MM`; anything friendlier belongs to the caller.
/// Deserialization rejects months outside `1..=12`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Parts {
            year: i32,
            month: u32,
        }

        let parts = Parts::deserialize(deserializer)?;
        YearMonth::new(parts.year, parts.month).ok_or_else(|| {
            de::Error::custom(format!(
                "month {} of year {} is outside 1..=12",
                parts.month, parts.year
            ))
        })
    }
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    fn index(self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    /// Shifts by a signed number of months, carrying across year boundaries.
    /// `None` when the resulting year does not fit in an `i32`.
    pub fn offset(self, months: i32) -> Option<Self> {
        let index = self.index() + i64::from(months);
        let year = i32::try_from(index.div_euclid(12)).ok()?;
        Some(Self {
            year,
            month: index.rem_euclid(12) as u32 + 1,
        })
    }

    pub fn next(self) -> Option<Self> {
        self.offset(1)
    }

    pub fn prev(self) -> Option<Self> {
        self.offset(-1)
    }

    pub fn months_until(self, other: YearMonth) -> i64 {
        other.index() - self.index()
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        Self::from_date(date) == self
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = AnalyticsError;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            AnalyticsError::DateError(format!("Invalid month '{}'. Expected YYYY-MM", s))
        };

        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;

        YearMonth::new(year, month).ok_or_else(invalid)
    }
}

/// Trims a raw label; `None` when nothing meaningful is left.
pub fn normalize_label(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|label| !label.is_empty())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TransactionRecord {
    #[schemars(description = "Opaque unique identifier of the invoice or expense")]
    pub id: String,

    #[schemars(
        description = "Signed monetary value (line total for invoices, total for expenses). Non-finite values are read as 0."
    )]
    pub amount: f64,

    #[schemars(
        description = "Date the transaction is attributed to (issue date or expense date). The only date used for month bucketing."
    )]
    pub occurred_on: NaiveDate,

    #[schemars(description = "Lifecycle status")]
    pub status: RecordStatus,

    #[serde(default)]
    #[schemars(description = "Grouping labels keyed by dimension")]
    pub dimension_keys: BTreeMap<Dimension, Arc<str>>,

    #[serde(default)]
    #[schemars(description = "Date the invoice was paid, if it has been")]
    pub paid_on: Option<NaiveDate>,
}

impl TransactionRecord {
    pub fn new(id: impl Into<String>, amount: f64, occurred_on: NaiveDate) -> Self {
        Self {
            id: id.into(),
            amount: finite_or_zero(amount),
            occurred_on,
            status: RecordStatus::Settled,
            dimension_keys: BTreeMap::new(),
            paid_on: None,
        }
    }

    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_paid_on(mut self, paid_on: NaiveDate) -> Self {
        self.paid_on = Some(paid_on);
        self
    }

    /// Sets a dimension label. Blank labels are dropped so the record falls back to
    /// [`UNKNOWN_LABEL`] for that dimension.
    pub fn with_label(mut self, dimension: Dimension, label: &str) -> Self {
        match normalize_label(Some(label)) {
            Some(label) => {
                self.dimension_keys.insert(dimension, Arc::from(label));
            }
            None => {
                self.dimension_keys.remove(&dimension);
            }
        }
        self
    }

    /// The amount used in every aggregate; always finite.
    pub fn amount_or_zero(&self) -> f64 {
        finite_or_zero(self.amount)
    }

    /// The amount as an exact decimal, for order-independent totals.
    pub fn money(&self) -> Decimal {
        to_money(self.amount)
    }

    pub fn month(&self) -> YearMonth {
        YearMonth::from_date(self.occurred_on)
    }

    /// The grouping label for `dimension`, falling back to [`UNKNOWN_LABEL`].
    pub fn label(&self, dimension: Dimension) -> &str {
        if dimension == Dimension::Status {
            return self.status.as_str();
        }

        normalize_label(self.dimension_keys.get(&dimension).map(|label| &**label))
            .unwrap_or(UNKNOWN_LABEL)
    }
}
