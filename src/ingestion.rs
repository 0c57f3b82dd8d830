use crate::error::{AnalyticsError, Result};
use crate::schema::{normalize_label, Dimension, RecordStatus, TransactionRecord};
use crate::utils::{finite_or_zero, parse_date};
use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// A row as returned by the record store, before any normalization.
///
/// Invoices and expenses name their columns differently, so the common
/// spellings are accepted as aliases. Every other column is kept in `fields`
/// and mined for dimension labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(alias = "ID")]
    pub id: String,

    #[serde(default, alias = "line_total", alias = "total", alias = "Total")]
    pub amount: Value,

    #[serde(
        default,
        alias = "date_issued",
        alias = "expense_date",
        alias = "date",
        alias = "Date"
    )]
    pub occurred_on: Option<String>,

    #[serde(default, alias = "invoice_status")]
    pub status: Option<String>,

    #[serde(default, alias = "date_paid")]
    pub paid_on: Option<String>,

    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

/// Hands out one shared allocation per distinct label within a batch.
#[derive(Debug, Default)]
pub struct LabelInterner {
    labels: HashSet<Arc<str>>,
}

impl LabelInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, label: &str) -> Arc<str> {
        if let Some(existing) = self.labels.get(label) {
            return Arc::clone(existing);
        }
        let label: Arc<str> = Arc::from(label);
        self.labels.insert(Arc::clone(&label));
        label
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Maps a source column name onto the dimension it feeds.
pub fn dimension_for_field(field: &str) -> Option<Dimension> {
    match field.to_ascii_lowercase().as_str() {
        "category" | "expense_category" => Some(Dimension::Category),
        "company" | "company_name" => Some(Dimension::Company),
        "client_name" | "client" => Some(Dimension::ClientName),
        "payee" | "vendor" => Some(Dimension::Payee),
        "job_type" | "type" => Some(Dimension::JobType),
        "department" | "location" | "location_id" => Some(Dimension::Department),
        "currency" | "currency_code" => Some(Dimension::Currency),
        _ => None,
    }
}

/// Reads a monetary value out of a loosely typed column.
///
/// Strings may carry currency symbols, thousands separators and accounting-style
/// parentheses for negatives. Returns `None` for anything that is not a finite number.
pub fn parse_amount(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let trimmed = text.trim();
            let (negative, body) = match trimmed
                .strip_prefix('(')
                .and_then(|rest| rest.strip_suffix(')'))
            {
                Some(inner) => (true, inner),
                None => (false, trimmed),
            };
            let cleaned: String = body
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | ' ' | '_'))
                .collect();
            cleaned
                .parse::<f64>()
                .ok()
                .map(|amount| if negative { -amount } else { amount })
        }
        _ => None,
    };

    parsed.filter(|amount| amount.is_finite())
}

/// Like [`parse_amount`], but malformed values become `0.0`.
pub fn coerce_amount(value: &Value) -> f64 {
    finite_or_zero(parse_amount(value).unwrap_or(0.0))
}

fn label_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => normalize_label(Some(text.as_str())).map(str::to_string),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

impl RawRecord {
    pub fn into_record(self, interner: &mut LabelInterner) -> Result<TransactionRecord> {
        let occurred_on = match self.occurred_on.as_deref() {
            Some(raw) => parse_date(raw).map_err(|e| AnalyticsError::InvalidRecord {
                id: self.id.clone(),
                details: e.to_string(),
            })?,
            None => {
                return Err(AnalyticsError::InvalidRecord {
                    id: self.id,
                    details: "Missing transaction date".to_string(),
                })
            }
        };

        let amount = match parse_amount(&self.amount) {
            Some(amount) => amount,
            None => {
                if !self.amount.is_null() {
                    debug!(
                        "Record {} has non-numeric amount {}, counting it as 0",
                        self.id, self.amount
                    );
                }
                0.0
            }
        };

        let mut record = TransactionRecord::new(self.id, amount, occurred_on)
            .with_status(RecordStatus::from_raw(self.status.as_deref()));

        if let Some(raw) = normalize_label(self.paid_on.as_deref()) {
            match parse_date(raw) {
                Ok(paid_on) => record.paid_on = Some(paid_on),
                Err(e) => warn!("Ignoring payment date on record {}: {}", record.id, e),
            }
        }

        for (field, value) in &self.fields {
            let Some(dimension) = dimension_for_field(field) else {
                continue;
            };
            if record.dimension_keys.contains_key(&dimension) {
                continue;
            }
            if let Some(label) = label_text(value) {
                record
                    .dimension_keys
                    .insert(dimension, interner.intern(&label));
            }
        }

        Ok(record)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SkippedRecord {
    pub id: String,
    pub reason: String,
}

/// Result of normalizing a batch: the usable records in input order, plus
/// every row that was dropped and why.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestionOutcome {
    pub records: Vec<TransactionRecord>,
    pub skipped: Vec<SkippedRecord>,
}

impl IngestionOutcome {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Normalizes a batch of raw rows.
///
/// A row without a usable date cannot be placed in any period; it is logged,
/// reported in [`IngestionOutcome::skipped`] and the rest of the batch goes on.
pub fn ingest_records(rows: Vec<RawRecord>) -> IngestionOutcome {
    let mut interner = LabelInterner::new();
    let mut outcome = IngestionOutcome::default();

    for row in rows {
        match row.into_record(&mut interner) {
            Ok(record) => outcome.records.push(record),
            Err(AnalyticsError::InvalidRecord { id, details }) => {
                warn!("Skipping record {}: {}", id, details);
                outcome.skipped.push(SkippedRecord { id, reason: details });
            }
            Err(e) => {
                warn!("Skipping record: {}", e);
                outcome.skipped.push(SkippedRecord {
                    id: String::new(),
                    reason: e.to_string(),
                });
            }
        }
    }

    debug!(
        "Ingested {} records ({} skipped) with {} distinct labels",
        outcome.records.len(),
        outcome.skipped.len(),
        interner.len()
    );

    outcome
}

/// Parses a JSON array of rows and normalizes them. Only malformed JSON fails
/// the whole batch.
pub fn ingest_json(json: &str) -> Result<IngestionOutcome> {
    let rows: Vec<RawRecord> = serde_json::from_str(json)?;
    Ok(ingest_records(rows))
}
