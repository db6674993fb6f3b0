//! Feature construction: raw transactions to one RLFM+V vector per customer.
//!
//! Each feature has its own aggregation function below. The builder
//! groups the filtered transactions by customer and calls each of them;
//! there is no positional or name-guessing step in between.
//!
//! RULES:
//!   - "now" is captured once by the caller and shared by every customer.
//!   - The frequency semantics are chosen once per invocation and
//!     applied to every customer.
//!   - An empty filtered set is a `FeatureOutcome::NoData`, not an error.

use crate::{
    error::{SegError, SegResult},
    types::CustomerId,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Column order of the feature matrix handed to the clustering engine.
pub const FEATURE_NAMES: [&str; 5] = ["monetary", "recency", "length", "frequency", "variety"];

// ── Inputs ──────────────────────────────────────────────────────────────────

/// One raw transaction as exposed by the transaction source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub customer_id: CustomerId,
    pub amount: f64,
    pub occurred_at: DateTime<Utc>,
    pub category: Option<String>,
    pub order_id: Option<String>,
}

/// Inclusive calendar-date window. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// The whole history.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> SegResult<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(SegError::InvalidInput(format!(
                    "start_date {s} is after end_date {e}"
                )));
            }
        }
        Ok(Self { start, end })
    }

    /// First instant inside the window, as Unix seconds.
    pub fn start_bound(&self) -> Option<i64> {
        self.start.map(|d| midnight_utc(d).timestamp())
    }

    /// First instant after the window, as Unix seconds. The end date is
    /// inclusive, so this is midnight of the following day.
    pub fn end_bound_exclusive(&self) -> Option<i64> {
        self.end
            .map(|d| (midnight_utc(d) + Duration::days(1)).timestamp())
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        let ts = at.timestamp();
        self.start_bound().map_or(true, |s| ts >= s)
            && self.end_bound_exclusive().map_or(true, |e| ts < e)
    }
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Anything that can hand out the transaction history.
pub trait TransactionSource {
    /// All transactions whose timestamp falls inside `range`.
    fn transactions(&self, range: &DateRange) -> SegResult<Vec<TransactionRecord>>;
}

// ── Outputs ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerFeatureVector {
    pub customer_id: CustomerId,
    /// Sum of transaction amounts.
    pub monetary: f64,
    /// Whole days since the most recent transaction.
    pub recency: i64,
    /// Whole days between first and last transaction.
    pub length: i64,
    pub frequency: u64,
    /// Distinct product categories.
    pub variety: u64,
}

impl CustomerFeatureVector {
    /// Values in FEATURE_NAMES order.
    pub fn values(&self) -> [f64; 5] {
        [
            self.monetary,
            self.recency as f64,
            self.length as f64,
            self.frequency as f64,
            self.variety as f64,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyMode {
    /// Count of distinct order identifiers.
    DistinctOrders,
    /// Count of transaction rows.
    TransactionRows,
}

/// The feature matrix of one invocation, rows sorted by customer id.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub reference_time: DateTime<Utc>,
    pub frequency_mode: FrequencyMode,
    pub vectors: Vec<CustomerFeatureVector>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn customer_ids(&self) -> Vec<CustomerId> {
        self.vectors.iter().map(|v| v.customer_id.clone()).collect()
    }

    /// Raw (unscaled) matrix, shape (customers, FEATURE_NAMES.len()).
    pub fn to_matrix(&self) -> Array2<f64> {
        let mut m = Array2::zeros((self.vectors.len(), FEATURE_NAMES.len()));
        for (i, v) in self.vectors.iter().enumerate() {
            for (j, x) in v.values().into_iter().enumerate() {
                m[[i, j]] = x;
            }
        }
        m
    }
}

#[derive(Debug, Clone)]
pub enum FeatureOutcome {
    Built(FeatureSet),
    /// The filtered transaction set was empty.
    NoData,
}

// ── Builder ─────────────────────────────────────────────────────────────────

pub struct FeatureBuilder {
    now: DateTime<Utc>,
}

impl FeatureBuilder {
    /// `now` is the single reference instant for every recency value.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// Read the window from `source` and aggregate it.
    pub fn build(
        &self,
        source: &dyn TransactionSource,
        range: &DateRange,
    ) -> SegResult<FeatureOutcome> {
        let records = source.transactions(range)?;
        log::debug!(
            "features: {} transactions in window {:?}..{:?}",
            records.len(),
            range.start,
            range.end
        );
        Ok(self.build_from_records(&records))
    }

    pub fn build_from_records(&self, records: &[TransactionRecord]) -> FeatureOutcome {
        if records.is_empty() {
            return FeatureOutcome::NoData;
        }

        let mode = frequency_mode(records);

        let mut by_customer: BTreeMap<&str, Vec<&TransactionRecord>> = BTreeMap::new();
        for r in records {
            by_customer.entry(r.customer_id.as_str()).or_default().push(r);
        }

        let vectors = by_customer
            .into_iter()
            .map(|(customer_id, txns)| CustomerFeatureVector {
                customer_id: customer_id.to_string(),
                monetary: monetary(&txns),
                recency: recency(&txns, self.now),
                length: length(&txns),
                frequency: frequency(&txns, mode),
                variety: variety(&txns),
            })
            .collect::<Vec<_>>();

        log::info!(
            "features: {} customers from {} transactions ({:?})",
            vectors.len(),
            records.len(),
            mode
        );

        FeatureOutcome::Built(FeatureSet {
            reference_time: self.now,
            frequency_mode: mode,
            vectors,
        })
    }
}

// ── Aggregations ────────────────────────────────────────────────────────────

/// Decided once per invocation: distinct orders as soon as any
/// transaction in the set carries an order identifier.
pub fn frequency_mode(records: &[TransactionRecord]) -> FrequencyMode {
    if records.iter().any(|r| r.order_id.is_some()) {
        FrequencyMode::DistinctOrders
    } else {
        FrequencyMode::TransactionRows
    }
}

pub fn monetary(txns: &[&TransactionRecord]) -> f64 {
    txns.iter().map(|t| t.amount).sum()
}

/// Clamped at zero: a transaction stamped after `now` counts as today.
pub fn recency(txns: &[&TransactionRecord], now: DateTime<Utc>) -> i64 {
    txns.iter()
        .map(|t| t.occurred_at)
        .max()
        .map(|last| (now - last).num_days().max(0))
        .unwrap_or(0)
}

pub fn length(txns: &[&TransactionRecord]) -> i64 {
    let first = txns.iter().map(|t| t.occurred_at).min();
    let last = txns.iter().map(|t| t.occurred_at).max();
    match (first, last) {
        (Some(f), Some(l)) => (l - f).num_days(),
        _ => 0,
    }
}

/// In DistinctOrders mode a customer whose rows all lack an order id
/// still bought at least once, so the count is floored at one.
pub fn frequency(txns: &[&TransactionRecord], mode: FrequencyMode) -> u64 {
    match mode {
        FrequencyMode::TransactionRows => txns.len() as u64,
        FrequencyMode::DistinctOrders => {
            let orders: HashSet<&str> = txns
                .iter()
                .filter_map(|t| t.order_id.as_deref())
                .collect();
            (orders.len() as u64).max(1)
        }
    }
}

pub fn variety(txns: &[&TransactionRecord]) -> u64 {
    let categories: HashSet<&str> = txns
        .iter()
        .filter_map(|t| t.category.as_deref())
        .collect();
    categories.len() as u64
}
