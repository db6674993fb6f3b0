//! RLFM snapshot: the latest feature vector of every customer, stored.
//!
//! A recompute reads the whole unfiltered history, builds features with
//! one reference "now", then replaces the stored table in a single
//! transaction. Readers never observe a half-written snapshot.

use crate::{
    error::{SegError, SegResult},
    features::{DateRange, FeatureBuilder, FeatureOutcome},
    store::{RlfmRow, SegStore},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One page of the stored snapshot plus the total row count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RlfmPage {
    pub total: i64,
    pub rows: Vec<RlfmRow>,
}

/// Recompute and store the snapshot. Returns the number of customers
/// written. Empty history is an error and leaves the old snapshot alone.
pub fn recompute(store: &SegStore, now: DateTime<Utc>) -> SegResult<usize> {
    let features = match FeatureBuilder::new(now).build(store, &DateRange::unbounded())? {
        FeatureOutcome::Built(f) => f,
        FeatureOutcome::NoData => {
            return Err(SegError::NoData(
                "no transactions; RLFM snapshot left unchanged".into(),
            ))
        }
    };
    let written = store.replace_rlfm_snapshot(&features.vectors, now)?;
    log::info!("rlfm snapshot: {written} customers at {}", now.to_rfc3339());
    Ok(written)
}

pub fn page(store: &SegStore, offset: usize, limit: usize) -> SegResult<RlfmPage> {
    Ok(RlfmPage {
        total: store.rlfm_count()?,
        rows: store.rlfm_page(offset, limit)?,
    })
}
