//! Segment classification: per-cluster statistics to ranked strategies.
//!
//! Thresholds are relative to the run being classified. For each run the
//! 25th and 75th percentile of cluster average spend and of cluster
//! frequency are the benchmarks; a cluster's segment depends only on
//! where it falls against them.

use crate::{
    error::{SegError, SegResult},
    segment::{Priority, SegmentKey},
    store::{ClusterStats, SegStore},
    types::{ClusterLabel, RunId},
};
use serde::Serialize;

/// Run-relative percentile benchmarks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Benchmarks {
    pub spend_p25: f64,
    pub spend_p75: f64,
    pub frequency_p25: f64,
    pub frequency_p75: f64,
}

impl Benchmarks {
    /// `None` when there are no clusters to compare.
    pub fn from_clusters(clusters: &[(f64, f64)]) -> Option<Self> {
        let spend: Vec<f64> = clusters.iter().map(|c| c.0).collect();
        let freq: Vec<f64> = clusters.iter().map(|c| c.1).collect();
        Some(Self {
            spend_p25: quantile(&spend, 0.25)?,
            spend_p75: quantile(&spend, 0.75)?,
            frequency_p25: quantile(&freq, 0.25)?,
            frequency_p75: quantile(&freq, 0.75)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentStrategy {
    pub cluster_label: ClusterLabel,
    pub segment_key: SegmentKey,
    pub segment_name: &'static str,
    pub avg_spend: f64,
    /// Transactions per customer, rounded to two decimals.
    pub frequency: f64,
    pub customer_count: i64,
    pub transaction_count: i64,
    pub priority: Priority,
    pub recommended_actions: &'static [&'static str],
    pub message_template: &'static str,
    pub explanation: String,
}

/// Linear interpolation between closest ranks, position q * (n - 1).
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

/// The decision tree over spend and frequency.
pub fn classify(avg_spend: f64, frequency: f64, b: &Benchmarks) -> SegmentKey {
    if avg_spend >= b.spend_p75 {
        if frequency >= b.frequency_p75 {
            SegmentKey::Vip
        } else {
            SegmentKey::AtRisk
        }
    } else if avg_spend >= b.spend_p25 {
        if frequency >= b.frequency_p75 {
            SegmentKey::Loyal
        } else if frequency >= b.frequency_p25 {
            SegmentKey::Regular
        } else {
            SegmentKey::New
        }
    } else if frequency >= b.frequency_p75 {
        SegmentKey::Loyal
    } else {
        SegmentKey::LowValue
    }
}

fn frequency_of(stats: &ClusterStats) -> f64 {
    if stats.customer_count > 0 {
        stats.transaction_count as f64 / stats.customer_count as f64
    } else {
        0.0
    }
}

/// Classify already-computed cluster statistics. Output is ordered by
/// priority rank, then cluster label.
pub fn classify_clusters(stats: &[ClusterStats]) -> Vec<SegmentStrategy> {
    let points: Vec<(f64, f64)> = stats.iter().map(|s| (s.avg_spend, frequency_of(s))).collect();
    let Some(benchmarks) = Benchmarks::from_clusters(&points) else {
        return Vec::new();
    };

    let mut strategies: Vec<SegmentStrategy> = stats
        .iter()
        .zip(&points)
        .map(|(s, &(avg_spend, frequency))| {
            let key = classify(avg_spend, frequency, &benchmarks);
            let template = key.template();
            SegmentStrategy {
                cluster_label: s.cluster_label,
                segment_key: key,
                segment_name: template.display_name,
                avg_spend,
                frequency: (frequency * 100.0).round() / 100.0,
                customer_count: s.customer_count,
                transaction_count: s.transaction_count,
                priority: template.priority,
                recommended_actions: template.actions,
                message_template: template.message_template,
                explanation: format!(
                    "Spend: ${avg_spend:.0} (Benchmark: >${:.0}), Freq: {frequency:.1} (Benchmark: >{:.1})",
                    benchmarks.spend_p75, benchmarks.frequency_p75
                ),
            }
        })
        .collect();

    strategies.sort_by_key(|s| (s.priority.rank(), s.cluster_label));
    strategies
}

pub struct SegmentClassifier<'a> {
    store: &'a SegStore,
}

impl<'a> SegmentClassifier<'a> {
    pub fn new(store: &'a SegStore) -> Self {
        Self { store }
    }

    /// Read-only: classifying the same run twice gives the same list.
    pub fn classify_run(&self, run_id: RunId) -> SegResult<Vec<SegmentStrategy>> {
        if self.store.get_run(run_id)?.is_none() {
            return Err(SegError::RunNotFound { run_id });
        }
        let stats = self.store.cluster_stats(run_id)?;
        let strategies = classify_clusters(&stats);
        log::info!(
            "run_id={run_id} classify: {} clusters, {} with priority high",
            strategies.len(),
            strategies
                .iter()
                .filter(|s| s.priority == Priority::High)
                .count()
        );
        Ok(strategies)
    }
}
