//! Per-cluster statistics read back from persisted assignments.

use super::SegStore;
use crate::{
    error::SegResult,
    types::{ClusterLabel, CustomerId, RunId},
};
use rusqlite::params;
use serde::Serialize;

/// Raw per-cluster figures that segment classification works from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterStats {
    pub cluster_label: ClusterLabel,
    /// Mean transaction amount across the cluster's transactions.
    pub avg_spend: f64,
    pub transaction_count: i64,
    pub customer_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterCustomer {
    pub customer_id: CustomerId,
    pub name: Option<String>,
    pub total_spend: f64,
}

impl SegStore {
    /// Join the run's assignments with the full transaction history,
    /// grouped by label. Customers without transactions contribute nothing.
    pub fn cluster_stats(&self, run_id: RunId) -> SegResult<Vec<ClusterStats>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.cluster_label, AVG(t.amount), COUNT(t.id), COUNT(DISTINCT a.customer_id)
             FROM cluster_assignment a
             JOIN transactions t ON t.customer_id = a.customer_id
             WHERE a.run_id = ?1
             GROUP BY a.cluster_label
             ORDER BY a.cluster_label ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |r| {
                Ok(ClusterStats {
                    cluster_label: r.get(0)?,
                    avg_spend: r.get(1)?,
                    transaction_count: r.get(2)?,
                    customer_count: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Members of one cluster with their lifetime spend, biggest first.
    pub fn cluster_customers(
        &self,
        run_id: RunId,
        cluster_label: ClusterLabel,
    ) -> SegResult<Vec<ClusterCustomer>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.customer_id, c.name, COALESCE(SUM(t.amount), 0.0) AS total_spend
             FROM cluster_assignment a
             JOIN customer c ON c.customer_id = a.customer_id
             LEFT JOIN transactions t ON t.customer_id = c.customer_id
             WHERE a.run_id = ?1 AND a.cluster_label = ?2
             GROUP BY c.customer_id, c.name
             ORDER BY total_spend DESC, c.customer_id ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id, cluster_label], |r| {
                Ok(ClusterCustomer {
                    customer_id: r.get(0)?,
                    name: r.get(1)?,
                    total_spend: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
