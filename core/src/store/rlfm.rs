//! The stored RLFM snapshot: one row per customer, replaced wholesale.

use super::{transactions::from_unix, SegStore};
use crate::{error::SegResult, features::CustomerFeatureVector, types::CustomerId};
use chrono::{DateTime, Utc};
use rusqlite::{params, Transaction, TransactionBehavior};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RlfmRow {
    pub customer_id: CustomerId,
    pub recency: i64,
    pub length: i64,
    pub frequency: i64,
    pub monetary: f64,
    pub variety: i64,
    pub computed_at: DateTime<Utc>,
}

impl SegStore {
    /// Delete every snapshot row and insert `vectors`, in one transaction.
    pub fn replace_rlfm_snapshot(
        &self,
        vectors: &[CustomerFeatureVector],
        computed_at: DateTime<Utc>,
    ) -> SegResult<usize> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM customer_rlfm", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO customer_rlfm
                    (customer_id, recency, length, frequency, monetary, variety, computed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for v in vectors {
                stmt.execute(params![
                    v.customer_id,
                    v.recency,
                    v.length,
                    v.frequency as i64,
                    v.monetary,
                    v.variety as i64,
                    computed_at.timestamp(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(vectors.len())
    }

    pub fn rlfm_count(&self) -> SegResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM customer_rlfm", [], |r| r.get(0))?)
    }

    /// One page of the snapshot, ordered by customer id.
    pub fn rlfm_page(&self, offset: usize, limit: usize) -> SegResult<Vec<RlfmRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, recency, length, frequency, monetary, variety, computed_at
             FROM customer_rlfm
             ORDER BY customer_id ASC
             LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt
            .query_map(params![limit as i64, offset as i64], |r| {
                Ok(RlfmRow {
                    customer_id: r.get(0)?,
                    recency: r.get(1)?,
                    length: r.get(2)?,
                    frequency: r.get(3)?,
                    monetary: r.get(4)?,
                    variety: r.get(5)?,
                    computed_at: from_unix(r.get(6)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
