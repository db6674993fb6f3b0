//! Clustering runs and their per-customer assignments.

use super::{transactions::from_unix, SegStore};
use crate::{
    error::SegResult,
    types::{ClusterLabel, CustomerId, RunId},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};
use serde::Serialize;

/// A run about to be written.
#[derive(Debug, Clone)]
pub struct NewRun<'a> {
    pub run_name: &'a str,
    pub algorithm: &'a str,
    pub parameters: &'a serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub model_artifact: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub run_name: String,
    pub algorithm: String,
    pub parameters: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub model_artifact: Option<String>,
}

/// A run plus how many customers it labelled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    #[serde(flatten)]
    pub run: RunRecord,
    pub customer_count: i64,
}

type RawRun = (RunId, String, String, String, i64, Option<String>);

fn into_record(raw: RawRun) -> SegResult<RunRecord> {
    let (run_id, run_name, algorithm, parameters, created_at, model_artifact) = raw;
    Ok(RunRecord {
        run_id,
        run_name,
        algorithm,
        parameters: serde_json::from_str(&parameters)?,
        created_at: from_unix(created_at),
        model_artifact,
    })
}

impl SegStore {
    /// Write the run row and every assignment in one IMMEDIATE transaction.
    /// Any failing insert rolls the whole run back.
    pub fn insert_run_with_assignments<'c>(
        &self,
        run: &NewRun<'_>,
        assignments: impl IntoIterator<Item = (&'c str, ClusterLabel)>,
    ) -> SegResult<RunId> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO cluster_run (run_name, algorithm, parameters, created_at, model_artifact)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run.run_name,
                run.algorithm,
                serde_json::to_string(run.parameters)?,
                run.created_at.timestamp(),
                run.model_artifact,
            ],
        )?;
        let run_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO cluster_assignment (run_id, customer_id, cluster_label)
                 VALUES (?1, ?2, ?3)",
            )?;
            for (customer_id, label) in assignments {
                stmt.execute(params![run_id, customer_id, label])?;
            }
        }
        tx.commit()?;
        Ok(run_id)
    }

    pub fn get_run(&self, run_id: RunId) -> SegResult<Option<RunRecord>> {
        let raw: Option<RawRun> = self
            .conn
            .query_row(
                "SELECT run_id, run_name, algorithm, parameters, created_at, model_artifact
                 FROM cluster_run WHERE run_id = ?1",
                params![run_id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?)),
            )
            .optional()?;
        raw.map(into_record).transpose()
    }

    /// Every run, newest first, with its assignment count.
    pub fn list_runs(&self) -> SegResult<Vec<RunSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.run_id, r.run_name, r.algorithm, r.parameters, r.created_at, r.model_artifact,
                    (SELECT COUNT(*) FROM cluster_assignment a WHERE a.run_id = r.run_id)
             FROM cluster_run r
             ORDER BY r.created_at DESC, r.run_id DESC",
        )?;
        let rows = stmt
            .query_map([], |r| {
                let raw: RawRun = (r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?);
                Ok((raw, r.get::<_, i64>(6)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(raw, customer_count)| {
                Ok(RunSummary {
                    run: into_record(raw)?,
                    customer_count,
                })
            })
            .collect()
    }

    /// Delete a run and its assignments. Returns false if it did not exist.
    pub fn delete_run(&self, run_id: RunId) -> SegResult<bool> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "DELETE FROM cluster_assignment WHERE run_id = ?1",
            params![run_id],
        )?;
        let deleted = tx.execute("DELETE FROM cluster_run WHERE run_id = ?1", params![run_id])?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    /// Assignments of one run, ordered by customer id.
    pub fn assignments(&self, run_id: RunId) -> SegResult<Vec<(CustomerId, ClusterLabel)>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, cluster_label FROM cluster_assignment
             WHERE run_id = ?1 ORDER BY customer_id ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn run_count(&self) -> SegResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM cluster_run", [], |r| r.get(0))?)
    }
}
