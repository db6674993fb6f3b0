//! Customer and transaction history queries.

use super::SegStore;
use crate::{
    error::SegResult,
    features::{DateRange, TransactionRecord, TransactionSource},
};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::params;
use serde::Serialize;

/// Data-quality overview of the loaded history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSummary {
    pub total_customers: i64,
    pub total_transactions: i64,
    pub total_revenue: f64,
    pub avg_transaction_value: f64,
    pub first_transaction: Option<DateTime<Utc>>,
    pub last_transaction: Option<DateTime<Utc>>,
    pub missing_categories: i64,
}

impl SegStore {
    /// Insert a customer, or refresh its name if it already exists.
    pub fn upsert_customer(
        &self,
        customer_id: &str,
        name: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> SegResult<()> {
        self.conn.execute(
            "INSERT INTO customer (customer_id, name, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(customer_id) DO UPDATE SET name = COALESCE(excluded.name, customer.name)",
            params![customer_id, name, created_at.timestamp()],
        )?;
        Ok(())
    }

    pub fn insert_transaction(&self, txn: &TransactionRecord) -> SegResult<i64> {
        self.conn.execute(
            "INSERT INTO transactions (customer_id, order_id, occurred_at, amount, category)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                txn.customer_id,
                txn.order_id,
                txn.occurred_at.timestamp(),
                txn.amount,
                txn.category,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn customer_count(&self) -> SegResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM customer", [], |r| r.get(0))?)
    }

    pub fn transaction_count(&self) -> SegResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))?)
    }

    /// Transactions inside `range`, oldest first.
    pub fn transactions_in_range(&self, range: &DateRange) -> SegResult<Vec<TransactionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, amount, occurred_at, category, order_id
             FROM transactions
             WHERE (?1 IS NULL OR occurred_at >= ?1)
               AND (?2 IS NULL OR occurred_at < ?2)
             ORDER BY occurred_at ASC, id ASC",
        )?;
        let records = stmt
            .query_map(
                params![range.start_bound(), range.end_bound_exclusive()],
                |row| {
                    Ok(TransactionRecord {
                        customer_id: row.get(0)?,
                        amount: row.get(1)?,
                        occurred_at: from_unix(row.get(2)?),
                        category: row.get(3)?,
                        order_id: row.get(4)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn data_summary(&self) -> SegResult<DataSummary> {
        let total_customers = self.customer_count()?;
        let (total_transactions, total_revenue, first, last, missing_categories) =
            self.conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(amount), 0.0), MIN(occurred_at), MAX(occurred_at),
                        COALESCE(SUM(CASE WHEN category IS NULL OR category = '' THEN 1 ELSE 0 END), 0)
                 FROM transactions",
                [],
                |r| {
                    Ok((
                        r.get::<_, i64>(0)?,
                        r.get::<_, f64>(1)?,
                        r.get::<_, Option<i64>>(2)?,
                        r.get::<_, Option<i64>>(3)?,
                        r.get::<_, i64>(4)?,
                    ))
                },
            )?;
        let avg_transaction_value = if total_transactions > 0 {
            total_revenue / total_transactions as f64
        } else {
            0.0
        };
        Ok(DataSummary {
            total_customers,
            total_transactions,
            total_revenue,
            avg_transaction_value,
            first_transaction: first.map(from_unix),
            last_transaction: last.map(from_unix),
            missing_categories,
        })
    }

    /// Revenue per calendar month ("YYYY-MM"), oldest first.
    pub fn monthly_revenue(&self) -> SegResult<Vec<(String, f64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT strftime('%Y-%m', occurred_at, 'unixepoch') AS month, SUM(amount)
             FROM transactions
             GROUP BY month
             ORDER BY month ASC",
        )?;
        let rows = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Transaction count per category; missing categories group as "Uncategorized".
    pub fn category_breakdown(&self) -> SegResult<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT COALESCE(NULLIF(category, ''), 'Uncategorized') AS name, COUNT(*)
             FROM transactions
             GROUP BY name
             ORDER BY COUNT(*) DESC, name ASC",
        )?;
        let rows = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl TransactionSource for SegStore {
    fn transactions(&self, range: &DateRange) -> SegResult<Vec<TransactionRecord>> {
        self.transactions_in_range(range)
    }
}

pub(crate) fn from_unix(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
