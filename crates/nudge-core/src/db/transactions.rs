//! Transaction operations

use chrono::NaiveDate;
use rusqlite::params;

use super::{parse_date, parse_datetime, Database};
use crate::error::Result;
use crate::models::{NewTransaction, Transaction};

const TRANSACTION_COLUMNS: &str = "id, user_id, date, amount, merchant, category, raw_category, mood, hour, source, import_hash, created_at";

impl Database {
    /// Insert a transaction (skips duplicates based on import_hash)
    ///
    /// Returns the new row id, or `None` when the user already has an
    /// identical transaction.
    pub fn insert_transaction(&self, user_id: &str, tx: &NewTransaction) -> Result<Option<i64>> {
        let conn = self.conn()?;
        let hash = tx.import_hash(user_id);

        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO transactions
                (user_id, date, amount, merchant, category, raw_category, mood, hour, source, import_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                tx.date.to_string(),
                tx.amount,
                tx.merchant,
                tx.category.as_str(),
                tx.raw_category,
                tx.mood.map(|m| m.as_str()),
                tx.hour,
                tx.source.as_str(),
                hash,
            ],
        )?;

        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(conn.last_insert_rowid()))
    }

    /// Insert many transactions, returning (inserted, duplicates)
    pub fn insert_transactions(
        &self,
        user_id: &str,
        txs: &[NewTransaction],
    ) -> Result<(usize, usize)> {
        let mut inserted = 0;
        let mut duplicates = 0;
        for tx in txs {
            match self.insert_transaction(user_id, tx)? {
                Some(_) => inserted += 1,
                None => duplicates += 1,
            }
        }
        tracing::debug!(user_id, inserted, duplicates, "Inserted transaction batch");
        Ok((inserted, duplicates))
    }

    /// List a user's transactions in an inclusive date range, oldest first
    pub fn list_transactions_between(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM transactions WHERE user_id = ? AND date >= ? AND date <= ? ORDER BY date, id",
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![user_id, from.to_string(), to.to_string()],
            Self::row_to_transaction,
        )?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Most recent transactions for a user, newest first
    pub fn recent_transactions(&self, user_id: &str, limit: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM transactions WHERE user_id = ? ORDER BY date DESC, id DESC LIMIT ?",
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id, limit], Self::row_to_transaction)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Count a user's transactions
    pub fn count_transactions(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Delete a single transaction
    pub fn delete_transaction(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM transactions WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }

    fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
        let date: String = row.get(2)?;
        let category: String = row.get(5)?;
        let mood: Option<String> = row.get(7)?;
        let source: String = row.get(9)?;
        let created_at: String = row.get(11)?;

        Ok(Transaction {
            id: row.get(0)?,
            user_id: row.get(1)?,
            date: parse_date(&date)?,
            amount: row.get(3)?,
            merchant: row.get(4)?,
            category: category.parse().unwrap_or(crate::models::Category::Other),
            raw_category: row.get(6)?,
            mood: mood.and_then(|m| m.parse().ok()),
            hour: row.get(8)?,
            source: source.parse().unwrap_or_default(),
            import_hash: row.get(10)?,
            created_at: parse_datetime(&created_at),
        })
    }
}
