//! Salary operations

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use super::{parse_date, parse_datetime, Database};
use crate::error::Result;
use crate::models::{NewSalary, Salary};

const SALARY_COLUMNS: &str = "id, user_id, amount, frequency, effective_date, created_at";

impl Database {
    /// Record a salary
    pub fn insert_salary(&self, user_id: &str, salary: &NewSalary) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO salaries (user_id, amount, frequency, effective_date) VALUES (?, ?, ?, ?)",
            params![
                user_id,
                salary.amount,
                salary.frequency.as_str(),
                salary.effective_date.to_string()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// List a user's salary history, newest first
    pub fn list_salaries(&self, user_id: &str) -> Result<Vec<Salary>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM salaries WHERE user_id = ? ORDER BY effective_date DESC, id DESC",
            SALARY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id], Self::row_to_salary)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// The salary currently in effect
    pub fn latest_salary(&self, user_id: &str) -> Result<Option<Salary>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM salaries WHERE user_id = ? ORDER BY effective_date DESC, id DESC LIMIT 1",
            SALARY_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![user_id], Self::row_to_salary)
            .optional()?)
    }

    /// The salary in effect on a given day, ignoring later raises
    pub fn salary_as_of(&self, user_id: &str, date: NaiveDate) -> Result<Option<Salary>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM salaries WHERE user_id = ? AND effective_date <= ?
             ORDER BY effective_date DESC, id DESC LIMIT 1",
            SALARY_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![user_id, date.to_string()], Self::row_to_salary)
            .optional()?)
    }

    fn row_to_salary(row: &rusqlite::Row) -> rusqlite::Result<Salary> {
        let frequency: String = row.get(3)?;
        let effective_date: String = row.get(4)?;
        let created_at: String = row.get(5)?;
        Ok(Salary {
            id: row.get(0)?,
            user_id: row.get(1)?,
            amount: row.get(2)?,
            frequency: frequency.parse().unwrap_or_default(),
            effective_date: parse_date(&effective_date)?,
            created_at: parse_datetime(&created_at),
        })
    }
}
