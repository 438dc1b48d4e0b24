//! Nudge operations

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::insights::Insight;
use crate::models::{Nudge, NudgeStatus};

const NUDGE_COLUMNS: &str =
    "id, user_id, insight_id, kind, title, message, priority, status, created_at, delivered_at, responded_at";

impl Database {
    /// Create a pending nudge from an insight
    pub fn insert_nudge(
        &self,
        user_id: &str,
        insight_id: Option<i64>,
        insight: &Insight,
    ) -> Result<Nudge> {
        let conn = self.conn()?;
        let now = Utc::now();
        conn.execute(
            r#"
            INSERT INTO nudges (user_id, insight_id, kind, title, message, priority, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 'pending', ?)
            "#,
            params![
                user_id,
                insight_id,
                insight.kind.as_str(),
                insight.title,
                insight.message,
                insight.priority.as_str(),
                format_datetime(now)
            ],
        )?;

        Ok(Nudge {
            id: conn.last_insert_rowid(),
            user_id: user_id.to_string(),
            insight_id,
            kind: insight.kind.as_str().to_string(),
            title: insight.title.clone(),
            message: insight.message.clone(),
            priority: insight.priority.as_str().to_string(),
            status: NudgeStatus::Pending,
            created_at: now,
            delivered_at: None,
            responded_at: None,
        })
    }

    /// List a user's nudges, newest first
    pub fn list_nudges(
        &self,
        user_id: &str,
        status: Option<NudgeStatus>,
        limit: i64,
    ) -> Result<Vec<Nudge>> {
        let conn = self.conn()?;

        let nudges = if let Some(s) = status {
            let sql = format!(
                "SELECT {} FROM nudges WHERE user_id = ? AND status = ? ORDER BY created_at DESC, id DESC LIMIT ?",
                NUDGE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![user_id, s.as_str(), limit], Self::row_to_nudge)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            let sql = format!(
                "SELECT {} FROM nudges WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
                NUDGE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![user_id, limit], Self::row_to_nudge)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        Ok(nudges)
    }

    pub fn get_nudge(&self, id: i64) -> Result<Option<Nudge>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM nudges WHERE id = ?", NUDGE_COLUMNS);
        Ok(conn.query_row(&sql, params![id], Self::row_to_nudge).optional()?)
    }

    /// Mark a nudge as pushed to a live connection
    pub fn mark_nudge_delivered(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE nudges SET status = 'delivered', delivered_at = ? WHERE id = ? AND status = 'pending'",
            params![format_datetime(Utc::now()), id],
        )?;
        Ok(())
    }

    /// Record the user's response to a nudge
    ///
    /// Only pending or delivered nudges can be answered; a second answer is
    /// a [`Error::Conflict`].
    pub fn respond_nudge(
        &self,
        id: i64,
        response: NudgeStatus,
        now: DateTime<Utc>,
    ) -> Result<Nudge> {
        if matches!(response, NudgeStatus::Pending | NudgeStatus::Delivered) {
            return Err(Error::InvalidData(format!(
                "'{}' is not a nudge response",
                response.as_str()
            )));
        }

        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE nudges SET status = ?, responded_at = ?
             WHERE id = ? AND status IN ('pending', 'delivered')",
            params![response.as_str(), format_datetime(now), id],
        )?;
        drop(conn);

        let nudge = self
            .get_nudge(id)?
            .ok_or_else(|| Error::NotFound(format!("nudge {}", id)))?;
        if updated == 0 {
            return Err(Error::Conflict(format!(
                "nudge {} was already answered ({})",
                id,
                nudge.status.as_str()
            )));
        }
        Ok(nudge)
    }

    fn row_to_nudge(row: &rusqlite::Row) -> rusqlite::Result<Nudge> {
        let status: String = row.get(7)?;
        let created_at: String = row.get(8)?;
        let delivered_at: Option<String> = row.get(9)?;
        let responded_at: Option<String> = row.get(10)?;
        Ok(Nudge {
            id: row.get(0)?,
            user_id: row.get(1)?,
            insight_id: row.get(2)?,
            kind: row.get(3)?,
            title: row.get(4)?,
            message: row.get(5)?,
            priority: row.get(6)?,
            status: status.parse().unwrap_or(NudgeStatus::Pending),
            created_at: parse_datetime(&created_at),
            delivered_at: delivered_at.map(|s| parse_datetime(&s)),
            responded_at: responded_at.map(|s| parse_datetime(&s)),
        })
    }
}
