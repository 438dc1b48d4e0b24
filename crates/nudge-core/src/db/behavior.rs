//! Nudge feedback events

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::{format_datetime, parse_datetime, Database};
use crate::error::Result;
use crate::insights::{FeedbackResponse, InsightKind};

/// One response to one nudge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorEvent {
    pub id: i64,
    pub user_id: String,
    pub kind: InsightKind,
    pub response: FeedbackResponse,
    /// Local hour (0-23) the response happened
    pub hour: u32,
    pub created_at: DateTime<Utc>,
}

impl Database {
    pub fn record_behavior_event(
        &self,
        user_id: &str,
        kind: InsightKind,
        response: FeedbackResponse,
        hour: u32,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO behavior_events (user_id, kind, response, hour, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                kind.as_str(),
                response.as_str(),
                hour.min(23),
                format_datetime(Utc::now())
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All feedback events for a user, oldest first
    pub fn list_behavior_events(&self, user_id: &str) -> Result<Vec<BehaviorEvent>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, kind, response, hour, created_at
            FROM behavior_events
            WHERE user_id = ?
            ORDER BY created_at, id
            "#,
        )?;

        let rows = stmt.query_map(params![user_id], |row| {
            let kind: String = row.get(2)?;
            let response: String = row.get(3)?;
            let created_at: String = row.get(5)?;
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                kind,
                response,
                row.get::<_, u32>(4)?,
                created_at,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, user_id, kind, response, hour, created_at) = row?;
            // Rows written by an older build may carry kinds we no longer know
            let (Ok(kind), Ok(response)) = (
                kind.parse::<InsightKind>(),
                response.parse::<FeedbackResponse>(),
            ) else {
                tracing::debug!(id, kind = %kind, response = %response, "Skipping unrecognized behavior event");
                continue;
            };
            events.push(BehaviorEvent {
                id,
                user_id,
                kind,
                response,
                hour,
                created_at: parse_datetime(&created_at),
            });
        }
        Ok(events)
    }
}
