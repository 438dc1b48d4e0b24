//! Persisted insight operations

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};

use super::{format_datetime, parse_datetime, Database};
use crate::error::Result;
use crate::insights::{
    Insight, InsightKind, InsightState, InsightStatus, Priority, StoredInsight, UpsertOutcome,
};

const INSIGHT_COLUMNS: &str = r#"
    id, user_id, template_id, kind, priority, dedupe_key, subject, title, message, action,
    score, data, first_generated_at, last_generated_at, status, snoozed_until, user_feedback
"#;

/// Active insights first by priority, then most recent
const PRIORITY_ORDER: &str = r#"
    CASE priority
        WHEN 'critical' THEN 1
        WHEN 'high' THEN 2
        WHEN 'medium' THEN 3
        ELSE 4
    END,
    score DESC,
    last_generated_at DESC
"#;

impl Database {
    /// Upsert an insight by its per-user dedupe key
    ///
    /// An existing row gets refreshed content and `last_generated_at`; its
    /// status is kept, except that an expired snooze flips back to active.
    pub fn upsert_insight(&self, user_id: &str, insight: &Insight) -> Result<UpsertOutcome> {
        let conn = self.conn()?;

        let data_json = serde_json::to_string(&insight.data)?;
        let generated_at = format_datetime(insight.generated_at);

        let updated = conn.execute(
            r#"
            UPDATE insights
            SET last_generated_at = ?,
                priority = ?,
                title = ?,
                message = ?,
                action = ?,
                score = ?,
                data = ?,
                status = CASE WHEN status = 'snoozed' AND snoozed_until < ? THEN 'active' ELSE status END
            WHERE user_id = ? AND dedupe_key = ?
            "#,
            params![
                generated_at,
                insight.priority.as_str(),
                insight.title,
                insight.message,
                insight.action,
                insight.score,
                data_json,
                generated_at,
                user_id,
                insight.dedupe_key
            ],
        )?;

        if updated > 0 {
            let (id, status): (i64, String) = conn.query_row(
                "SELECT id, status FROM insights WHERE user_id = ? AND dedupe_key = ?",
                params![user_id, insight.dedupe_key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            return Ok(UpsertOutcome {
                id,
                created: false,
                status: status.parse().unwrap_or(InsightStatus::Active),
            });
        }

        conn.execute(
            r#"
            INSERT INTO insights (
                user_id, template_id, kind, priority, dedupe_key, subject, title, message, action,
                score, data, first_generated_at, last_generated_at, status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'active')
            "#,
            params![
                user_id,
                insight.template_id,
                insight.kind.as_str(),
                insight.priority.as_str(),
                insight.dedupe_key,
                insight.subject,
                insight.title,
                insight.message,
                insight.action,
                insight.score,
                data_json,
                generated_at,
                generated_at
            ],
        )?;

        Ok(UpsertOutcome {
            id: conn.last_insert_rowid(),
            created: true,
            status: InsightStatus::Active,
        })
    }

    /// List a user's insights with an optional status filter
    pub fn list_insights(
        &self,
        user_id: &str,
        status: Option<InsightStatus>,
    ) -> Result<Vec<StoredInsight>> {
        let conn = self.conn()?;

        let insights = if let Some(s) = status {
            let sql = format!(
                "SELECT {} FROM insights WHERE user_id = ? AND status = ? ORDER BY {}",
                INSIGHT_COLUMNS, PRIORITY_ORDER
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![user_id, s.as_str()], Self::row_to_insight)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            let sql = format!(
                "SELECT {} FROM insights WHERE user_id = ? ORDER BY {}",
                INSIGHT_COLUMNS, PRIORITY_ORDER
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![user_id], Self::row_to_insight)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        Ok(insights)
    }

    /// Top N insights that should currently be shown
    pub fn top_insights(&self, user_id: &str, limit: usize) -> Result<Vec<StoredInsight>> {
        let conn = self.conn()?;
        let now = format_datetime(Utc::now());
        let sql = format!(
            r#"
            SELECT {} FROM insights
            WHERE user_id = ?
              AND (status = 'active' OR (status = 'snoozed' AND snoozed_until < ?))
            ORDER BY {}
            LIMIT ?
            "#,
            INSIGHT_COLUMNS, PRIORITY_ORDER
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id, now, limit as i64], Self::row_to_insight)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Get a single insight by id
    pub fn get_insight(&self, id: i64) -> Result<Option<StoredInsight>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM insights WHERE id = ?", INSIGHT_COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], Self::row_to_insight)
            .optional()?)
    }

    /// Known state for each of a user's dedupe keys
    pub fn insight_states(&self, user_id: &str) -> Result<HashMap<String, InsightState>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT dedupe_key, last_generated_at, status, snoozed_until FROM insights WHERE user_id = ?",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            let key: String = row.get(0)?;
            let last: String = row.get(1)?;
            let status: String = row.get(2)?;
            let snoozed: Option<String> = row.get(3)?;
            Ok((
                key,
                InsightState {
                    last_generated_at: parse_datetime(&last),
                    status: status.parse().unwrap_or(InsightStatus::Active),
                    snoozed_until: snoozed.map(|s| parse_datetime(&s)),
                },
            ))
        })?;
        Ok(rows.collect::<std::result::Result<HashMap<_, _>, _>>()?)
    }

    /// Dismiss an insight
    pub fn dismiss_insight(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE insights SET status = 'dismissed' WHERE id = ?",
            params![id],
        )?;
        Ok(())
    }

    /// Snooze an insight for N days counted from `now`
    pub fn snooze_insight(
        &self,
        id: i64,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        let conn = self.conn()?;
        let until = now + Duration::days(days as i64);
        conn.execute(
            "UPDATE insights SET status = 'snoozed', snoozed_until = ? WHERE id = ?",
            params![format_datetime(until), id],
        )?;
        Ok(until)
    }

    /// Restore a dismissed or snoozed insight to active
    pub fn restore_insight(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE insights SET status = 'active', snoozed_until = NULL WHERE id = ?",
            params![id],
        )?;
        Ok(())
    }

    /// Set free-text user feedback on an insight
    pub fn set_insight_feedback(&self, id: i64, feedback: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE insights SET user_feedback = ? WHERE id = ?",
            params![feedback, id],
        )?;
        Ok(())
    }

    /// Count insights currently shown to a user
    pub fn count_active_insights(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            r#"
            SELECT COUNT(*) FROM insights
            WHERE user_id = ?
              AND (status = 'active' OR (status = 'snoozed' AND snoozed_until < ?))
            "#,
            params![user_id, format_datetime(Utc::now())],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn row_to_insight(row: &rusqlite::Row) -> rusqlite::Result<StoredInsight> {
        let kind: String = row.get(3)?;
        let priority: String = row.get(4)?;
        let data_json: String = row.get(11)?;
        let first: String = row.get(12)?;
        let last: String = row.get(13)?;
        let status: String = row.get(14)?;
        let snoozed: Option<String> = row.get(15)?;

        Ok(StoredInsight {
            id: row.get(0)?,
            user_id: row.get(1)?,
            template_id: row.get(2)?,
            kind: kind.parse().unwrap_or(InsightKind::SpendingPattern),
            priority: priority.parse().unwrap_or(Priority::Low),
            dedupe_key: row.get(5)?,
            subject: row.get(6)?,
            title: row.get(7)?,
            message: row.get(8)?,
            action: row.get(9)?,
            score: row.get(10)?,
            data: serde_json::from_str(&data_json).unwrap_or_default(),
            first_generated_at: parse_datetime(&first),
            last_generated_at: parse_datetime(&last),
            status: status.parse().unwrap_or(InsightStatus::Active),
            snoozed_until: snoozed.map(|s| parse_datetime(&s)),
            user_feedback: row.get(16)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insight(key: &str, priority: Priority, score: f64) -> Insight {
        Insight {
            template_id: "budget_exceeded".into(),
            kind: InsightKind::BudgetOverrun,
            priority,
            subject: "dining".into(),
            dedupe_key: key.into(),
            title: "Over budget".into(),
            message: "Dining is over budget".into(),
            action: Some("Pause takeout this week".into()),
            score,
            data: serde_json::json!({"ratio": 1.2}),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_upsert_insight_dedupes_by_key() {
        let db = Database::in_memory().unwrap();

        let first = db.upsert_insight("a", &insight("k:1", Priority::High, 1.0)).unwrap();
        assert!(first.created);
        let second = db.upsert_insight("a", &insight("k:1", Priority::High, 2.0)).unwrap();
        assert!(!second.created);
        assert_eq!(first.id, second.id);

        // Same key for another user is a separate insight
        let other = db.upsert_insight("b", &insight("k:1", Priority::High, 1.0)).unwrap();
        assert!(other.created);

        let stored = db.list_insights("a", None).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].score, 2.0);
        assert_eq!(stored[0].data["ratio"], 1.2);
    }

    #[test]
    fn test_dismissed_insight_stays_dismissed_on_upsert() {
        let db = Database::in_memory().unwrap();
        let outcome = db.upsert_insight("a", &insight("k:d", Priority::Low, 1.0)).unwrap();
        db.dismiss_insight(outcome.id).unwrap();

        let again = db.upsert_insight("a", &insight("k:d", Priority::Low, 1.0)).unwrap();
        assert_eq!(again.status, InsightStatus::Dismissed);
        assert_eq!(db.count_active_insights("a").unwrap(), 0);

        db.restore_insight(outcome.id).unwrap();
        assert_eq!(db.count_active_insights("a").unwrap(), 1);
    }

    #[test]
    fn test_snooze_and_states() {
        let db = Database::in_memory().unwrap();
        let outcome = db.upsert_insight("a", &insight("k:s", Priority::Medium, 1.0)).unwrap();
        let now = Utc::now();
        let until = db.snooze_insight(outcome.id, 7, now).unwrap();
        assert_eq!(until, now + Duration::days(7));

        let states = db.insight_states("a").unwrap();
        let state = states.get("k:s").unwrap();
        assert_eq!(state.status, InsightStatus::Snoozed);
        assert!(state.snoozed_until.is_some());
        assert!(db.top_insights("a", 5).unwrap().is_empty());
    }

    #[test]
    fn test_top_insights_ordering() {
        let db = Database::in_memory().unwrap();
        db.upsert_insight("a", &insight("k:low", Priority::Low, 9.0)).unwrap();
        db.upsert_insight("a", &insight("k:crit", Priority::Critical, 1.0)).unwrap();
        db.upsert_insight("a", &insight("k:high-small", Priority::High, 1.0)).unwrap();
        db.upsert_insight("a", &insight("k:high-big", Priority::High, 5.0)).unwrap();

        let top = db.top_insights("a", 3).unwrap();
        let keys: Vec<_> = top.iter().map(|i| i.dedupe_key.as_str()).collect();
        assert_eq!(keys, vec!["k:crit", "k:high-big", "k:high-small"]);
    }

    #[test]
    fn test_feedback() {
        let db = Database::in_memory().unwrap();
        let outcome = db.upsert_insight("a", &insight("k:f", Priority::Low, 1.0)).unwrap();
        db.set_insight_feedback(outcome.id, "helpful").unwrap();
        let stored = db.get_insight(outcome.id).unwrap().unwrap();
        assert_eq!(stored.user_feedback.as_deref(), Some("helpful"));
        assert!(db.get_insight(9999).unwrap().is_none());
    }
}
