//! Chat transcript and chatbot context operations

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::{format_datetime, parse_datetime, Database};
use crate::error::Result;
use crate::models::{ChatMessage, ChatRole, ChatbotContext};

impl Database {
    /// Append one message to a user's transcript
    pub fn append_chat_message(
        &self,
        user_id: &str,
        role: ChatRole,
        content: &str,
    ) -> Result<ChatMessage> {
        let conn = self.conn()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO chat_messages (user_id, role, content, created_at) VALUES (?, ?, ?, ?)",
            params![user_id, role.as_str(), content, format_datetime(now)],
        )?;
        Ok(ChatMessage {
            id: conn.last_insert_rowid(),
            user_id: user_id.to_string(),
            role,
            content: content.to_string(),
            created_at: now,
        })
    }

    /// The last `limit` messages, oldest first
    pub fn chat_history(&self, user_id: &str, limit: i64) -> Result<Vec<ChatMessage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, role, content, created_at
            FROM chat_messages
            WHERE user_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )?;
        let rows = stmt.query_map(params![user_id, limit], |row| {
            let role: String = row.get(2)?;
            let created_at: String = row.get(4)?;
            Ok(ChatMessage {
                id: row.get(0)?,
                user_id: row.get(1)?,
                role: role.parse().unwrap_or(ChatRole::User),
                content: row.get(3)?,
                created_at: parse_datetime(&created_at),
            })
        })?;

        let mut messages = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        messages.reverse();
        Ok(messages)
    }

    /// Stored chatbot context, or an empty one for a new conversation
    pub fn get_chatbot_context(&self, user_id: &str) -> Result<ChatbotContext> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT last_topic, referenced_insights, updated_at FROM chatbot_contexts WHERE user_id = ?",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((last_topic, referenced, updated_at)) = row else {
            return Ok(ChatbotContext {
                user_id: user_id.to_string(),
                ..Default::default()
            });
        };

        Ok(ChatbotContext {
            user_id: user_id.to_string(),
            last_topic,
            referenced_insights: serde_json::from_str(&referenced).unwrap_or_default(),
            updated_at: Some(parse_datetime(&updated_at)),
        })
    }

    pub fn save_chatbot_context(&self, context: &ChatbotContext) -> Result<()> {
        let conn = self.conn()?;
        let referenced = serde_json::to_string(&context.referenced_insights)?;
        conn.execute(
            r#"
            INSERT INTO chatbot_contexts (user_id, last_topic, referenced_insights, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                last_topic = excluded.last_topic,
                referenced_insights = excluded.referenced_insights,
                updated_at = excluded.updated_at
            "#,
            params![
                context.user_id,
                context.last_topic,
                referenced,
                format_datetime(context.updated_at.unwrap_or_else(Utc::now))
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_history_is_oldest_first_and_limited() {
        let db = Database::in_memory().unwrap();
        db.append_chat_message("a", ChatRole::User, "hi").unwrap();
        db.append_chat_message("a", ChatRole::Assistant, "hello").unwrap();
        db.append_chat_message("a", ChatRole::User, "budget?").unwrap();
        db.append_chat_message("b", ChatRole::User, "other user").unwrap();

        let history = db.chat_history("a", 2).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[1].content, "budget?");
    }

    #[test]
    fn test_chatbot_context_defaults_and_saves() {
        let db = Database::in_memory().unwrap();
        let empty = db.get_chatbot_context("a").unwrap();
        assert_eq!(empty.user_id, "a");
        assert!(empty.last_topic.is_none());
        assert!(empty.updated_at.is_none());

        let ctx = ChatbotContext {
            user_id: "a".into(),
            last_topic: Some("budget".into()),
            referenced_insights: vec![3, 5],
            updated_at: None,
        };
        db.save_chatbot_context(&ctx).unwrap();

        let loaded = db.get_chatbot_context("a").unwrap();
        assert_eq!(loaded.last_topic.as_deref(), Some("budget"));
        assert_eq!(loaded.referenced_insights, vec![3, 5]);
        assert!(loaded.updated_at.is_some());
    }
}
