//! User operations

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{NewUser, User};

impl Database {
    /// Create a user or update the profile of an existing one
    pub fn upsert_user(&self, user: &NewUser) -> Result<User> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO users (user_id, name, email, persona, savings_goal)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                name = excluded.name,
                email = COALESCE(excluded.email, users.email),
                persona = COALESCE(excluded.persona, users.persona),
                savings_goal = COALESCE(excluded.savings_goal, users.savings_goal)
            "#,
            params![
                user.user_id,
                user.name,
                user.email,
                user.persona,
                user.savings_goal
            ],
        )?;
        drop(conn);

        self.get_user(&user.user_id)?
            .ok_or_else(|| crate::Error::NotFound(format!("user {}", user.user_id)))
    }

    /// Get a user by id
    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT user_id, name, email, persona, savings_goal, created_at FROM users WHERE user_id = ?",
                params![user_id],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// List all users
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, name, email, persona, savings_goal, created_at FROM users ORDER BY user_id",
        )?;
        let rows = stmt.query_map([], Self::row_to_user)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let created_at: String = row.get(5)?;
        Ok(User {
            user_id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            persona: row.get(3)?,
            savings_goal: row.get(4)?,
            created_at: parse_datetime(&created_at),
        })
    }
}
