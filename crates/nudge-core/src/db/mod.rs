//! Database access layer with connection pooling and migrations
//!
//! Each collection lives in its own module:
//! - `users` - user profiles
//! - `transactions` - transaction storage with hash-based dedupe
//! - `budgets` - per-category spending limits
//! - `salaries` - salary records
//! - `insights` - persisted insights and their lifecycle
//! - `nudges` - deliverable notifications
//! - `behavior` - nudge feedback events
//! - `chat` - chat transcripts and chatbot context
//!
//! Collections reference users by string `user_id` only; there are no
//! cross-collection foreign keys.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::{info, warn};

use crate::error::{Error, Result};

mod behavior;
mod budgets;
mod chat;
mod insights;
mod nudges;
mod salaries;
mod transactions;
mod users;

pub use behavior::BehaviorEvent;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "NUDGE_DB_KEY";

/// Format used for DATETIME columns
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the
/// same key regardless of database path.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Changing this invalidates every existing encrypted database
    const APP_SALT: &[u8; 16] = b"nudge-salt-v1-ok";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Parse a stored `YYYY-MM-DD` date
pub(crate) fn parse_date(s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    db_path: String,
}

impl Database {
    /// Open an encrypted database using the `NUDGE_DB_KEY` passphrase
    ///
    /// Returns an error if `NUDGE_DB_KEY` is not set. Use `new_unencrypted()`
    /// for development/testing without encryption.
    pub fn new(path: &str) -> Result<Self> {
        match std::env::var(DB_KEY_ENV).ok() {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases.",
                DB_KEY_ENV
            ))),
        }
    }

    /// Open an unencrypted database (development/testing only)
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Open a database with an explicit encryption passphrase
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        let pool = if let Some(pass) = passphrase {
            let key = derive_key(pass)?;
            let key_pragma = format!("PRAGMA key = 'x\"{}\"';", key);

            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                Ok(())
            });

            Pool::builder().max_size(10).build(manager)?
        } else {
            Pool::builder().max_size(10).build(manager)?
        };

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Open a database, retrying on failure
    ///
    /// Covers the window where the file sits on a volume that is not mounted
    /// yet, or is briefly locked by another process.
    pub fn open_with_retry(
        path: &str,
        passphrase: Option<&str>,
        attempts: u32,
        delay: Duration,
    ) -> Result<Self> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            match Self::new_with_key(path, passphrase) {
                Ok(db) => {
                    if attempt > 1 {
                        info!(path, attempt, "Database connected after retry");
                    }
                    return Ok(db);
                }
                Err(e) if attempt < attempts => {
                    warn!(path, attempt, attempts, error = %e, "Database connection failed, retrying");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` because every pooled
    /// connection to `:memory:` would see its own empty database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "nudge_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let path = path.to_string_lossy().to_string();

        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Delete everything stored for one user
    pub fn delete_user_data(&self, user_id: &str) -> Result<()> {
        let conn = self.conn()?;
        for table in [
            "transactions",
            "budgets",
            "salaries",
            "insights",
            "nudges",
            "behavior_events",
            "chat_messages",
            "chatbot_contexts",
            "users",
        ] {
            conn.execute(
                &format!("DELETE FROM {} WHERE user_id = ?", table),
                [user_id],
            )?;
        }
        info!(user_id, "Deleted user data");
        Ok(())
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT,
                persona TEXT,
                savings_goal REAL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,                      -- YYYY-MM-DD
                amount REAL NOT NULL,                    -- positive = spend
                merchant TEXT NOT NULL,
                category TEXT NOT NULL,                  -- canonical category
                raw_category TEXT,
                mood TEXT,
                hour INTEGER,
                source TEXT NOT NULL DEFAULT 'manual',
                import_hash TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(user_id, import_hash)
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, date);

            CREATE TABLE IF NOT EXISTS budgets (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                category TEXT NOT NULL,
                limit_amount REAL NOT NULL,
                period TEXT NOT NULL DEFAULT 'monthly',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(user_id, category)
            );

            CREATE TABLE IF NOT EXISTS salaries (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                amount REAL NOT NULL,
                frequency TEXT NOT NULL DEFAULT 'monthly',
                effective_date TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_salaries_user ON salaries(user_id, effective_date);

            CREATE TABLE IF NOT EXISTS insights (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                template_id TEXT NOT NULL,
                kind TEXT NOT NULL,                      -- budget_overrun, burn_risk, ...
                priority TEXT NOT NULL,                  -- low, medium, high, critical
                dedupe_key TEXT NOT NULL,                -- template:subject:period
                subject TEXT NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                action TEXT,
                score REAL NOT NULL DEFAULT 0,
                data TEXT NOT NULL,                      -- JSON: rule variables
                first_generated_at DATETIME NOT NULL,
                last_generated_at DATETIME NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',   -- active, dismissed, snoozed
                snoozed_until DATETIME,
                user_feedback TEXT,
                UNIQUE(user_id, dedupe_key)
            );

            CREATE INDEX IF NOT EXISTS idx_insights_user_status ON insights(user_id, status, last_generated_at);

            CREATE TABLE IF NOT EXISTS nudges (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                insight_id INTEGER,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                priority TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at DATETIME NOT NULL,
                delivered_at DATETIME,
                responded_at DATETIME
            );

            CREATE INDEX IF NOT EXISTS idx_nudges_user ON nudges(user_id, created_at);

            CREATE TABLE IF NOT EXISTS behavior_events (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                kind TEXT NOT NULL,                      -- insight kind responded to
                response TEXT NOT NULL,                  -- accepted, ignored, snoozed
                hour INTEGER NOT NULL,
                created_at DATETIME NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_behavior_user ON behavior_events(user_id, created_at);

            CREATE TABLE IF NOT EXISTS chat_messages (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at DATETIME NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chat_user ON chat_messages(user_id, id);

            CREATE TABLE IF NOT EXISTS chatbot_contexts (
                user_id TEXT PRIMARY KEY,
                last_topic TEXT,
                referenced_insights TEXT NOT NULL DEFAULT '[]',
                updated_at DATETIME NOT NULL
            );
            "#,
        )?;

        info!(path = %self.db_path, "Database schema initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_with_retry_succeeds_first_try() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("retry.db");
        let db = Database::open_with_retry(
            path.to_str().unwrap(),
            None,
            3,
            Duration::from_millis(1),
        )
        .unwrap();
        assert!(db.conn().is_ok());
    }

    #[test]
    fn test_datetime_round_trip() {
        let now = Utc::now();
        let parsed = parse_datetime(&format_datetime(now));
        assert_eq!(parsed.timestamp(), now.timestamp());
    }
}
