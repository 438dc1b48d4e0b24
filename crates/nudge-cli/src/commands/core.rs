//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `open_db_with_retry` - Same, tolerating a briefly unavailable file
//! - `load_config` - Coach configuration with override resolution
//! - `cmd_init` - Initialize the database

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use nudge_core::{CoachConfig, Database};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Open the database for a long-running process, retrying a few times
pub fn open_db_with_retry(db_path: &Path, no_encrypt: bool, attempts: u32) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    let key = if no_encrypt {
        None
    } else {
        Some(std::env::var("NUDGE_DB_KEY").context(
            "Database encryption required. Set NUDGE_DB_KEY or use --no-encrypt",
        )?)
    };
    Database::open_with_retry(path_str, key.as_deref(), attempts, Duration::from_secs(2))
        .context("Failed to open database")
}

/// Load the coach config (NUDGE_CONFIG, then the user override, then defaults)
pub fn load_config() -> Result<CoachConfig> {
    CoachConfig::load().context("Failed to load coach config")
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;
    let users = db.list_users().context("Failed to read users")?;
    println!("   Tables ready ({} existing users)", users.len());

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    if let Some(path) = CoachConfig::override_path() {
        println!("   Config override: {}", path.display());
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Load sample data: nudge persona --user me --name student");
    println!("  2. Or import a statement: nudge import --user me --file statement.csv");
    println!("  3. Generate nudges: nudge insights --user me --persist");

    Ok(())
}
