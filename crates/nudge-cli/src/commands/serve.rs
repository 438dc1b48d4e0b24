//! Server command implementation

use std::path::Path;

use anyhow::Result;
use nudge_server::ServerConfig;

use super::open_db_with_retry;

/// Connection attempts before giving up at startup
const OPEN_ATTEMPTS: u32 = 5;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
) -> Result<()> {
    println!("🚀 Starting Nudge web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    println!("   Push channel: ws://{}:{}/api/ws?user_id=<id>", host, port);

    let config = ServerConfig::from_env(!no_auth);

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else if config.api_keys.is_empty() {
        println!("   🔒 Authentication: API key (set NUDGE_API_KEYS to allow clients)");
    } else {
        println!(
            "   🔑 Authentication: API key ({} key(s) configured)",
            config.api_keys.len()
        );
    }

    let db = open_db_with_retry(db_path, no_encrypt, OPEN_ATTEMPTS)?;
    nudge_server::serve(db, host, port, config).await
}
