//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - init and shared utilities (open_db, load_config)
//! - `import` - CSV import
//! - `personas` - persona listing and loading
//! - `insights` - insight engine runs
//! - `analytics` - spending analytics report
//! - `chat` - one-shot chat with the coach
//! - `serve` - web server command

pub mod analytics;
pub mod chat;
pub mod core;
pub mod import;
pub mod insights;
pub mod personas;
pub mod serve;

// Re-export command functions for main.rs
pub use analytics::*;
pub use chat::*;
pub use core::*;
pub use import::*;
pub use insights::*;
pub use personas::*;
pub use serve::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
