//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod analytics;
pub mod behavior;
pub mod budgets;
pub mod chat;
pub mod health;
pub mod insights;
pub mod nudges;
pub mod personas;
pub mod salaries;
pub mod transactions;
pub mod users;
pub mod ws;

// Re-export all handlers for use in router
pub use analytics::*;
pub use behavior::*;
pub use budgets::*;
pub use chat::*;
pub use health::*;
pub use insights::*;
pub use nudges::*;
pub use personas::*;
pub use salaries::*;
pub use transactions::*;
pub use users::*;
pub use ws::*;

use chrono::{NaiveDate, Utc};

/// Resolve an optional `as_of` query value to a date
pub(crate) fn as_of_or_today(as_of: Option<NaiveDate>) -> NaiveDate {
    as_of.unwrap_or_else(|| Utc::now().date_naive())
}

/// Clamp a requested page size to `1..=MAX_PAGE_LIMIT`
pub(crate) fn page_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, crate::MAX_PAGE_LIMIT)
}
