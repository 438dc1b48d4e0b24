//! Core types for the insight engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Families of insight the rule templates produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    /// A budget category is near or past its limit
    BudgetOverrun,
    /// Overall spending pace will exhaust the month's budgets early
    BurnRisk,
    /// Discretionary spending that could be trimmed
    SavingsOpportunity,
    /// Habits such as weekend splurges or late-night purchases
    SpendingPattern,
    /// Savings rate against the user's goal
    GoalProgress,
    /// Forecast overrun before it happens
    PredictiveSpend,
    /// Outliers judged against the user's own behavior
    BehavioralAlert,
}

impl InsightKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightKind::BudgetOverrun => "budget_overrun",
            InsightKind::BurnRisk => "burn_risk",
            InsightKind::SavingsOpportunity => "savings_opportunity",
            InsightKind::SpendingPattern => "spending_pattern",
            InsightKind::GoalProgress => "goal_progress",
            InsightKind::PredictiveSpend => "predictive_spend",
            InsightKind::BehavioralAlert => "behavioral_alert",
        }
    }

    pub fn all() -> &'static [InsightKind] {
        &[
            InsightKind::BudgetOverrun,
            InsightKind::BurnRisk,
            InsightKind::SavingsOpportunity,
            InsightKind::SpendingPattern,
            InsightKind::GoalProgress,
            InsightKind::PredictiveSpend,
            InsightKind::BehavioralAlert,
        ]
    }
}

impl fmt::Display for InsightKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InsightKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InsightKind::all()
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Unknown insight kind: {}", s))
    }
}

/// How urgently an insight should be surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    /// Numeric rank for sorting (higher = more urgent)
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
            Priority::Critical => 4,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Lifecycle of a persisted insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightStatus {
    Active,
    Dismissed,
    Snoozed,
}

impl InsightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightStatus::Active => "active",
            InsightStatus::Dismissed => "dismissed",
            InsightStatus::Snoozed => "snoozed",
        }
    }
}

impl fmt::Display for InsightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InsightStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(InsightStatus::Active),
            "dismissed" => Ok(InsightStatus::Dismissed),
            "snoozed" => Ok(InsightStatus::Snoozed),
            _ => Err(format!("Unknown insight status: {}", s)),
        }
    }
}

/// An insight produced by one template match (before persistence)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub template_id: String,
    pub kind: InsightKind,
    pub priority: Priority,
    /// What the rule matched on, e.g. a category or "overall"
    pub subject: String,
    /// `template:subject:YYYY-MM`, unique per user
    pub dedupe_key: String,
    pub title: String,
    pub message: String,
    pub action: Option<String>,
    /// Magnitude of the match, used to order insights of equal priority
    pub score: f64,
    /// Variables the rule bound while matching
    pub data: serde_json::Value,
    pub generated_at: DateTime<Utc>,
}

/// A persisted insight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredInsight {
    pub id: i64,
    pub user_id: String,
    pub template_id: String,
    pub kind: InsightKind,
    pub priority: Priority,
    pub dedupe_key: String,
    pub subject: String,
    pub title: String,
    pub message: String,
    pub action: Option<String>,
    pub score: f64,
    pub data: serde_json::Value,
    pub first_generated_at: DateTime<Utc>,
    pub last_generated_at: DateTime<Utc>,
    pub status: InsightStatus,
    pub snoozed_until: Option<DateTime<Utc>>,
    pub user_feedback: Option<String>,
}

/// Result of writing an insight to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: i64,
    pub created: bool,
    /// Status after the write (dismissed insights stay dismissed)
    pub status: InsightStatus,
}

/// What the store already knows about a dedupe key
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsightState {
    pub last_generated_at: DateTime<Utc>,
    pub status: InsightStatus,
    pub snoozed_until: Option<DateTime<Utc>>,
}

/// Summary of one engine run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub generated: usize,
    pub persisted: usize,
    pub nudges_created: usize,
    pub pushed: usize,
    /// Set when quiet hours or the preferred hour held nudges back
    pub deferred_until: Option<DateTime<Utc>>,
    pub insights: Vec<Insight>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in InsightKind::all() {
            assert_eq!(InsightKind::from_str(kind.as_str()).unwrap(), *kind);
        }
        assert!(InsightKind::from_str("nope").is_err());
    }

    #[test]
    fn test_priority_rank() {
        assert!(Priority::Critical.rank() > Priority::High.rank());
        assert!(Priority::High.rank() > Priority::Medium.rank());
        assert!(Priority::Medium.rank() > Priority::Low.rank());
        assert_eq!(Priority::from_str("high").unwrap(), Priority::High);
    }
}
