//! Domain models for Nudge

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A coached user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub name: String,
    pub email: Option<String>,
    /// Persona dataset this user was seeded from, if any
    pub persona: Option<String>,
    /// Target savings rate (0.0 - 1.0) used by goal progress rules
    pub savings_goal: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Fields accepted when creating or updating a user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub savings_goal: Option<f64>,
}

/// Canonical spending categories
///
/// Raw bank/persona categories are mapped onto these by `normalize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Groceries,
    Dining,
    Transport,
    Shopping,
    Entertainment,
    Utilities,
    Housing,
    Health,
    Subscriptions,
    Travel,
    Education,
    Income,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Groceries => "groceries",
            Self::Dining => "dining",
            Self::Transport => "transport",
            Self::Shopping => "shopping",
            Self::Entertainment => "entertainment",
            Self::Utilities => "utilities",
            Self::Housing => "housing",
            Self::Health => "health",
            Self::Subscriptions => "subscriptions",
            Self::Travel => "travel",
            Self::Education => "education",
            Self::Income => "income",
            Self::Other => "other",
        }
    }

    /// Human-readable label used in rendered insight text
    pub fn label(&self) -> &'static str {
        match self {
            Self::Groceries => "Groceries",
            Self::Dining => "Dining out",
            Self::Transport => "Transport",
            Self::Shopping => "Shopping",
            Self::Entertainment => "Entertainment",
            Self::Utilities => "Utilities",
            Self::Housing => "Housing",
            Self::Health => "Health",
            Self::Subscriptions => "Subscriptions",
            Self::Travel => "Travel",
            Self::Education => "Education",
            Self::Income => "Income",
            Self::Other => "Other",
        }
    }

    /// Whether spending in this category is optional
    pub fn is_discretionary(&self) -> bool {
        matches!(
            self,
            Self::Dining | Self::Shopping | Self::Entertainment | Self::Travel | Self::Subscriptions
        )
    }

    pub fn all() -> &'static [Category] {
        &[
            Self::Groceries,
            Self::Dining,
            Self::Transport,
            Self::Shopping,
            Self::Entertainment,
            Self::Utilities,
            Self::Housing,
            Self::Health,
            Self::Subscriptions,
            Self::Travel,
            Self::Education,
            Self::Income,
            Self::Other,
        ]
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Category::all()
            .iter()
            .find(|c| c.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Self-reported mood attached to a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Neutral,
    Stressed,
    Sad,
    Excited,
    Bored,
}

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Neutral => "neutral",
            Self::Stressed => "stressed",
            Self::Sad => "sad",
            Self::Excited => "excited",
            Self::Bored => "bored",
        }
    }
}

impl std::str::FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "happy" => Ok(Self::Happy),
            "neutral" => Ok(Self::Neutral),
            "stressed" | "anxious" => Ok(Self::Stressed),
            "sad" => Ok(Self::Sad),
            "excited" => Ok(Self::Excited),
            "bored" => Ok(Self::Bored),
            _ => Err(format!("Unknown mood: {}", s)),
        }
    }
}

/// Transaction source - how it was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionSource {
    /// Entered through the API
    #[default]
    Manual,
    /// Imported from a CSV export
    Import,
    /// Loaded from a persona dataset
    Persona,
    /// Synthesized to fill gaps in a persona dataset
    Synthetic,
}

impl TransactionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Import => "import",
            Self::Persona => "persona",
            Self::Synthetic => "synthetic",
        }
    }
}

impl std::str::FromStr for TransactionSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "import" => Ok(Self::Import),
            "persona" => Ok(Self::Persona),
            "synthetic" => Ok(Self::Synthetic),
            _ => Err(format!("Unknown transaction source: {}", s)),
        }
    }
}

/// A stored transaction
///
/// `amount` is positive for money spent and negative for refunds/income.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub merchant: String,
    pub category: Category,
    /// Category string as it arrived, before normalization
    pub raw_category: Option<String>,
    pub mood: Option<Mood>,
    /// Hour of day (0-23) when known
    pub hour: Option<u8>,
    pub source: TransactionSource,
    pub import_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Money spent (refunds and income count as zero)
    pub fn spend(&self) -> f64 {
        if self.category == Category::Income {
            0.0
        } else {
            self.amount.max(0.0)
        }
    }
}

/// A transaction ready to insert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub amount: f64,
    pub merchant: String,
    pub category: Category,
    pub raw_category: Option<String>,
    pub mood: Option<Mood>,
    pub hour: Option<u8>,
    pub source: TransactionSource,
}

impl NewTransaction {
    /// Stable hash used to skip duplicate inserts for the same user
    pub fn import_hash(&self, user_id: &str) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(user_id.as_bytes());
        hasher.update(b"|");
        hasher.update(self.date.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(format!("{:.2}", self.amount).as_bytes());
        hasher.update(b"|");
        hasher.update(self.merchant.trim().to_lowercase().as_bytes());
        hasher.update(b"|");
        hasher.update(self.hour.map(|h| h.to_string()).unwrap_or_default().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Budget period as entered by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Weekly,
    #[default]
    Monthly,
    Yearly,
}

impl BudgetPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl std::str::FromStr for BudgetPeriod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weekly" | "week" => Ok(Self::Weekly),
            "monthly" | "month" => Ok(Self::Monthly),
            "yearly" | "annual" | "annually" | "year" => Ok(Self::Yearly),
            _ => Err(format!("Unknown budget period: {}", s)),
        }
    }
}

/// A spending limit for one category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: i64,
    pub user_id: String,
    pub category: Category,
    pub limit: f64,
    pub period: BudgetPeriod,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBudget {
    pub category: Category,
    pub limit: f64,
    #[serde(default)]
    pub period: BudgetPeriod,
}

/// How often a salary is paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PayFrequency {
    Weekly,
    Biweekly,
    #[default]
    Monthly,
    Yearly,
}

impl PayFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl std::str::FromStr for PayFrequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weekly" => Ok(Self::Weekly),
            "biweekly" | "fortnightly" => Ok(Self::Biweekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" | "annual" | "annually" => Ok(Self::Yearly),
            _ => Err(format!("Unknown pay frequency: {}", s)),
        }
    }
}

/// A salary record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Salary {
    pub id: i64,
    pub user_id: String,
    pub amount: f64,
    pub frequency: PayFrequency,
    pub effective_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSalary {
    pub amount: f64,
    #[serde(default)]
    pub frequency: PayFrequency,
    pub effective_date: NaiveDate,
}

/// Delivery lifecycle of a nudge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NudgeStatus {
    /// Created but not pushed to any live connection
    Pending,
    /// Pushed to at least one live connection
    Delivered,
    Accepted,
    Ignored,
    Snoozed,
}

impl NudgeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Accepted => "accepted",
            Self::Ignored => "ignored",
            Self::Snoozed => "snoozed",
        }
    }
}

impl std::str::FromStr for NudgeStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "delivered" => Ok(Self::Delivered),
            "accepted" => Ok(Self::Accepted),
            "ignored" => Ok(Self::Ignored),
            "snoozed" => Ok(Self::Snoozed),
            _ => Err(format!("Unknown nudge status: {}", s)),
        }
    }
}

/// A deliverable notification derived from an insight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nudge {
    pub id: i64,
    pub user_id: String,
    pub insight_id: Option<i64>,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub priority: String,
    pub status: NudgeStatus,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// Chat participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(format!("Unknown chat role: {}", s)),
        }
    }
}

/// One turn of a chat transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub user_id: String,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Rolling conversation state kept between chat turns
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatbotContext {
    pub user_id: String,
    pub last_topic: Option<String>,
    pub referenced_insights: Vec<i64>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample(amount: f64) -> NewTransaction {
        NewTransaction {
            date: NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
            amount,
            merchant: "Corner Cafe".to_string(),
            category: Category::Dining,
            raw_category: None,
            mood: None,
            hour: Some(9),
            source: TransactionSource::Manual,
        }
    }

    #[test]
    fn test_import_hash_is_stable_and_user_scoped() {
        let tx = sample(4.5);
        assert_eq!(tx.import_hash("alice"), tx.import_hash("alice"));
        assert_ne!(tx.import_hash("alice"), tx.import_hash("bob"));
        assert_ne!(tx.import_hash("alice"), sample(4.6).import_hash("alice"));
    }

    #[test]
    fn test_category_round_trip_and_discretionary() {
        for cat in Category::all() {
            assert_eq!(Category::from_str(cat.as_str()).unwrap(), *cat);
        }
        assert!(Category::Dining.is_discretionary());
        assert!(!Category::Housing.is_discretionary());
    }

    #[test]
    fn test_income_is_not_spend() {
        let tx = Transaction {
            id: 1,
            user_id: "u".into(),
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            amount: 2500.0,
            merchant: "Payroll".into(),
            category: Category::Income,
            raw_category: None,
            mood: None,
            hour: None,
            source: TransactionSource::Manual,
            import_hash: "h".into(),
            created_at: Utc::now(),
        };
        assert_eq!(tx.spend(), 0.0);
    }

    #[test]
    fn test_period_aliases() {
        assert_eq!(BudgetPeriod::from_str("Annual").unwrap(), BudgetPeriod::Yearly);
        assert_eq!(PayFrequency::from_str("fortnightly").unwrap(), PayFrequency::Biweekly);
        assert_eq!(Mood::from_str("Anxious").unwrap(), Mood::Stressed);
    }
}
