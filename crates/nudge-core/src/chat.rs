//! Coaching chat
//!
//! `ContextBuilder` gathers what the assistant should know about a user
//! (top insights, recent nudges and transactions, month-to-date budget use,
//! the rolling conversation state) and renders it as a system prompt.
//! `ChatService` stores the transcript and asks the AI backend for a reply,
//! falling back to a templated answer keyed on the message topic when no
//! backend is configured or the call fails.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ai::{AIBackend, AIClient, ChatPrompt, ChatTurn};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::insights::predictive::month_start;
use crate::insights::StoredInsight;
use crate::models::{Category, ChatRole, ChatbotContext, Nudge, Transaction};
use crate::normalize::{monthly_income, normalize_budgets};

const TOP_INSIGHTS: usize = 5;
const RECENT_NUDGES: i64 = 5;
const RECENT_TRANSACTIONS: i64 = 10;
const HISTORY_TURNS: i64 = 10;
/// Longest message accepted from a user
pub const MAX_MESSAGE_LEN: usize = 2000;

/// What a message is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatTopic {
    Budget,
    Saving,
    Spending,
    Insight,
    Greeting,
    General,
}

impl ChatTopic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Budget => "budget",
            Self::Saving => "saving",
            Self::Spending => "spending",
            Self::Insight => "insight",
            Self::Greeting => "greeting",
            Self::General => "general",
        }
    }

    /// Classify by keyword; the first matching topic wins
    pub fn detect(message: &str) -> Self {
        let lower = message.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let has = |keys: &[&str]| words.iter().any(|w| keys.iter().any(|k| w.starts_with(k)));

        if has(&["budget", "limit", "overspen", "overbudget"]) {
            Self::Budget
        } else if has(&["sav", "goal", "emergency", "invest"]) {
            Self::Saving
        } else if has(&["spen", "expens", "cost", "bought", "purchas"]) {
            Self::Spending
        } else if has(&["insight", "nudge", "tip", "advice", "alert", "suggest"]) {
            Self::Insight
        } else if words.len() <= 4
            && words
                .first()
                .is_some_and(|w| ["hi", "hello", "hey", "morning", "yo"].contains(w))
        {
            Self::Greeting
        } else {
            Self::General
        }
    }
}

impl std::fmt::Display for ChatTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Month-to-date use of one budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetUsage {
    pub category: Category,
    pub limit: f64,
    pub spent: f64,
    pub ratio: f64,
}

/// Everything the assistant sees about a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatContext {
    pub user_id: String,
    pub name: Option<String>,
    pub as_of: NaiveDate,
    pub top_insights: Vec<StoredInsight>,
    pub recent_nudges: Vec<Nudge>,
    pub recent_transactions: Vec<Transaction>,
    /// Highest ratio first
    pub budget_usage: Vec<BudgetUsage>,
    pub month_spend: f64,
    pub monthly_income: Option<f64>,
    pub conversation: ChatbotContext,
}

impl ChatContext {
    /// Render as a system prompt
    pub fn system_prompt(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "You are Nudge, a friendly personal-finance coach. Answer briefly and concretely, \
             using only the figures below. Never invent numbers."
        );
        let _ = writeln!(
            out,
            "\nUser: {} (as of {})",
            self.name.as_deref().unwrap_or(&self.user_id),
            self.as_of
        );
        let _ = writeln!(out, "Spent this month: ${:.2}", self.month_spend);
        if let Some(income) = self.monthly_income {
            let _ = writeln!(out, "Monthly income: ${:.2}", income);
        }

        if !self.budget_usage.is_empty() {
            let _ = writeln!(out, "\nBudgets (month to date):");
            for b in &self.budget_usage {
                let _ = writeln!(
                    out,
                    "- {}: ${:.2} of ${:.2} ({:.0}%)",
                    b.category.label(),
                    b.spent,
                    b.limit,
                    b.ratio * 100.0
                );
            }
        }

        if !self.top_insights.is_empty() {
            let _ = writeln!(out, "\nCurrent insights:");
            for i in &self.top_insights {
                let _ = writeln!(out, "- [{}] {}: {}", i.priority, i.title, i.message);
            }
        }

        if !self.recent_nudges.is_empty() {
            let _ = writeln!(out, "\nRecent nudges:");
            for n in &self.recent_nudges {
                let _ = writeln!(out, "- {} ({})", n.title, n.status.as_str());
            }
        }

        if !self.recent_transactions.is_empty() {
            let _ = writeln!(out, "\nRecent transactions:");
            for t in &self.recent_transactions {
                let _ = writeln!(
                    out,
                    "- {} {} ${:.2} ({})",
                    t.date,
                    t.merchant,
                    t.amount,
                    t.category.label()
                );
            }
        }

        if let Some(topic) = &self.conversation.last_topic {
            let _ = writeln!(out, "\nThe previous question was about {}.", topic);
        }
        out
    }

    fn insight_ids(&self) -> Vec<i64> {
        self.top_insights.iter().map(|i| i.id).collect()
    }
}

/// Assembles a `ChatContext` from the store
pub struct ContextBuilder<'a> {
    db: &'a Database,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn build(&self, user_id: &str, as_of: NaiveDate) -> Result<ChatContext> {
        let user = self.db.get_user(user_id)?;
        let start = month_start(as_of);
        let month_txs = self.db.list_transactions_between(user_id, start, as_of)?;

        let mut by_category: BTreeMap<Category, f64> = BTreeMap::new();
        for tx in &month_txs {
            *by_category.entry(tx.category).or_insert(0.0) += tx.spend();
        }
        let month_spend: f64 = month_txs.iter().map(|t| t.spend()).sum();

        let mut budget_usage: Vec<BudgetUsage> = normalize_budgets(&self.db.list_budgets(user_id)?)
            .into_iter()
            .map(|(category, limit)| {
                let spent = by_category.get(&category).copied().unwrap_or(0.0);
                BudgetUsage {
                    category,
                    limit,
                    spent,
                    ratio: spent / limit,
                }
            })
            .collect();
        budget_usage.sort_by(|a, b| {
            b.ratio
                .partial_cmp(&a.ratio)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(ChatContext {
            user_id: user_id.to_string(),
            name: user.map(|u| u.name),
            as_of,
            top_insights: self.db.top_insights(user_id, TOP_INSIGHTS)?,
            recent_nudges: self.db.list_nudges(user_id, None, RECENT_NUDGES)?,
            recent_transactions: self.db.recent_transactions(user_id, RECENT_TRANSACTIONS)?,
            budget_usage,
            month_spend,
            monthly_income: self
                .db
                .salary_as_of(user_id, as_of)?
                .map(|s| monthly_income(&s)),
            conversation: self.db.get_chatbot_context(user_id)?,
        })
    }
}

/// Where a reply came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Ai,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    pub topic: ChatTopic,
    pub source: ReplySource,
    pub referenced_insights: Vec<i64>,
}

/// Stores the transcript and produces replies
#[derive(Clone)]
pub struct ChatService {
    db: Database,
    ai: Option<AIClient>,
}

impl ChatService {
    pub fn new(db: Database, ai: Option<AIClient>) -> Self {
        Self { db, ai }
    }

    pub fn has_ai(&self) -> bool {
        self.ai.is_some()
    }

    /// Answer a message as of today
    pub async fn reply(&self, user_id: &str, message: &str) -> Result<ChatReply> {
        self.reply_at(user_id, message, Utc::now().date_naive()).await
    }

    pub async fn reply_at(&self, user_id: &str, message: &str, as_of: NaiveDate) -> Result<ChatReply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::InvalidData("message is empty".into()));
        }
        if message.chars().count() > MAX_MESSAGE_LEN {
            return Err(Error::InvalidData(format!(
                "message longer than {} characters",
                MAX_MESSAGE_LEN
            )));
        }

        let topic = ChatTopic::detect(message);
        let history: Vec<ChatTurn> = self
            .db
            .chat_history(user_id, HISTORY_TURNS)?
            .into_iter()
            .map(|m| ChatTurn {
                role: m.role,
                content: m.content,
            })
            .collect();
        self.db.append_chat_message(user_id, ChatRole::User, message)?;

        let context = ContextBuilder::new(&self.db).build(user_id, as_of)?;

        let ai_reply = match &self.ai {
            Some(ai) => {
                let prompt = ChatPrompt {
                    system: context.system_prompt(),
                    history,
                    message: message.to_string(),
                };
                match ai.chat(&prompt).await {
                    Ok(reply) => Some(reply),
                    Err(e) => {
                        warn!(user_id, model = ai.model(), error = %e, "AI chat failed, using fallback");
                        None
                    }
                }
            }
            None => None,
        };

        let (reply, source) = match ai_reply {
            Some(reply) => (reply, ReplySource::Ai),
            None => (fallback_reply(topic, &context), ReplySource::Fallback),
        };

        self.db
            .append_chat_message(user_id, ChatRole::Assistant, &reply)?;

        let referenced_insights = context.insight_ids();
        self.db.save_chatbot_context(&ChatbotContext {
            user_id: user_id.to_string(),
            last_topic: Some(topic.as_str().to_string()),
            referenced_insights: referenced_insights.clone(),
            updated_at: Some(Utc::now()),
        })?;

        debug!(user_id, topic = %topic, source = ?source, "Chat reply stored");
        Ok(ChatReply {
            reply,
            topic,
            source,
            referenced_insights,
        })
    }
}

/// Canned answer built from the context
pub fn fallback_reply(topic: ChatTopic, ctx: &ChatContext) -> String {
    match topic {
        ChatTopic::Budget => match ctx.budget_usage.first() {
            Some(b) if b.ratio >= 1.0 => format!(
                "Your {} budget is over: ${:.2} spent against ${:.2}. Holding off on {} for the rest of the month would help most.",
                b.category.label(),
                b.spent,
                b.limit,
                b.category.label().to_lowercase()
            ),
            Some(b) => format!(
                "Your tightest budget is {} at {:.0}% (${:.2} of ${:.2}). You have ${:.2} left there this month.",
                b.category.label(),
                b.ratio * 100.0,
                b.spent,
                b.limit,
                (b.limit - b.spent).max(0.0)
            ),
            None => "You don't have any budgets yet. Setting one for your biggest category is a good first step.".to_string(),
        },
        ChatTopic::Saving => match ctx.monthly_income.filter(|i| *i > 0.0) {
            Some(income) => {
                let rate = (income - ctx.month_spend) / income;
                format!(
                    "So far this month you've spent ${:.2} of ${:.2} income, a savings rate of {:.0}%. Moving a fixed amount to savings on payday makes the goal automatic.",
                    ctx.month_spend,
                    income,
                    rate * 100.0
                )
            }
            None => "Add your salary and I can track your savings rate against your goal.".to_string(),
        },
        ChatTopic::Spending => {
            let top = ctx
                .budget_usage
                .iter()
                .max_by(|a, b| a.spent.partial_cmp(&b.spent).unwrap_or(std::cmp::Ordering::Equal))
                .filter(|b| b.spent > 0.0);
            match top {
                Some(b) => format!(
                    "You've spent ${:.2} this month. {} is your largest budgeted category at ${:.2}.",
                    ctx.month_spend,
                    b.category.label(),
                    b.spent
                ),
                None => format!("You've spent ${:.2} so far this month.", ctx.month_spend),
            }
        }
        ChatTopic::Insight => match ctx.top_insights.first() {
            Some(i) => match &i.action {
                Some(action) => format!("{} {} Suggested next step: {}", i.title, i.message, action),
                None => format!("{} {}", i.title, i.message),
            },
            None => "Nothing needs your attention right now. Keep it up!".to_string(),
        },
        ChatTopic::Greeting => {
            let name = ctx.name.as_deref().unwrap_or("there");
            match ctx.top_insights.len() {
                0 => format!("Hi {}! Ask me about your budgets, spending or savings.", name),
                n => format!(
                    "Hi {}! I have {} insight{} for you. Ask me for tips to see them.",
                    name,
                    n,
                    if n == 1 { "" } else { "s" }
                ),
            }
        }
        ChatTopic::General => {
            "I can help with budgets, spending patterns and savings goals. Try asking how your budgets look this month.".to_string()
        }
    }
}
