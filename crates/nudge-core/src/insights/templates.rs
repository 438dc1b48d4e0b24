//! Declarative insight templates
//!
//! A template pairs a [`Condition`] with content. Conditions are evaluated
//! against an [`EvaluationContext`] and yield zero or more [`RuleMatch`]es,
//! each carrying the variables its `{placeholder}`s are filled from.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::analytics::{day_of_week_pattern, hour_pattern, mood_correlation};
use crate::config::Thresholds;
use crate::error::{Error, Result};
use crate::models::{Category, Transaction};

use super::behavior::{BehaviorAdapter, ThresholdDirection};
use super::engine::EvaluationContext;
use super::predictive::{days_in_month, forecast_budget_overruns, month_start, project_month_end};
use super::types::{InsightKind, Priority};

/// Subject used by rules that look at the user's spending as a whole
pub const OVERALL: &str = "overall";

/// Minimum earlier transactions before the large-transaction rule has a baseline
const LARGE_TX_MIN_HISTORY: usize = 5;

/// Minimum tagged transactions before a mood can be called a trigger
const MOOD_MIN_SAMPLES: usize = 3;

/// Prior months averaged for the category spike baseline
const SPIKE_BASELINE_MONTHS: u32 = 3;

/// What a template checks for
///
/// Each condition's primary threshold is scaled by the user's sensitivity
/// before comparison. Secondary `min_amount` floors are not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Month-to-date spend / monthly limit, per budgeted category
    BudgetUsage { min_ratio: f64, max_ratio: Option<f64> },
    /// Projected month-end spend / total monthly budget
    BurnRate { min_ratio: f64 },
    /// Discretionary share of month-to-date spend
    DiscretionaryShare { min_share: f64, min_amount: f64 },
    /// Month-to-date category spend against its prorated trailing average
    CategorySpike { multiplier: f64, min_amount: f64 },
    /// Weekend daily average / weekday daily average over the trend window
    WeekendSkew { min_ratio: f64 },
    /// Purchases between 22:00 and 05:00 over the trend window
    LateNight { min_count: usize },
    /// Projected savings rate as a fraction of the user's goal
    SavingsRate {
        min_rate: Option<f64>,
        max_rate: Option<f64>,
    },
    /// Forecast month-end overrun for categories still under their limit
    PredictedOverrun { min_amount: f64 },
    /// A purchase this week far above the user's typical transaction
    LargeTransaction { multiplier: f64, min_amount: f64 },
    /// A mood whose average purchase is well above the overall average
    MoodTrigger { min_ratio: f64 },
}

/// One subject a condition matched
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub subject: String,
    pub score: f64,
    /// JSON object of placeholder values
    pub data: Value,
}

impl RuleMatch {
    fn new(subject: impl Into<String>, score: f64, data: Value) -> Self {
        Self {
            subject: subject.into(),
            score,
            data,
        }
    }
}

fn money(v: f64) -> Value {
    json!((v * 100.0).round() / 100.0)
}

fn percent(ratio: f64) -> Value {
    json!((ratio * 100.0).round() as i64)
}

fn one_decimal(v: f64) -> Value {
    json!((v * 10.0).round() / 10.0)
}

fn finite_positive(name: &str, value: f64) -> std::result::Result<(), String> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(format!("{} must be a positive number, got {}", name, value))
    }
}

fn finite_non_negative(name: &str, value: f64) -> std::result::Result<(), String> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(format!("{} must be zero or more, got {}", name, value))
    }
}

impl Condition {
    /// Check the parameters make sense
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            Condition::BudgetUsage { min_ratio, max_ratio } => {
                finite_non_negative("min_ratio", *min_ratio)?;
                if let Some(max) = max_ratio {
                    finite_positive("max_ratio", *max)?;
                    if max <= min_ratio {
                        return Err(format!("max_ratio {} must exceed min_ratio {}", max, min_ratio));
                    }
                }
                Ok(())
            }
            Condition::BurnRate { min_ratio } => finite_positive("min_ratio", *min_ratio),
            Condition::DiscretionaryShare { min_share, min_amount } => {
                finite_positive("min_share", *min_share)?;
                finite_non_negative("min_amount", *min_amount)
            }
            Condition::CategorySpike { multiplier, min_amount }
            | Condition::LargeTransaction { multiplier, min_amount } => {
                finite_positive("multiplier", *multiplier)?;
                finite_non_negative("min_amount", *min_amount)
            }
            Condition::WeekendSkew { min_ratio } | Condition::MoodTrigger { min_ratio } => {
                finite_positive("min_ratio", *min_ratio)
            }
            Condition::LateNight { min_count } => {
                if *min_count == 0 {
                    Err("min_count must be at least 1".to_string())
                } else {
                    Ok(())
                }
            }
            Condition::SavingsRate { min_rate, max_rate } => {
                if min_rate.is_none() && max_rate.is_none() {
                    return Err("savings rate needs min_rate or max_rate".to_string());
                }
                if let Some(min) = min_rate {
                    if !min.is_finite() {
                        return Err(format!("min_rate must be finite, got {}", min));
                    }
                }
                if let Some(max) = max_rate {
                    if !max.is_finite() {
                        return Err(format!("max_rate must be finite, got {}", max));
                    }
                }
                Ok(())
            }
            Condition::PredictedOverrun { min_amount } => finite_non_negative("min_amount", *min_amount),
        }
    }

    /// Evaluate against a user's context, with thresholds scaled by sensitivity
    pub fn evaluate(
        &self,
        ctx: &EvaluationContext,
        adapter: &BehaviorAdapter,
    ) -> std::result::Result<Vec<RuleMatch>, String> {
        self.validate()?;

        let level = ctx.profile.sensitivity;
        let above = |base: f64| adapter.adjust_threshold(level, base, ThresholdDirection::Above);
        let below = |base: f64| adapter.adjust_threshold(level, base, ThresholdDirection::Below);

        let matches = match self {
            Condition::BudgetUsage { min_ratio, max_ratio } => {
                budget_usage(ctx, above(*min_ratio), max_ratio.map(above))
            }
            Condition::BurnRate { min_ratio } => burn_rate(ctx, above(*min_ratio)),
            Condition::DiscretionaryShare { min_share, min_amount } => {
                discretionary_share(ctx, above(*min_share), *min_amount)
            }
            Condition::CategorySpike { multiplier, min_amount } => {
                category_spike(ctx, above(*multiplier), *min_amount)
            }
            Condition::WeekendSkew { min_ratio } => weekend_skew(ctx, above(*min_ratio)),
            Condition::LateNight { min_count } => {
                late_night(ctx, scale_count(*min_count, above(*min_count as f64)))
            }
            Condition::SavingsRate { min_rate, max_rate } => {
                savings_rate(ctx, min_rate.map(above), max_rate.map(below))
            }
            Condition::PredictedOverrun { min_amount } => predicted_overrun(ctx, above(*min_amount)),
            Condition::LargeTransaction { multiplier, min_amount } => {
                large_transaction(ctx, above(*multiplier), *min_amount)
            }
            Condition::MoodTrigger { min_ratio } => mood_trigger(ctx, above(*min_ratio)),
        };
        Ok(matches)
    }
}

/// Round an adjusted count away from its base so any shift takes effect
fn scale_count(base: usize, adjusted: f64) -> usize {
    let rounded = if adjusted < base as f64 {
        adjusted.floor()
    } else {
        adjusted.ceil()
    };
    rounded.max(1.0) as usize
}

fn month_spend_by_category(ctx: &EvaluationContext) -> BTreeMap<Category, f64> {
    let mut totals = BTreeMap::new();
    for tx in ctx.month_transactions() {
        if tx.spend() > 0.0 {
            *totals.entry(tx.category).or_insert(0.0) += tx.spend();
        }
    }
    totals
}

fn days_left(ctx: &EvaluationContext) -> u32 {
    days_in_month(ctx.as_of).saturating_sub(ctx.as_of.day())
}

fn budget_usage(ctx: &EvaluationContext, min_ratio: f64, max_ratio: Option<f64>) -> Vec<RuleMatch> {
    let spent = month_spend_by_category(ctx);

    ctx.budgets
        .iter()
        .filter(|(cat, limit)| **limit > 0.0 && **cat != Category::Income)
        .filter_map(|(cat, limit)| {
            let spent = spent.get(cat).copied().unwrap_or(0.0);
            let ratio = spent / limit;
            if ratio < min_ratio || max_ratio.is_some_and(|max| ratio >= max) {
                return None;
            }
            Some(RuleMatch::new(
                cat.as_str(),
                ratio,
                json!({
                    "category": cat.label(),
                    "spent": money(spent),
                    "limit": money(*limit),
                    "percent": percent(ratio),
                    "remaining": money((limit - spent).max(0.0)),
                    "over": money((spent - limit).max(0.0)),
                    "days_left": days_left(ctx),
                }),
            ))
        })
        .collect()
}

fn burn_rate(ctx: &EvaluationContext, min_ratio: f64) -> Vec<RuleMatch> {
    let total_budget: f64 = ctx
        .budgets
        .iter()
        .filter(|(cat, _)| **cat != Category::Income)
        .map(|(_, limit)| limit.max(0.0))
        .sum();
    if total_budget <= 0.0 {
        return vec![];
    }

    let projection = project_month_end(&ctx.transactions, ctx.as_of, ctx.trend_window_days);
    if projection.spent_to_date <= 0.0 {
        return vec![];
    }

    let ratio = projection.projected_total / total_budget;
    if ratio < min_ratio {
        return vec![];
    }

    vec![RuleMatch::new(
        OVERALL,
        ratio,
        json!({
            "projected": money(projection.projected_total),
            "budget": money(total_budget),
            "percent": percent(ratio),
            "spent": money(projection.spent_to_date),
            "daily_average": money(projection.daily_average),
            "days_left": projection.remaining_days,
            "confidence": percent(projection.confidence),
        }),
    )]
}

fn discretionary_share(ctx: &EvaluationContext, min_share: f64, min_amount: f64) -> Vec<RuleMatch> {
    let by_category = month_spend_by_category(ctx);
    let total: f64 = by_category.values().sum();
    if total <= 0.0 {
        return vec![];
    }

    let discretionary: Vec<(Category, f64)> = by_category
        .iter()
        .filter(|(cat, _)| cat.is_discretionary())
        .map(|(cat, amount)| (*cat, *amount))
        .collect();
    let amount: f64 = discretionary.iter().map(|(_, a)| a).sum();
    let share = amount / total;
    if share < min_share || amount < min_amount {
        return vec![];
    }

    let Some((top_category, top_amount)) = discretionary
        .iter()
        .copied()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    else {
        return vec![];
    };

    vec![RuleMatch::new(
        OVERALL,
        share,
        json!({
            "amount": money(amount),
            "share": percent(share),
            "top_category": top_category.label(),
            "top_amount": money(top_amount),
            "savings": money(amount * 0.2),
        }),
    )]
}

fn category_spike(ctx: &EvaluationContext, multiplier: f64, min_amount: f64) -> Vec<RuleMatch> {
    let current_start = month_start(ctx.as_of);

    // Prior calendar months that have any data at all
    let mut prior = Vec::new();
    let mut cursor = current_start;
    for _ in 0..SPIKE_BASELINE_MONTHS {
        let start = month_start(cursor - Duration::days(1));
        let end = cursor - Duration::days(1);
        if ctx.transactions.iter().any(|t| t.date >= start && t.date <= end) {
            prior.push((start, end));
        }
        cursor = start;
    }
    if prior.is_empty() {
        return vec![];
    }

    let elapsed = ctx.as_of.day() as f64 / days_in_month(ctx.as_of) as f64;
    let current = month_spend_by_category(ctx);

    current
        .iter()
        .filter(|(cat, amount)| **cat != Category::Income && **amount >= min_amount)
        .filter_map(|(cat, amount)| {
            let prior_total: f64 = ctx
                .transactions
                .iter()
                .filter(|t| t.category == *cat)
                .filter(|t| prior.iter().any(|(s, e)| t.date >= *s && t.date <= *e))
                .map(|t| t.spend())
                .sum();
            let monthly_average = prior_total / prior.len() as f64;
            let baseline = monthly_average * elapsed;
            if baseline <= 0.0 {
                return None;
            }
            let ratio = amount / baseline;
            (ratio >= multiplier).then(|| {
                RuleMatch::new(
                    cat.as_str(),
                    ratio,
                    json!({
                        "category": cat.label(),
                        "current": money(*amount),
                        "average": money(monthly_average),
                        "expected": money(baseline),
                        "percent_above": percent(ratio - 1.0),
                    }),
                )
            })
        })
        .collect()
}

fn trend_window_start(ctx: &EvaluationContext) -> NaiveDate {
    ctx.as_of - Duration::days(ctx.trend_window_days.max(1) - 1)
}

fn weekend_skew(ctx: &EvaluationContext, min_ratio: f64) -> Vec<RuleMatch> {
    let pattern = day_of_week_pattern(&ctx.transactions, trend_window_start(ctx), ctx.as_of);
    match pattern.weekend_ratio {
        Some(ratio) if ratio >= min_ratio && pattern.weekend_daily_average > 0.0 => {
            vec![RuleMatch::new(
                OVERALL,
                ratio,
                json!({
                    "weekend_average": money(pattern.weekend_daily_average),
                    "weekday_average": money(pattern.weekday_daily_average),
                    "ratio": one_decimal(ratio),
                    "window_days": ctx.trend_window_days,
                }),
            )]
        }
        _ => vec![],
    }
}

fn late_night(ctx: &EvaluationContext, min_count: usize) -> Vec<RuleMatch> {
    let start = trend_window_start(ctx);
    let window: Vec<Transaction> = ctx
        .transactions
        .iter()
        .filter(|t| t.date >= start && t.date <= ctx.as_of)
        .cloned()
        .collect();
    let pattern = hour_pattern(&window);
    if pattern.late_night_count < min_count {
        return vec![];
    }

    vec![RuleMatch::new(
        OVERALL,
        pattern.late_night_count as f64,
        json!({
            "count": pattern.late_night_count,
            "total": money(pattern.late_night_total),
            "window_days": ctx.trend_window_days,
        }),
    )]
}

fn savings_rate(ctx: &EvaluationContext, min_rate: Option<f64>, max_rate: Option<f64>) -> Vec<RuleMatch> {
    let Some(income) = ctx.monthly_income.filter(|i| *i > 0.0) else {
        return vec![];
    };
    let goal = ctx.savings_goal;
    if goal <= 0.0 {
        return vec![];
    }

    let projection = project_month_end(&ctx.transactions, ctx.as_of, ctx.trend_window_days);
    let saved = income - projection.projected_total;
    let rate = saved / income;
    let goal_ratio = rate / goal;

    if min_rate.is_some_and(|min| goal_ratio < min) || max_rate.is_some_and(|max| goal_ratio >= max) {
        return vec![];
    }

    vec![RuleMatch::new(
        OVERALL,
        (1.0 - goal_ratio).abs(),
        json!({
            "rate": percent(rate),
            "goal": percent(goal),
            "income": money(income),
            "projected": money(projection.projected_total),
            "saved": money(saved.max(0.0)),
            "shortfall": money((goal * income - saved).max(0.0)),
        }),
    )]
}

fn predicted_overrun(ctx: &EvaluationContext, min_amount: f64) -> Vec<RuleMatch> {
    forecast_budget_overruns(&ctx.transactions, &ctx.budgets, ctx.as_of, ctx.trend_window_days)
        .into_iter()
        .filter(|f| f.category != Category::Income)
        .filter(|f| f.spent_to_date < f.monthly_limit && f.projected_overrun >= min_amount)
        .map(|f| {
            let crossing = f
                .crossing_date
                .map(|d| d.format("%b %-d").to_string())
                .unwrap_or_else(|| "before month end".to_string());
            RuleMatch::new(
                f.category.as_str(),
                f.projected_overrun / f.monthly_limit,
                json!({
                    "category": f.category.label(),
                    "projected": money(f.projected_total),
                    "limit": money(f.monthly_limit),
                    "overrun": money(f.projected_overrun),
                    "spent": money(f.spent_to_date),
                    "crossing": crossing,
                    "confidence": percent(f.confidence),
                }),
            )
        })
        .collect()
}

fn merchant_slug(merchant: &str) -> String {
    let slug: String = merchant
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    slug.split('-').filter(|p| !p.is_empty()).collect::<Vec<_>>().join("-")
}

fn large_transaction(ctx: &EvaluationContext, multiplier: f64, min_amount: f64) -> Vec<RuleMatch> {
    let recent_from = ctx.as_of - Duration::days(6);

    let history: Vec<f64> = ctx
        .transactions
        .iter()
        .filter(|t| t.date < recent_from && t.spend() > 0.0)
        .map(|t| t.spend())
        .collect();
    if history.len() < LARGE_TX_MIN_HISTORY {
        return vec![];
    }
    let average = history.iter().sum::<f64>() / history.len() as f64;
    let threshold = (average * multiplier).max(min_amount);

    ctx.transactions
        .iter()
        .filter(|t| t.date >= recent_from && t.date <= ctx.as_of && t.spend() >= threshold)
        .map(|t| {
            let multiple = t.spend() / average;
            RuleMatch::new(
                format!("{}-{}", t.date, merchant_slug(&t.merchant)),
                multiple,
                json!({
                    "merchant": t.merchant,
                    "amount": money(t.spend()),
                    "average": money(average),
                    "multiple": one_decimal(multiple),
                    "date": t.date.format("%b %-d").to_string(),
                    "category": t.category.label(),
                }),
            )
        })
        .collect()
}

fn mood_trigger(ctx: &EvaluationContext, min_ratio: f64) -> Vec<RuleMatch> {
    let correlation = mood_correlation(&ctx.transactions, min_ratio);
    let Some(mood) = correlation.trigger else {
        return vec![];
    };
    let Some(spend) = correlation.mood(mood).filter(|m| m.count >= MOOD_MIN_SAMPLES) else {
        return vec![];
    };

    let ratio = spend.average / correlation.overall_average;
    vec![RuleMatch::new(
        mood.as_str(),
        ratio,
        json!({
            "mood": mood.as_str(),
            "average": money(spend.average),
            "overall": money(correlation.overall_average),
            "count": spend.count,
            "percent_above": percent(ratio - 1.0),
        }),
    )]
}

/// Substitute `{name}` placeholders from a JSON object
///
/// Braces that do not wrap a plain identifier are left alone. A well-formed
/// placeholder with no value is an error.
pub fn render(text: &str, data: &Value) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}');
        let name = close.map(|c| &after[..c]);

        match name {
            Some(name)
                if !name.is_empty()
                    && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') =>
            {
                let value = data
                    .get(name)
                    .ok_or_else(|| format!("no value for placeholder {{{}}}", name))?;
                out.push_str(&display_value(value));
                rest = &after[name.len() + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() != 0.0 => format!("{:.2}", f),
            Some(f) if n.is_f64() => format!("{:.0}", f),
            _ => n.to_string(),
        },
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A declarative rule: condition plus content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightTemplate {
    pub id: String,
    pub kind: InsightKind,
    pub priority: Priority,
    pub condition: Condition,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub action: Option<String>,
    /// Hours before the same insight may be emitted again; engine default when unset
    #[serde(default)]
    pub cooldown_hours: Option<i64>,
}

/// Rendered content for one match
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedContent {
    pub title: String,
    pub message: String,
    pub action: Option<String>,
}

impl InsightTemplate {
    pub fn render(&self, m: &RuleMatch) -> Result<RenderedContent> {
        let fail = |reason: String| Error::Rule {
            template: self.id.clone(),
            reason,
        };
        Ok(RenderedContent {
            title: render(&self.title, &m.data).map_err(fail)?,
            message: render(&self.message, &m.data).map_err(fail)?,
            action: self
                .action
                .as_deref()
                .map(|a| render(a, &m.data))
                .transpose()
                .map_err(fail)?,
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn template(
    id: &str,
    kind: InsightKind,
    priority: Priority,
    condition: Condition,
    title: &str,
    message: &str,
    action: &str,
    cooldown_hours: Option<i64>,
) -> InsightTemplate {
    InsightTemplate {
        id: id.to_string(),
        kind,
        priority,
        condition,
        title: title.to_string(),
        message: message.to_string(),
        action: Some(action.to_string()),
        cooldown_hours,
    }
}

/// Ordered set of templates, unique by id
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: Vec<InsightTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in templates, at least one per insight kind
    pub fn builtin(t: &Thresholds) -> Self {
        let mut registry = Self::new();

        registry.register(template(
            "budget_exceeded",
            InsightKind::BudgetOverrun,
            Priority::Critical,
            Condition::BudgetUsage {
                min_ratio: t.budget_exceeded_ratio,
                max_ratio: None,
            },
            "{category} budget exceeded",
            "You've spent ${spent} on {category}, {percent}% of your ${limit} budget and ${over} over.",
            "Pause non-essential {category} spending for the rest of the month.",
            Some(48),
        ));
        registry.register(template(
            "budget_warning",
            InsightKind::BudgetOverrun,
            Priority::Medium,
            Condition::BudgetUsage {
                min_ratio: t.budget_warning_ratio,
                max_ratio: Some(t.budget_exceeded_ratio),
            },
            "{category} budget at {percent}%",
            "You've used ${spent} of your ${limit} {category} budget with {days_left} days to go. ${remaining} left.",
            "Keep {category} to about ${remaining} until the month ends.",
            None,
        ));
        registry.register(template(
            "burn_rate_high",
            InsightKind::BurnRisk,
            Priority::High,
            Condition::BurnRate {
                min_ratio: t.burn_rate_ratio,
            },
            "On pace to overspend this month",
            "At ${daily_average}/day you're heading for ${projected}, {percent}% of your ${budget} monthly budget.",
            "Trim daily spending for the next {days_left} days to land on budget.",
            Some(24),
        ));
        registry.register(template(
            "discretionary_savings",
            InsightKind::SavingsOpportunity,
            Priority::Medium,
            Condition::DiscretionaryShare {
                min_share: t.discretionary_share,
                min_amount: t.discretionary_min_amount,
            },
            "Room to save on extras",
            "{share}% of this month's spending (${amount}) went to extras, led by {top_category} at ${top_amount}.",
            "Cutting extras by a fifth would free up about ${savings}.",
            Some(168),
        ));
        registry.register(template(
            "category_spike",
            InsightKind::SpendingPattern,
            Priority::Medium,
            Condition::CategorySpike {
                multiplier: t.category_spike_multiplier,
                min_amount: t.category_spike_min_amount,
            },
            "{category} spending is up",
            "You've spent ${current} on {category} so far, {percent_above}% above your usual pace (about ${average}/month).",
            "Check recent {category} purchases for anything unplanned.",
            None,
        ));
        registry.register(template(
            "weekend_splurge",
            InsightKind::SpendingPattern,
            Priority::Low,
            Condition::WeekendSkew {
                min_ratio: t.weekend_skew_ratio,
            },
            "Weekends cost you {ratio}x more",
            "Over the last {window_days} days you averaged ${weekend_average} per weekend day vs ${weekday_average} on weekdays.",
            "Plan one low-cost weekend activity.",
            Some(168),
        ));
        registry.register(template(
            "late_night_spending",
            InsightKind::SpendingPattern,
            Priority::Low,
            Condition::LateNight {
                min_count: t.late_night_min_count,
            },
            "Late-night purchases add up",
            "{count} purchases after 10pm in the last {window_days} days totalled ${total}.",
            "Try a 12-hour rule before buying anything late at night.",
            Some(168),
        ));
        registry.register(template(
            "savings_goal_missed",
            InsightKind::GoalProgress,
            Priority::High,
            Condition::SavingsRate {
                min_rate: None,
                max_rate: Some(t.savings_missed_ratio),
            },
            "Savings goal off track",
            "You're on course to save {rate}% of your ${income} income this month against a {goal}% goal.",
            "Move ${shortfall} to savings or cut back to get back on track.",
            None,
        ));
        registry.register(template(
            "savings_goal_behind",
            InsightKind::GoalProgress,
            Priority::Medium,
            Condition::SavingsRate {
                min_rate: Some(t.savings_missed_ratio),
                max_rate: Some(1.0),
            },
            "A little behind your savings goal",
            "Projected savings are {rate}% of income; your goal is {goal}%. You're ${shortfall} short.",
            "A small cut this week closes the ${shortfall} gap.",
            None,
        ));
        registry.register(template(
            "savings_goal_on_track",
            InsightKind::GoalProgress,
            Priority::Low,
            Condition::SavingsRate {
                min_rate: Some(1.0),
                max_rate: None,
            },
            "Savings goal on track",
            "You're set to save ${saved} this month, {rate}% of income, meeting your {goal}% goal.",
            "Consider moving the extra into savings now.",
            Some(336),
        ));
        registry.register(template(
            "predicted_overrun",
            InsightKind::PredictiveSpend,
            Priority::High,
            Condition::PredictedOverrun {
                min_amount: t.predicted_overrun_min_amount,
            },
            "{category} likely to go over budget",
            "At the current pace {category} will reach ${projected} against a ${limit} limit, crossing it around {crossing}.",
            "Hold {category} spending to stay within ${limit}.",
            None,
        ));
        registry.register(template(
            "large_transaction",
            InsightKind::BehavioralAlert,
            Priority::Medium,
            Condition::LargeTransaction {
                multiplier: t.large_transaction_multiplier,
                min_amount: t.large_transaction_min_amount,
            },
            "Unusually large purchase at {merchant}",
            "${amount} at {merchant} on {date} is {multiple}x your typical ${average} purchase.",
            "Make sure this was planned and budgeted.",
            None,
        ));
        registry.register(template(
            "mood_spending",
            InsightKind::BehavioralAlert,
            Priority::Low,
            Condition::MoodTrigger {
                min_ratio: t.mood_trigger_ratio,
            },
            "You spend more when {mood}",
            "Purchases tagged {mood} average ${average}, {percent_above}% above your usual ${overall}.",
            "When you feel {mood}, wait a day before non-essential purchases.",
            Some(336),
        ));

        registry
    }

    /// Add a template, replacing any existing template with the same id
    pub fn register(&mut self, template: InsightTemplate) {
        if let Some(existing) = self.templates.iter_mut().find(|t| t.id == template.id) {
            *existing = template;
        } else {
            self.templates.push(template);
        }
    }

    pub fn get(&self, id: &str) -> Option<&InsightTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InsightTemplate> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn kinds(&self) -> Vec<InsightKind> {
        let mut kinds: Vec<InsightKind> = self.templates.iter().map(|t| t.kind).collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}
