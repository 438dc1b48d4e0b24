//! Insight Engine - evaluates templates and persists the results

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::config::{CoachConfig, EngineConfig};
use crate::db::Database;
use crate::models::{Category, Transaction};
use crate::normalize::{monthly_income, normalize_budgets};
use crate::notify::{Notification, NotificationHub};
use crate::Result;

use super::behavior::{BehaviorAdapter, BehaviorProfile};
use super::predictive::month_start;
use super::templates::{InsightTemplate, TemplateRegistry};
use super::types::{Insight, InsightState, InsightStatus, RunReport};

/// Everything a rule may look at for one user
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub user_id: String,
    /// Day the evaluation is "as of"; month-to-date rules end here
    pub as_of: NaiveDate,
    /// Transactions in the lookback window, oldest first
    pub transactions: Vec<Transaction>,
    /// Monthly limit per canonical category
    pub budgets: BTreeMap<Category, f64>,
    pub monthly_income: Option<f64>,
    /// Target savings rate (0.0 - 1.0)
    pub savings_goal: f64,
    pub profile: BehaviorProfile,
    pub trend_window_days: i64,
}

impl EvaluationContext {
    /// Build a context from the store
    pub fn load(
        db: &Database,
        user_id: &str,
        as_of: NaiveDate,
        config: &CoachConfig,
        adapter: &BehaviorAdapter,
    ) -> Result<Self> {
        let from = as_of - Duration::days(config.engine.lookback_days.max(1) - 1);
        let transactions = db.list_transactions_between(user_id, from, as_of)?;
        let budgets = normalize_budgets(&db.list_budgets(user_id)?);
        let monthly_income = db
            .salary_as_of(user_id, as_of)?
            .map(|s| monthly_income(&s));
        let savings_goal = db
            .get_user(user_id)?
            .and_then(|u| u.savings_goal)
            .filter(|g| *g > 0.0)
            .unwrap_or(config.thresholds.default_savings_goal);
        let profile = adapter.load_profile(db, user_id)?;

        Ok(Self {
            user_id: user_id.to_string(),
            as_of,
            transactions,
            budgets,
            monthly_income,
            savings_goal,
            profile,
            trend_window_days: config.engine.trend_window_days,
        })
    }

    /// Transactions from the first of the month through `as_of`
    pub fn month_transactions(&self) -> impl Iterator<Item = &Transaction> {
        let start = month_start(self.as_of);
        self.transactions
            .iter()
            .filter(move |t| t.date >= start && t.date <= self.as_of)
    }
}

/// Build the dedupe key for a template match
pub fn dedupe_key(template_id: &str, subject: &str, as_of: NaiveDate) -> String {
    format!("{}:{}:{}", template_id, subject, as_of.format("%Y-%m"))
}

/// The main insight engine
pub struct InsightEngine {
    registry: TemplateRegistry,
    adapter: BehaviorAdapter,
    config: CoachConfig,
}

impl InsightEngine {
    /// Engine with the built-in templates
    pub fn new(config: &CoachConfig) -> Self {
        Self::with_registry(config, TemplateRegistry::builtin(&config.thresholds))
    }

    pub fn with_registry(config: &CoachConfig, registry: TemplateRegistry) -> Self {
        Self {
            registry,
            adapter: BehaviorAdapter::new(config.behavior.clone()),
            config: config.clone(),
        }
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Register an extra template (replaces one with the same id)
    pub fn register(&mut self, template: InsightTemplate) {
        self.registry.register(template);
    }

    pub fn adapter(&self) -> &BehaviorAdapter {
        &self.adapter
    }

    fn engine_config(&self) -> &EngineConfig {
        &self.config.engine
    }

    fn cooldown(&self, template_id: &str) -> Duration {
        let hours = self
            .registry
            .get(template_id)
            .and_then(|t| t.cooldown_hours)
            .unwrap_or(self.engine_config().default_cooldown_hours);
        Duration::hours(hours.max(0))
    }

    /// Evaluate every template in registry order
    ///
    /// A template that fails is logged and skipped; the rest still run.
    pub fn evaluate(&self, ctx: &EvaluationContext, now: DateTime<Utc>) -> Vec<Insight> {
        let mut insights = Vec::new();

        for template in self.registry.iter() {
            let matches = match template.condition.evaluate(ctx, &self.adapter) {
                Ok(matches) => matches,
                Err(reason) => {
                    tracing::warn!(
                        user_id = %ctx.user_id,
                        template = %template.id,
                        error = %reason,
                        "Insight rule failed"
                    );
                    continue;
                }
            };

            for m in matches {
                let content = match template.render(&m) {
                    Ok(content) => content,
                    Err(e) => {
                        tracing::warn!(
                            user_id = %ctx.user_id,
                            template = %template.id,
                            subject = %m.subject,
                            error = %e,
                            "Insight rendering failed"
                        );
                        continue;
                    }
                };

                insights.push(Insight {
                    template_id: template.id.clone(),
                    kind: template.kind,
                    priority: template.priority,
                    dedupe_key: dedupe_key(&template.id, &m.subject, ctx.as_of),
                    subject: m.subject,
                    title: content.title,
                    message: content.message,
                    action: content.action,
                    score: m.score,
                    data: m.data,
                    generated_at: now,
                });
            }

            tracing::debug!(
                user_id = %ctx.user_id,
                template = %template.id,
                total = insights.len(),
                "Template evaluated"
            );
        }

        insights
    }

    /// Evaluate, then dedupe, filter and rank
    ///
    /// `states` is what the store already holds for this user, keyed by
    /// dedupe key. Insights that are dismissed, snoozed, or still inside their
    /// template's cooldown are dropped, as are kinds the user's feedback has
    /// suppressed. The result is capped at the behavior-derived nudge limit.
    pub fn analyze(
        &self,
        ctx: &EvaluationContext,
        states: &HashMap<String, InsightState>,
        now: DateTime<Utc>,
    ) -> Vec<Insight> {
        let candidates = dedupe(self.evaluate(ctx, now));

        let mut insights: Vec<Insight> = candidates
            .into_iter()
            .filter(|insight| {
                if ctx.profile.is_suppressed(insight.kind) {
                    tracing::debug!(kind = %insight.kind, "Insight kind suppressed by feedback");
                    return false;
                }
                match states.get(&insight.dedupe_key) {
                    None => true,
                    Some(state) => match state.status {
                        InsightStatus::Dismissed => false,
                        InsightStatus::Snoozed if state.snoozed_until.is_some_and(|u| u > now) => false,
                        _ => state.last_generated_at + self.cooldown(&insight.template_id) <= now,
                    },
                }
            })
            .collect();

        prioritize(&mut insights);

        let limit = self
            .adapter
            .max_nudges(ctx.profile.sensitivity)
            .min(self.engine_config().max_insights);
        insights.truncate(limit);
        insights
    }

    /// Load a user's context and analyze it
    pub fn run(&self, db: &Database, user_id: &str, as_of: NaiveDate) -> Result<Vec<Insight>> {
        let ctx = EvaluationContext::load(db, user_id, as_of, &self.config, &self.adapter)?;
        let states = db.insight_states(user_id)?;
        Ok(self.analyze(&ctx, &states, Utc::now()))
    }

    /// Run for today and persist the results
    pub fn run_and_persist(
        &self,
        db: &Database,
        user_id: &str,
        hub: Option<&NotificationHub>,
    ) -> Result<RunReport> {
        let now = Utc::now();
        self.run_and_persist_at(db, user_id, now.date_naive(), now, hub)
    }

    /// Analyze, upsert each insight, and create a nudge for each active one
    ///
    /// Nudges are pushed to the hub when one is given and the user's delivery
    /// window is open; otherwise they stay pending. A single failed write is
    /// logged and does not abort the run.
    pub fn run_and_persist_at(
        &self,
        db: &Database,
        user_id: &str,
        as_of: NaiveDate,
        now: DateTime<Utc>,
        hub: Option<&NotificationHub>,
    ) -> Result<RunReport> {
        let ctx = EvaluationContext::load(db, user_id, as_of, &self.config, &self.adapter)?;
        let states = db.insight_states(user_id)?;
        let insights = self.analyze(&ctx, &states, now);

        let deliver_at = self.adapter.next_delivery_time(&ctx.profile, now);
        let deliver_now = deliver_at <= now;

        let mut report = RunReport {
            generated: insights.len(),
            deferred_until: (!deliver_now).then_some(deliver_at),
            ..Default::default()
        };

        for insight in &insights {
            let outcome = match db.upsert_insight(user_id, insight) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(
                        user_id,
                        key = %insight.dedupe_key,
                        error = %e,
                        "Failed to persist insight"
                    );
                    continue;
                }
            };
            report.persisted += 1;

            if outcome.status != InsightStatus::Active {
                continue;
            }

            let nudge = match db.insert_nudge(user_id, Some(outcome.id), insight) {
                Ok(nudge) => nudge,
                Err(e) => {
                    tracing::warn!(user_id, insight_id = outcome.id, error = %e, "Failed to create nudge");
                    continue;
                }
            };
            report.nudges_created += 1;

            if let (Some(hub), true) = (hub, deliver_now) {
                if hub.publish(user_id, Notification::from(&nudge)) > 0 {
                    if let Err(e) = db.mark_nudge_delivered(nudge.id) {
                        tracing::warn!(nudge_id = nudge.id, error = %e, "Failed to mark nudge delivered");
                    }
                    report.pushed += 1;
                }
            }
        }

        if let Some(hub) = hub {
            hub.publish(
                user_id,
                Notification::InsightsUpdated {
                    generated: report.generated,
                    persisted: report.persisted,
                },
            );
        }

        tracing::info!(
            user_id,
            generated = report.generated,
            persisted = report.persisted,
            nudges = report.nudges_created,
            pushed = report.pushed,
            "Insight run complete"
        );

        report.insights = insights;
        Ok(report)
    }
}

/// Keep the highest-scoring insight per dedupe key, in first-seen order
pub fn dedupe(insights: Vec<Insight>) -> Vec<Insight> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<Insight> = Vec::with_capacity(insights.len());

    for insight in insights {
        match index.get(&insight.dedupe_key) {
            Some(&i) => {
                if insight.score > kept[i].score {
                    kept[i] = insight;
                }
            }
            None => {
                index.insert(insight.dedupe_key.clone(), kept.len());
                kept.push(insight);
            }
        }
    }
    kept
}

/// Priority first, then score, then template id for a stable order
pub fn prioritize(insights: &mut [Insight]) {
    insights.sort_by(|a, b| {
        b.priority
            .rank()
            .cmp(&a.priority.rank())
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.template_id.cmp(&b.template_id))
    });
}
