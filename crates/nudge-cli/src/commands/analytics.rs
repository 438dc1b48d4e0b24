//! Spending analytics report

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use nudge_core::analytics;
use nudge_core::insights::predictive;
use nudge_core::{CoachConfig, Database, EvaluationContext, InsightEngine};

pub fn cmd_analytics(
    db: &Database,
    config: &CoachConfig,
    user_id: &str,
    as_of: Option<NaiveDate>,
) -> Result<()> {
    let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
    let engine = InsightEngine::new(config);
    let ctx = EvaluationContext::load(db, user_id, as_of, config, engine.adapter())
        .context("Failed to load spending data")?;

    println!(
        "📊 Spending report for {} ({} transactions, last {} days)",
        user_id,
        ctx.transactions.len(),
        config.engine.lookback_days
    );

    if ctx.transactions.is_empty() {
        println!("   No transactions yet. Try: nudge persona --user {} --name student", user_id);
        return Ok(());
    }

    println!();
    println!("Top categories");
    for spend in analytics::spending_by_category(&ctx.transactions).iter().take(5) {
        println!(
            "  {:<16} ${:>9.2}  {:>5.1}%",
            spend.category.label(),
            spend.total,
            spend.share * 100.0
        );
    }

    let health = analytics::health_score(&ctx.transactions, &ctx.budgets, ctx.monthly_income, as_of);
    println!();
    println!("Financial health: {} ({}) - {}", health.score, health.grade, health.label);

    let projection = predictive::project_month_end(&ctx.transactions, as_of, ctx.trend_window_days);
    println!();
    println!(
        "Month to date: ${:.2}, projected month end: ${:.2} ({:.0}% confidence)",
        projection.spent_to_date,
        projection.projected_total,
        projection.confidence * 100.0
    );

    let forecasts =
        predictive::forecast_budget_overruns(&ctx.transactions, &ctx.budgets, as_of, ctx.trend_window_days);
    for forecast in forecasts.iter().filter(|f| f.will_overrun()) {
        let when = forecast
            .crossing_date
            .map(|d| format!(" around {}", d))
            .unwrap_or_default();
        println!(
            "  ⚠️  {} on pace to exceed ${:.0} by ${:.2}{}",
            forecast.category.label(),
            forecast.monthly_limit,
            forecast.projected_overrun,
            when
        );
    }

    let mood = analytics::mood_correlation(&ctx.transactions, config.thresholds.mood_trigger_ratio);
    if let (Some(trigger), Some(ratio)) = (mood.trigger, mood.trigger_ratio) {
        println!();
        println!(
            "Mood: spending runs {:.1}x higher when {}",
            ratio,
            trigger.as_str()
        );
    }

    Ok(())
}
