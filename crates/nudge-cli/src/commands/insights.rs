//! Insight engine command

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use tracing::debug;
use nudge_core::{CoachConfig, Database, Insight, InsightEngine, Priority};

use super::truncate;

fn priority_icon(priority: Priority) -> &'static str {
    match priority {
        Priority::Critical => "🚨",
        Priority::High => "⚠️ ",
        Priority::Medium => "💡",
        Priority::Low => "ℹ️ ",
    }
}

fn print_insight(insight: &Insight) {
    println!(
        "  {} [{}] {}",
        priority_icon(insight.priority),
        insight.priority,
        insight.title
    );
    println!("     {}", truncate(&insight.message, 120));
    if let Some(action) = &insight.action {
        println!("     → {}", action);
    }
}

pub fn cmd_insights(
    db: &Database,
    config: &CoachConfig,
    user_id: &str,
    as_of: Option<NaiveDate>,
    persist: bool,
    json: bool,
) -> Result<()> {
    let now = Utc::now();
    let as_of = as_of.unwrap_or_else(|| now.date_naive());
    if !json {
        println!("🔍 Analyzing {} as of {}...", user_id, as_of);
    }

    let engine = InsightEngine::new(config);

    let insights = if persist {
        let report = engine
            .run_and_persist_at(db, user_id, as_of, now, None)
            .context("Insight run failed")?;
        debug!(
            user_id,
            persisted = report.persisted,
            nudges = report.nudges_created,
            "Persisted insight run"
        );
        if !json {
            println!(
                "   Stored {} insight(s), created {} nudge(s)",
                report.persisted, report.nudges_created
            );
            if let Some(until) = report.deferred_until {
                println!("   Delivery deferred until {}", until.format("%Y-%m-%d %H:%M UTC"));
            }
        }
        report.insights
    } else {
        engine.run(db, user_id, as_of).context("Insight run failed")?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&insights)?);
        return Ok(());
    }

    println!();
    if insights.is_empty() {
        println!("✅ Nothing to flag - spending looks on track.");
        return Ok(());
    }

    println!("📋 {} insight(s)", insights.len());
    for insight in &insights {
        print_insight(insight);
    }

    Ok(())
}
