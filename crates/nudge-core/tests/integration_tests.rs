//! Integration tests for nudge-core
//!
//! These exercise the full persona load → engine → persistence → feedback
//! workflow against a throwaway database.

use std::fs;
use std::path::PathBuf;

use chrono::{NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

use nudge_core::{
    analytics,
    insights::{InsightKind, InsightStatus, SensitivityLevel},
    models::NudgeStatus,
    BehaviorAdapter, CoachConfig, Database, FeedbackResponse, InsightEngine, LoadOptions,
    Notification, NotificationHub, PersonaLibrary,
};

/// Overspends dining in March; groceries close to the limit
const OVERSPENDER: &str = r#"{
    "persona": "overspender",
    "savings_goal": 0.2,
    "salary": { "amount": 3000, "frequency": "monthly", "effective_date": "2026-01-01" },
    "budgets": [
        { "category": "Restaurants", "limit": 200 },
        { "category": "Groceries", "limit": 400 }
    ],
    "transactions": [
        { "date": "2026-02-03", "amount": 60.0, "merchant": "Bistro", "category": "restaurants" },
        { "date": "2026-02-10", "amount": 80.0, "merchant": "Whole Foods", "category": "groceries" },
        { "date": "2026-03-02", "amount": 120.0, "merchant": "Bistro", "category": "restaurants", "hour": 19 },
        { "date": "2026-03-06", "amount": 95.0, "merchant": "Pizza Place", "category": "restaurants", "mood": "stressed", "hour": 23 },
        { "date": "2026-03-03", "amount": 340.0, "merchant": "Whole Foods", "category": "groceries" }
    ]
}"#;

/// Blows the same dining budget every month from January to June
const REPEAT_OFFENDER: &str = r#"{
    "persona": "repeat_offender",
    "salary": { "amount": 3000, "frequency": "monthly", "effective_date": "2026-01-01" },
    "budgets": [
        { "category": "Restaurants", "limit": 100 }
    ],
    "transactions": [
        { "date": "2026-01-02", "amount": 150.0, "merchant": "Bistro", "category": "restaurants" },
        { "date": "2026-02-02", "amount": 150.0, "merchant": "Bistro", "category": "restaurants" },
        { "date": "2026-03-02", "amount": 150.0, "merchant": "Bistro", "category": "restaurants" },
        { "date": "2026-04-02", "amount": 150.0, "merchant": "Bistro", "category": "restaurants" },
        { "date": "2026-05-02", "amount": 150.0, "merchant": "Bistro", "category": "restaurants" },
        { "date": "2026-06-02", "amount": 150.0, "merchant": "Bistro", "category": "restaurants" }
    ]
}"#;

fn library() -> (TempDir, PersonaLibrary) {
    let dir = TempDir::new().expect("temp dir");
    fs::write(dir.path().join("overspender.json"), OVERSPENDER).expect("write persona");
    fs::write(dir.path().join("repeat_offender.json"), REPEAT_OFFENDER).expect("write persona");
    let lib = PersonaLibrary::new(dir.path(), 42);
    (dir, lib)
}

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
}

fn noon() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
}

fn roomy_config() -> CoachConfig {
    let mut config = CoachConfig::default();
    config.engine.max_insights = 20;
    config.behavior.max_nudges_normal = 20;
    config
}

// =============================================================================
// Persona → Engine → Persistence
// =============================================================================

#[test]
fn test_persona_to_persisted_insights() {
    let db = Database::in_memory().expect("Failed to create database");
    let (_dir, lib) = library();

    let report = lib
        .load_into_db(&db, "alex", "overspender", LoadOptions::default())
        .expect("persona load");
    assert_eq!(report.inserted, 5);

    let engine = InsightEngine::new(&roomy_config());
    let hub = NotificationHub::new();
    let mut rx = hub.subscribe("alex");

    let run = engine
        .run_and_persist_at(&db, "alex", as_of(), noon(), Some(&hub))
        .expect("engine run");

    assert!(run.generated >= 2);
    assert_eq!(run.persisted, run.generated);
    assert_eq!(run.pushed, run.nudges_created);

    let stored = db.list_insights("alex", Some(InsightStatus::Active)).unwrap();
    assert_eq!(stored.len(), run.persisted);
    assert!(stored
        .iter()
        .any(|i| i.dedupe_key == "budget_exceeded:dining:2026-03"));

    // Top of the list is the critical overrun
    let top = db.top_insights("alex", 1).unwrap();
    assert_eq!(top[0].template_id, "budget_exceeded");

    // Hub saw every nudge plus the summary
    let mut nudges = 0;
    let mut summaries = 0;
    while let Ok(msg) = rx.try_recv() {
        match msg {
            Notification::Nudge { .. } => nudges += 1,
            Notification::InsightsUpdated { .. } => summaries += 1,
            Notification::Pong { .. } => {}
        }
    }
    assert_eq!(nudges, run.pushed);
    assert_eq!(summaries, 1);
}

#[test]
fn test_rerun_is_deduplicated() {
    let db = Database::in_memory().unwrap();
    let (_dir, lib) = library();
    lib.load_into_db(&db, "alex", "overspender", LoadOptions::default())
        .unwrap();

    let engine = InsightEngine::new(&roomy_config());
    let first = engine
        .run_and_persist_at(&db, "alex", as_of(), noon(), None)
        .unwrap();
    let second = engine
        .run_and_persist_at(&db, "alex", as_of(), noon(), None)
        .unwrap();

    assert!(first.generated > 0);
    assert_eq!(second.generated, 0);
    assert_eq!(
        db.list_insights("alex", None).unwrap().len(),
        first.persisted
    );
}

// =============================================================================
// Behavior feedback loop
// =============================================================================

#[test]
fn test_ignored_nudges_lower_sensitivity_and_suppress() {
    let db = Database::in_memory().unwrap();
    let (_dir, lib) = library();
    lib.load_into_db(&db, "alex", "repeat_offender", LoadOptions::default())
        .unwrap();

    let config = CoachConfig::default();
    let engine = InsightEngine::new(&config);
    let adapter = BehaviorAdapter::new(config.behavior.clone());

    // One run per month, each answered once before the next
    for month in 1..=5 {
        let day = NaiveDate::from_ymd_opt(2026, month, 15).unwrap();
        let now = Utc.with_ymd_and_hms(2026, month, 15, 12, 0, 0).unwrap();
        let run = engine
            .run_and_persist_at(&db, "alex", day, now, None)
            .unwrap();
        assert!(run
            .insights
            .iter()
            .any(|i| i.template_id == "budget_exceeded"));

        for nudge in db.list_nudges("alex", Some(NudgeStatus::Pending), 50).unwrap() {
            adapter
                .record_nudge_response(&db, nudge.id, FeedbackResponse::Ignored, now)
                .unwrap();
        }
    }

    let overruns = db
        .list_nudges("alex", Some(NudgeStatus::Ignored), 100)
        .unwrap()
        .into_iter()
        .filter(|n| n.kind == InsightKind::BudgetOverrun.as_str())
        .count();
    assert_eq!(overruns, 5);

    let profile = adapter.load_profile(&db, "alex").unwrap();
    assert!(profile.samples >= 5);
    assert_eq!(profile.sensitivity, SensitivityLevel::Low);
    assert!(profile.is_suppressed(InsightKind::BudgetOverrun));

    // June overspends again, but overrun nudges stay muted
    let june = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
    let run = engine
        .run_and_persist_at(
            &db,
            "alex",
            june,
            Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap(),
            None,
        )
        .unwrap();
    assert!(run.generated <= config.behavior.max_nudges_low);
    assert!(run
        .insights
        .iter()
        .all(|i| i.kind != InsightKind::BudgetOverrun));
}

#[test]
fn test_accepted_feedback_marks_insight() {
    let db = Database::in_memory().unwrap();
    let (_dir, lib) = library();
    lib.load_into_db(&db, "alex", "overspender", LoadOptions::default())
        .unwrap();

    let engine = InsightEngine::new(&roomy_config());
    engine
        .run_and_persist_at(&db, "alex", as_of(), noon(), None)
        .unwrap();

    let nudge = db.list_nudges("alex", None, 1).unwrap().remove(0);
    let adapter = BehaviorAdapter::default();
    let answered = adapter
        .record_nudge_response(&db, nudge.id, FeedbackResponse::Accepted, noon())
        .unwrap();
    assert_eq!(answered.status, NudgeStatus::Accepted);

    let insight = db
        .get_insight(nudge.insight_id.expect("linked insight"))
        .unwrap()
        .unwrap();
    assert_eq!(insight.user_feedback.as_deref(), Some("accepted"));

    let events = db.list_behavior_events("alex").unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].hour, 12);
    assert!(InsightKind::all().contains(&events[0].kind));
}

// =============================================================================
// Analytics over persona data
// =============================================================================

#[test]
fn test_analytics_over_persona() {
    let db = Database::in_memory().unwrap();
    let (_dir, lib) = library();
    lib.load_into_db(&db, "alex", "overspender", LoadOptions::default())
        .unwrap();

    let txs = db
        .list_transactions_between("alex", NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), as_of())
        .unwrap();
    let by_category = analytics::spending_by_category(&txs);
    assert_eq!(by_category[0].total, 420.0);

    let hours = analytics::hour_pattern(&txs);
    assert_eq!(hours.late_night_count, 1);

    let trends = analytics::monthly_trends(&txs, 2, as_of());
    assert_eq!(trends.len(), 2);
    assert_eq!(trends[1].total, 555.0);
}

// =============================================================================
// Shipped persona datasets
// =============================================================================

#[test]
fn test_shipped_personas_parse() {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../personas");
    let lib = PersonaLibrary::new(dir, 42);
    let personas = lib.list().expect("list personas");
    let names: Vec<_> = personas.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["family", "freelancer", "student"]);
    assert!(personas.iter().all(|p| p.transactions > 50));
}
