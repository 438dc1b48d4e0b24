//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::NaiveDate;
use http_body_util::BodyExt;
use std::path::PathBuf;
use tower::ServiceExt;

use nudge_core::models::{
    Category, NewBudget, NewSalary, NewTransaction, NewUser, PayFrequency, TransactionSource,
};
use nudge_core::{InsightStatus, Notification};

fn coach_config() -> CoachConfig {
    let mut coach = CoachConfig::default();
    coach.engine.max_insights = 20;
    coach.behavior.max_nudges_normal = 20;
    coach.personas.directory = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../personas");
    coach
}

fn test_state(config: ServerConfig) -> Arc<AppState> {
    let db = Database::in_memory().unwrap();
    Arc::new(AppState::new(db, config, coach_config(), None))
}

fn open_config() -> ServerConfig {
    ServerConfig {
        require_auth: false,
        allowed_origins: vec![],
        ..Default::default()
    }
}

fn setup_test_app() -> (Arc<AppState>, Router) {
    let state = test_state(open_config());
    let app = create_router_with_state(state.clone());
    (state, app)
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn tx(date: &str, amount: f64, merchant: &str, category: Category) -> NewTransaction {
    NewTransaction {
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        amount,
        merchant: merchant.to_string(),
        category,
        raw_category: None,
        mood: None,
        hour: Some(19),
        source: TransactionSource::Manual,
    }
}

/// Dining over budget in March 2026, groceries close to the limit
fn seed_overspender(db: &Database) {
    db.upsert_user(&NewUser {
        user_id: "alex".into(),
        name: "Alex".into(),
        ..Default::default()
    })
    .unwrap();
    db.upsert_budget(
        "alex",
        &NewBudget {
            category: Category::Dining,
            limit: 200.0,
            period: Default::default(),
        },
    )
    .unwrap();
    db.upsert_budget(
        "alex",
        &NewBudget {
            category: Category::Groceries,
            limit: 400.0,
            period: Default::default(),
        },
    )
    .unwrap();
    db.insert_salary(
        "alex",
        &NewSalary {
            amount: 3000.0,
            frequency: PayFrequency::Monthly,
            effective_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        },
    )
    .unwrap();
    db.insert_transactions(
        "alex",
        &[
            tx("2026-02-03", 60.0, "Bistro", Category::Dining),
            tx("2026-02-10", 80.0, "Whole Foods", Category::Groceries),
            tx("2026-03-02", 120.0, "Bistro", Category::Dining),
            tx("2026-03-06", 95.0, "Pizza Place", Category::Dining),
            tx("2026-03-03", 340.0, "Whole Foods", Category::Groceries),
        ],
    )
    .unwrap();
}

// ========== Health & Auth Tests ==========

#[tokio::test]
async fn test_health_is_public() {
    let state = test_state(ServerConfig {
        require_auth: true,
        api_keys: vec!["secret".into()],
        ..Default::default()
    });
    let app = create_router_with_state(state);

    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["ai_enabled"], false);
}

#[tokio::test]
async fn test_auth_required() {
    let state = test_state(ServerConfig {
        require_auth: true,
        api_keys: vec!["secret".into()],
        ..Default::default()
    });
    let app = create_router_with_state(state);

    let response = app.clone().oneshot(get("/api/users/alex")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "Authentication required");

    let wrong = Request::builder()
        .uri("/api/users/alex")
        .header("authorization", "Bearer nope")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(wrong).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_with_api_key() {
    let state = test_state(ServerConfig {
        require_auth: true,
        api_keys: vec!["other".into(), "secret".into()],
        ..Default::default()
    });
    let app = create_router_with_state(state);

    let request = Request::builder()
        .uri("/api/users/alex")
        .header("authorization", "Bearer secret")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    // Authenticated, but the user doesn't exist yet
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_validate_api_key() {
    let keys = vec!["abc123".to_string()];
    assert!(validate_api_key("abc123", &keys));
    assert!(!validate_api_key("abc124", &keys));
    assert!(!validate_api_key("abc", &keys));
    assert!(!validate_api_key("abc123", &[]));
}

#[test]
fn test_app_error_maps_core_errors() {
    let err = AppError::from(nudge_core::Error::NotFound("nudge 9".into()));
    assert_eq!(err.status(), StatusCode::NOT_FOUND);

    let err = AppError::from(nudge_core::Error::InvalidData("bad".into()));
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    let err = AppError::from(nudge_core::Error::Conflict("answered".into()));
    assert_eq!(err.status(), StatusCode::CONFLICT);

    let err = AppError::from(nudge_core::Error::Config("oops".into()));
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

// ========== User Tests ==========

#[tokio::test]
async fn test_create_and_get_user() {
    let (_state, app) = setup_test_app();

    let body = serde_json::json!({
        "user_id": "sam",
        "name": "Sam",
        "savings_goal": 0.15
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/users", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/api/users/sam")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["name"], "Sam");
    assert_eq!(json["savings_goal"], 0.15);
}

#[tokio::test]
async fn test_create_user_validation() {
    let (_state, app) = setup_test_app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/users",
            serde_json::json!({ "user_id": "sam", "name": "  " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(post_json(
            "/api/users",
            serde_json::json!({ "user_id": "sam", "name": "Sam", "savings_goal": 1.5 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== Transaction / Budget / Salary Tests ==========

#[tokio::test]
async fn test_create_and_list_transactions() {
    let (_state, app) = setup_test_app();

    let body = serde_json::json!({
        "date": "2026-03-02",
        "amount": 42.5,
        "merchant": "Bistro",
        "category": "Restaurants",
        "mood": "stressed",
        "hour": 22
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/users/alex/transactions", body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(get_body_json(response).await["id"].as_i64().is_some());

    // Same row again is a duplicate
    let response = app
        .clone()
        .oneshot(post_json("/api/users/alex/transactions", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(get(
            "/api/users/alex/transactions?from=2026-03-01&to=2026-03-31",
        ))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    let txs = json.as_array().unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0]["category"], "dining");
    assert_eq!(txs[0]["raw_category"], "Restaurants");

    let response = app
        .oneshot(get("/api/users/alex/transactions?from=2026-04-01&to=2026-03-01"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_transaction_validation() {
    let (_state, app) = setup_test_app();

    let response = app
        .oneshot(post_json(
            "/api/users/alex/transactions",
            serde_json::json!({
                "date": "2026-03-02",
                "amount": 10.0,
                "merchant": "Cafe",
                "hour": 24
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_budget_lifecycle() {
    let (_state, app) = setup_test_app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/users/alex/budgets",
            serde_json::json!({ "category": "Food & Dining", "limit": 250 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let id = get_body_json(response).await["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(get("/api/users/alex/budgets"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json[0]["category"], "dining");
    assert_eq!(json[0]["period"], "monthly");

    let delete = |uri: String| {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    };
    let response = app
        .clone()
        .oneshot(delete(format!("/api/budgets/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(delete(format!("/api/budgets/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_budget_rejects_bad_limit() {
    let (_state, app) = setup_test_app();

    let response = app
        .oneshot(post_json(
            "/api/users/alex/budgets",
            serde_json::json!({ "category": "groceries", "limit": 0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_salaries() {
    let (_state, app) = setup_test_app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/users/alex/salaries",
            serde_json::json!({
                "amount": 52000,
                "frequency": "yearly",
                "effective_date": "2026-01-01"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get("/api/users/alex/salaries"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["frequency"], "yearly");
}

// ========== Persona Tests ==========

#[tokio::test]
async fn test_list_and_load_personas() {
    let (state, app) = setup_test_app();

    let response = app.clone().oneshot(get("/api/personas")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    let names: Vec<_> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["family", "freelancer", "student"]);

    let response = app
        .clone()
        .oneshot(post_empty("/api/users/sam/personas/student/load"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert!(json["inserted"].as_u64().unwrap() > 50);
    assert_eq!(json["salary"], true);

    let user = state.db.get_user("sam").unwrap().unwrap();
    assert_eq!(user.persona.as_deref(), Some("student"));

    let response = app
        .oneshot(post_empty("/api/users/sam/personas/nobody/load"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_load_persona_with_window() {
    let (state, app) = setup_test_app();

    let response = app
        .oneshot(post_empty(
            "/api/users/sam/personas/student/load?from=2026-02-01&to=2026-02-28",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let first = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
    let last = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
    let txs = state.db.list_transactions_between("sam", first, last).unwrap();
    assert!(!txs.is_empty());
    assert!(txs.iter().all(|t| t.date.format("%Y-%m").to_string() == "2026-02"));
}

#[tokio::test]
async fn test_load_persona_rejects_huge_synthesis_window() {
    let (state, app) = setup_test_app();

    let response = app
        .clone()
        .oneshot(post_empty(
            "/api/users/sam/personas/student/load?from=1000-01-01&to=2026-12-31&synthesize=true",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(state.db.get_user("sam").unwrap().is_none());

    // Open-ended windows are checked against the dataset's own range
    let response = app
        .oneshot(post_empty(
            "/api/users/sam/personas/student/load?from=2000-01-01&synthesize=true",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.db.count_transactions("sam").unwrap(), 0);
}

// ========== Insight Tests ==========

#[tokio::test]
async fn test_generate_and_manage_insights() {
    let (state, app) = setup_test_app();
    seed_overspender(&state.db);
    let mut rx = state.hub.subscribe("alex");

    let response = app
        .clone()
        .oneshot(post_empty("/api/users/alex/insights/generate?as_of=2026-03-15"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = get_body_json(response).await;
    assert!(report["generated"].as_u64().unwrap() >= 2);

    // Every run announces itself to live connections
    let mut saw_summary = false;
    while let Ok(msg) = rx.try_recv() {
        if matches!(msg, Notification::InsightsUpdated { .. }) {
            saw_summary = true;
        }
    }
    assert!(saw_summary);

    let response = app
        .clone()
        .oneshot(get("/api/users/alex/insights?status=active"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    let insights = json.as_array().unwrap();
    let exceeded = insights
        .iter()
        .find(|i| i["template_id"] == "budget_exceeded")
        .expect("dining overrun");
    assert_eq!(exceeded["dedupe_key"], "budget_exceeded:dining:2026-03");
    let id = exceeded["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(get(&format!("/api/insights/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/insights/{}/feedback", id),
            serde_json::json!({ "feedback": "helpful" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post_empty(&format!("/api/insights/{}/dismiss", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stored = state.db.get_insight(id).unwrap().unwrap();
    assert_eq!(stored.status, InsightStatus::Dismissed);
    assert_eq!(stored.user_feedback.as_deref(), Some("helpful"));

    let response = app
        .clone()
        .oneshot(post_empty(&format!("/api/insights/{}/restore", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/insights/{}/snooze", id),
            serde_json::json!({ "days": 7 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(get_body_json(response).await["snoozed_until"].is_string());

    let response = app
        .oneshot(post_json(
            &format!("/api/insights/{}/snooze", id),
            serde_json::json!({ "days": 0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_insight_errors() {
    let (_state, app) = setup_test_app();

    let response = app
        .clone()
        .oneshot(get("/api/insights/999"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(post_empty("/api/insights/999/dismiss"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(get("/api/users/alex/insights?status=bogus"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== Nudge & Behavior Tests ==========

#[tokio::test]
async fn test_respond_to_nudge_updates_behavior() {
    let (state, app) = setup_test_app();
    seed_overspender(&state.db);

    app.clone()
        .oneshot(post_empty("/api/users/alex/insights/generate?as_of=2026-03-15"))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(get("/api/users/alex/nudges"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    let nudges = json.as_array().unwrap();
    assert!(!nudges.is_empty());
    let id = nudges[0]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/nudges/{}/respond", id),
            serde_json::json!({ "response": "accepted" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await["status"], "accepted");

    let response = app
        .clone()
        .oneshot(get("/api/users/alex/nudges?status=accepted"))
        .await
        .unwrap();
    assert_eq!(get_body_json(response).await.as_array().unwrap().len(), 1);

    // A nudge takes one answer
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/nudges/{}/respond", id),
            serde_json::json!({ "response": "ignored" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(get("/api/users/alex/behavior"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["samples"], 1);
    assert_eq!(json["sensitivity"], "normal");
    assert!(json["max_nudges"].as_u64().is_some());

    let response = app
        .oneshot(post_json(
            "/api/nudges/9999/respond",
            serde_json::json!({ "response": "ignored" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_respond_rejects_unknown_answer() {
    let (_state, app) = setup_test_app();

    let response = app
        .oneshot(post_json(
            "/api/nudges/1/respond",
            serde_json::json!({ "response": "maybe" }),
        ))
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

// ========== Analytics Tests ==========

#[tokio::test]
async fn test_analytics_endpoints() {
    let (state, app) = setup_test_app();
    seed_overspender(&state.db);

    let response = app
        .clone()
        .oneshot(get("/api/users/alex/analytics/patterns?as_of=2026-03-15"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["by_category"][0]["category"], "groceries");
    assert!(json["hours"]["by_hour"].is_array());

    let response = app
        .clone()
        .oneshot(get("/api/users/alex/analytics/trends?as_of=2026-03-15&months=3"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 3);

    let response = app
        .clone()
        .oneshot(get("/api/users/alex/analytics/health?as_of=2026-03-15"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert!(json["score"].as_u64().unwrap() <= 100);

    let response = app
        .clone()
        .oneshot(get("/api/users/alex/analytics/mood?as_of=2026-03-15"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get("/api/users/alex/analytics/predictions?as_of=2026-03-15"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert!(json["month_end"]["projected_total"].as_f64().unwrap() >= 555.0);
    assert_eq!(json["budgets"].as_array().unwrap().len(), 2);
    assert!(json["next_week"]["expected_total"].is_number());
}

// ========== Chat Tests ==========

#[tokio::test]
async fn test_chat_fallback_and_history() {
    let (state, app) = setup_test_app();
    seed_overspender(&state.db);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/users/alex/chat",
            serde_json::json!({ "message": "How is my budget looking?" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["topic"], "budget");
    assert_eq!(json["source"], "fallback");
    assert!(!json["reply"].as_str().unwrap().is_empty());

    let response = app
        .clone()
        .oneshot(get("/api/users/alex/chat/history"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    let history = json.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["role"], "user");
    assert_eq!(history[1]["role"], "assistant");

    let response = app
        .oneshot(post_json(
            "/api/users/alex/chat",
            serde_json::json!({ "message": "   " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_with_mock_backend() {
    let db = Database::in_memory().unwrap();
    let state = Arc::new(AppState::new(
        db,
        open_config(),
        coach_config(),
        Some(AIClient::mock()),
    ));
    let app = create_router_with_state(state);

    let response = app
        .oneshot(post_json(
            "/api/users/alex/chat",
            serde_json::json!({ "message": "hello" }),
        ))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["source"], "ai");
    assert!(json["reply"].as_str().unwrap().contains("hello"));
}
