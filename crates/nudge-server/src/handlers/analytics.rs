//! Spending analytics handlers
//!
//! Every endpoint works over the same lookback window the insight engine
//! uses, so numbers here line up with what the nudges say.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::as_of_or_today;
use crate::{AppError, AppState};
use nudge_core::analytics::{
    self, CategorySpend, DayOfWeekPattern, HealthScore, HourPattern, MonthTrend, MoodCorrelation,
};
use nudge_core::insights::predictive::{
    self, BudgetForecast, MonthEndProjection, WeekPrediction,
};
use nudge_core::EvaluationContext;

/// Weeks of history behind the next-week prediction
const PREDICTION_WEEKS: i64 = 4;

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    /// Evaluate as of this day (default today)
    pub as_of: Option<NaiveDate>,
    /// Months of history for trends (default 6)
    pub months: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct PatternsResponse {
    pub by_category: Vec<CategorySpend>,
    pub day_of_week: DayOfWeekPattern,
    pub hours: HourPattern,
}

#[derive(Debug, Serialize)]
pub struct PredictionsResponse {
    pub month_end: MonthEndProjection,
    pub budgets: Vec<BudgetForecast>,
    pub next_week: WeekPrediction,
}

fn load_context(
    state: &AppState,
    user_id: &str,
    as_of: Option<NaiveDate>,
) -> Result<EvaluationContext, AppError> {
    let ctx = EvaluationContext::load(
        &state.db,
        user_id,
        as_of_or_today(as_of),
        &state.coach,
        state.engine.adapter(),
    )?;
    Ok(ctx)
}

/// GET /api/users/:user_id/analytics/patterns
pub async fn get_patterns(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<AnalyticsQuery>,
) -> Result<Json<PatternsResponse>, AppError> {
    let ctx = load_context(&state, &user_id, params.as_of)?;
    let from = ctx.as_of - Duration::days(state.coach.engine.lookback_days.max(1) - 1);

    Ok(Json(PatternsResponse {
        by_category: analytics::spending_by_category(&ctx.transactions),
        day_of_week: analytics::day_of_week_pattern(&ctx.transactions, from, ctx.as_of),
        hours: analytics::hour_pattern(&ctx.transactions),
    }))
}

/// GET /api/users/:user_id/analytics/trends
pub async fn get_trends(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<AnalyticsQuery>,
) -> Result<Json<Vec<MonthTrend>>, AppError> {
    let months = params.months.unwrap_or(6).clamp(1, 24);
    let as_of = as_of_or_today(params.as_of);

    // Trends may reach past the engine's lookback window
    let from = as_of - Duration::days(i64::from(months) * 31);
    let txs = state.db.list_transactions_between(&user_id, from, as_of)?;

    Ok(Json(analytics::monthly_trends(&txs, months, as_of)))
}

/// GET /api/users/:user_id/analytics/health
pub async fn get_health(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<AnalyticsQuery>,
) -> Result<Json<HealthScore>, AppError> {
    let ctx = load_context(&state, &user_id, params.as_of)?;
    Ok(Json(analytics::health_score(
        &ctx.transactions,
        &ctx.budgets,
        ctx.monthly_income,
        ctx.as_of,
    )))
}

/// GET /api/users/:user_id/analytics/mood
pub async fn get_mood(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<AnalyticsQuery>,
) -> Result<Json<MoodCorrelation>, AppError> {
    let ctx = load_context(&state, &user_id, params.as_of)?;
    Ok(Json(analytics::mood_correlation(
        &ctx.transactions,
        state.coach.thresholds.mood_trigger_ratio,
    )))
}

/// GET /api/users/:user_id/analytics/predictions
pub async fn get_predictions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<AnalyticsQuery>,
) -> Result<Json<PredictionsResponse>, AppError> {
    let ctx = load_context(&state, &user_id, params.as_of)?;
    let window = ctx.trend_window_days;

    Ok(Json(PredictionsResponse {
        month_end: predictive::project_month_end(&ctx.transactions, ctx.as_of, window),
        budgets: predictive::forecast_budget_overruns(
            &ctx.transactions,
            &ctx.budgets,
            ctx.as_of,
            window,
        ),
        next_week: predictive::predict_next_week(&ctx.transactions, ctx.as_of, PREDICTION_WEEKS),
    }))
}
