//! Persona dataset handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{AppError, AppState};
use nudge_core::personas::MAX_SYNTHESIS_DAYS;
use nudge_core::{LoadOptions, PersonaLoadReport, PersonaSummary};

/// Query parameters for loading a persona
#[derive(Debug, Deserialize)]
pub struct LoadPersonaQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Fill empty days with synthetic rows (defaults to the coach config)
    pub synthesize: Option<bool>,
}

/// GET /api/personas
pub async fn list_personas(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PersonaSummary>>, AppError> {
    Ok(Json(state.personas.list()?))
}

/// POST /api/users/:user_id/personas/:persona/load
pub async fn load_persona(
    State(state): State<Arc<AppState>>,
    Path((user_id, persona)): Path<(String, String)>,
    Query(params): Query<LoadPersonaQuery>,
) -> Result<Json<PersonaLoadReport>, AppError> {
    let synthesize = params
        .synthesize
        .unwrap_or(state.coach.personas.synthesize_missing);

    if let (Some(from), Some(to)) = (params.from, params.to) {
        if from > to {
            return Err(AppError::bad_request("'from' must not be after 'to'"));
        }
        if synthesize && (to - from).num_days() >= MAX_SYNTHESIS_DAYS {
            return Err(AppError::bad_request(&format!(
                "Synthesis window is limited to {} days",
                MAX_SYNTHESIS_DAYS
            )));
        }
    }

    let options = LoadOptions {
        from: params.from,
        to: params.to,
        synthesize,
    };

    let report = state
        .personas
        .load_into_db(&state.db, &user_id, &persona, options)?;
    Ok(Json(report))
}
