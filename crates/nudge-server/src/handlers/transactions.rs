//! Transaction handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::page_limit;
use crate::{AppError, AppState};
use nudge_core::models::{Mood, NewTransaction, Transaction, TransactionSource};
use nudge_core::normalize::resolve_category;

/// Query parameters for listing transactions
#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    /// Inclusive start date; when either bound is set the range is returned
    pub from: Option<NaiveDate>,
    /// Inclusive end date
    pub to: Option<NaiveDate>,
    /// Most recent N when no range is given (default 50)
    pub limit: Option<i64>,
}

/// Request body for a manual transaction
#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub date: NaiveDate,
    /// Positive for spending, negative for refunds and income
    pub amount: f64,
    pub merchant: String,
    pub category: Option<String>,
    pub mood: Option<Mood>,
    pub hour: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: i64,
}

// Open range ends; kept to four-digit years so stored dates compare as text
fn earliest() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn latest() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// GET /api/users/:user_id/transactions
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<TransactionQuery>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let txs = if params.from.is_some() || params.to.is_some() {
        let from = params.from.unwrap_or(earliest());
        let to = params.to.unwrap_or(latest());
        if from > to {
            return Err(AppError::bad_request("'from' must not be after 'to'"));
        }
        state.db.list_transactions_between(&user_id, from, to)?
    } else {
        state
            .db
            .recent_transactions(&user_id, page_limit(params.limit, 50))?
    };

    Ok(Json(txs))
}

/// POST /api/users/:user_id/transactions
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(body): Json<CreateTransactionRequest>,
) -> Result<Json<CreatedResponse>, AppError> {
    let merchant = body.merchant.trim();
    if merchant.is_empty() {
        return Err(AppError::bad_request("merchant is required"));
    }
    if !body.amount.is_finite() {
        return Err(AppError::bad_request("amount must be a number"));
    }
    if body.hour.is_some_and(|h| h > 23) {
        return Err(AppError::bad_request("hour must be between 0 and 23"));
    }

    let tx = NewTransaction {
        date: body.date,
        amount: body.amount,
        category: resolve_category(body.category.as_deref(), merchant),
        merchant: merchant.to_string(),
        raw_category: body.category,
        mood: body.mood,
        hour: body.hour,
        source: TransactionSource::Manual,
    };

    match state.db.insert_transaction(&user_id, &tx)? {
        Some(id) => {
            debug!(user_id = %user_id, id, category = %tx.category, "Created transaction");
            Ok(Json(CreatedResponse { id }))
        }
        None => Err(AppError::conflict("Duplicate transaction")),
    }
}
