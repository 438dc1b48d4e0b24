//! Nudge Web Server
//!
//! Axum-based REST API and WebSocket push channel for the Nudge coach.
//!
//! Security features:
//! - Bearer API key authentication (secure by default, use --no-auth for local dev)
//! - Restrictive CORS policy
//! - Input validation (pagination limits, message length)
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use nudge_core::{
    AIBackend, AIClient, ChatService, CoachConfig, Database, InsightEngine, NotificationHub,
    PersonaLibrary,
};

mod handlers;

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 500;

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Paths reachable without credentials
const PUBLIC_PATHS: &[&str] = &["/api/health"];

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// Bearer keys accepted in the Authorization header
    pub api_keys: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
        }
    }
}

impl ServerConfig {
    /// Read `NUDGE_API_KEYS` and `NUDGE_ALLOWED_ORIGINS` (comma-separated)
    pub fn from_env(require_auth: bool) -> Self {
        Self {
            require_auth,
            allowed_origins: split_env("NUDGE_ALLOWED_ORIGINS"),
            api_keys: split_env("NUDGE_API_KEYS"),
        }
    }
}

fn split_env(name: &str) -> Vec<String> {
    std::env::var(name)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    pub coach: CoachConfig,
    pub engine: InsightEngine,
    pub hub: NotificationHub,
    pub chat: ChatService,
    pub personas: PersonaLibrary,
}

impl AppState {
    pub fn new(
        db: Database,
        config: ServerConfig,
        coach: CoachConfig,
        ai: Option<AIClient>,
    ) -> Self {
        Self {
            engine: InsightEngine::new(&coach),
            personas: PersonaLibrary::from_config(&coach.personas),
            chat: ChatService::new(db.clone(), ai),
            hub: NotificationHub::new(),
            db,
            config,
            coach,
        }
    }
}

/// Authentication middleware
///
/// When auth is required, a bearer key from `api_keys` must be present.
/// Keys are compared in constant time.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.require_auth || PUBLIC_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let api_key_valid = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|key| validate_api_key(key.trim(), &state.config.api_keys))
        .unwrap_or(false);

    if api_key_valid {
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Unauthorized request - no valid auth");
    AppError::unauthorized("Authentication required").into_response()
}

/// Validate an API key against the configured keys in constant time
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();

    valid_keys.iter().any(|key| {
        let key_bytes = key.as_bytes();
        provided_bytes.len() == key_bytes.len() && bool::from(provided_bytes.ct_eq(key_bytes))
    })
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router with configuration read from the environment
pub fn create_router(db: Database, config: ServerConfig) -> Router {
    let coach = CoachConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load coach config, using defaults");
        CoachConfig::default()
    });

    let ai = AIClient::from_env();
    match &ai {
        Some(client) => info!(model = client.model(), "AI backend configured"),
        None => info!("ℹ️  AI backend not configured (set OPENAI_API_KEY to enable AI chat)"),
    }

    create_router_with_state(Arc::new(AppState::new(db, config, coach, ai)))
}

/// Create the application router around prepared state (for testing)
pub fn create_router_with_state(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/ws", get(handlers::ws_handler))
        // Users
        .route("/users", post(handlers::create_user))
        .route("/users/:user_id", get(handlers::get_user))
        // Transactions
        .route(
            "/users/:user_id/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        // Budgets
        .route(
            "/users/:user_id/budgets",
            get(handlers::list_budgets).post(handlers::create_budget),
        )
        .route("/budgets/:id", delete(handlers::delete_budget))
        // Salaries
        .route(
            "/users/:user_id/salaries",
            get(handlers::list_salaries).post(handlers::create_salary),
        )
        // Personas
        .route("/personas", get(handlers::list_personas))
        .route(
            "/users/:user_id/personas/:persona/load",
            post(handlers::load_persona),
        )
        // Analytics
        .route(
            "/users/:user_id/analytics/patterns",
            get(handlers::get_patterns),
        )
        .route("/users/:user_id/analytics/trends", get(handlers::get_trends))
        .route("/users/:user_id/analytics/health", get(handlers::get_health))
        .route("/users/:user_id/analytics/mood", get(handlers::get_mood))
        .route(
            "/users/:user_id/analytics/predictions",
            get(handlers::get_predictions),
        )
        // Insights
        .route("/users/:user_id/insights", get(handlers::list_insights))
        .route(
            "/users/:user_id/insights/generate",
            post(handlers::generate_insights),
        )
        .route("/insights/:id", get(handlers::get_insight))
        .route("/insights/:id/dismiss", post(handlers::dismiss_insight))
        .route("/insights/:id/snooze", post(handlers::snooze_insight))
        .route("/insights/:id/restore", post(handlers::restore_insight))
        .route("/insights/:id/feedback", post(handlers::insight_feedback))
        // Nudges
        .route("/users/:user_id/nudges", get(handlers::list_nudges))
        .route("/nudges/:id/respond", post(handlers::respond_nudge))
        // Behavior
        .route("/users/:user_id/behavior", get(handlers::get_behavior))
        // Chat
        .route("/users/:user_id/chat", post(handlers::send_chat))
        .route("/users/:user_id/chat/history", get(handlers::chat_history));

    // Build CORS layer
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    let cors = if state.config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server
pub async fn serve(db: Database, host: &str, port: u16, config: ServerConfig) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("⚠️  Authentication disabled - do not expose to network!");
    } else if config.api_keys.is_empty() {
        warn!("⚠️  Authentication required but NUDGE_API_KEYS is empty; every request will be rejected");
    }

    check_ai_connection().await;

    let app = create_router(db, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log AI backend connection status
async fn check_ai_connection() {
    match AIClient::from_env() {
        Some(client) => {
            if client.health_check().await {
                info!(model = client.model(), "✅ AI backend connected");
            } else {
                warn!(
                    model = client.model(),
                    "⚠️  AI backend configured but not responding; chat will use templated replies"
                );
            }
        }
        None => {
            info!("ℹ️  AI backend not configured (set OPENAI_API_KEY to enable AI chat)");
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    fn with_status(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn bad_request(msg: &str) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(msg: &str) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, msg)
    }

    pub fn internal(msg: &str) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    pub fn conflict(msg: &str) -> Self {
        Self::with_status(StatusCode::CONFLICT, msg)
    }

    pub fn unauthorized(msg: &str) -> Self {
        Self::with_status(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();

        // Caller mistakes surface as 4xx with the core message
        match err.downcast_ref::<nudge_core::Error>() {
            Some(nudge_core::Error::NotFound(what)) => {
                return Self::not_found(&format!("Not found: {}", what));
            }
            Some(nudge_core::Error::InvalidData(msg)) | Some(nudge_core::Error::Import(msg)) => {
                return Self::bad_request(msg);
            }
            Some(nudge_core::Error::Conflict(msg)) => {
                return Self::conflict(msg);
            }
            _ => {}
        }

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}

#[cfg(test)]
mod tests;
