use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::calendar::TradingDayClassifier;
use crate::session_core::{BarOutcome, LevelsSnapshot, SessionLevelEngine, SessionView};
use crate::types::BarObservation;

type ApiError = (StatusCode, Json<serde_json::Value>);

/// Shared server state
///
/// Bar updates take the write lock; readers get owned snapshots under the
/// read lock, so a render never sees a half-applied rollover.
pub struct ApiState {
    pub engine: RwLock<SessionLevelEngine>,
    pub classifier: Box<dyn TradingDayClassifier + Send + Sync>,
}

impl ApiState {
    pub fn new(engine: SessionLevelEngine, classifier: Box<dyn TradingDayClassifier + Send + Sync>) -> Self {
        Self {
            engine: RwLock::new(engine),
            classifier,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub retained_sessions: usize,
    pub current_session: Option<NaiveDate>,
}

/// Response for bar ingestion
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub accepted: usize,
    pub rejected: usize,
    pub sessions_started: Vec<NaiveDate>,
    pub errors: Vec<String>,
}

fn not_found(message: String) -> ApiError {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": message })))
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/health", get(get_health))
        .route("/api/levels", get(get_levels))
        .route("/api/levels/current", get(get_current_levels))
        .route("/api/levels/{date}", get(get_levels_for_day))
        .route("/api/bars", post(post_bars))
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

/// GET /api/health
pub async fn get_health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    let engine = state.engine.read().await;
    Json(HealthResponse {
        status: "ok",
        retained_sessions: engine.history().len(),
        current_session: engine.history().current().map(|s| s.trading_day),
    })
}

/// GET /api/levels - current and retained sessions
pub async fn get_levels(State(state): State<Arc<ApiState>>) -> Json<LevelsSnapshot> {
    Json(state.engine.read().await.snapshot())
}

/// GET /api/levels/current
pub async fn get_current_levels(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<SessionView>, ApiError> {
    let engine = state.engine.read().await;
    engine
        .history()
        .current()
        .map(|set| Json(set.view()))
        .ok_or_else(|| not_found("no session in progress".to_string()))
}

/// GET /api/levels/{date} - a session by trading day (YYYY-MM-DD)
pub async fn get_levels_for_day(
    State(state): State<Arc<ApiState>>,
    Path(date): Path<NaiveDate>,
) -> Result<Json<SessionView>, ApiError> {
    let engine = state.engine.read().await;
    let history = engine.history();

    history
        .current()
        .filter(|set| set.trading_day == date)
        .or_else(|| history.get(date))
        .map(|set| Json(set.view()))
        .ok_or_else(|| not_found(format!("session {} is not retained", date)))
}

/// POST /api/bars - feed closed bars in chronological order
pub async fn post_bars(
    State(state): State<Arc<ApiState>>,
    Json(bars): Json<Vec<BarObservation>>,
) -> Json<IngestResponse> {
    let mut engine = state.engine.write().await;
    let mut response = IngestResponse {
        accepted: 0,
        rejected: 0,
        sessions_started: Vec::new(),
        errors: Vec::new(),
    };

    for bar in &bars {
        match engine.on_bar_with(bar, state.classifier.as_ref()) {
            Ok(outcome) => {
                response.accepted += 1;
                if let BarOutcome::NewSession { trading_day, .. } = outcome {
                    response.sessions_started.push(trading_day);
                }
            }
            Err(e) => {
                warn!("Rejected bar at {}: {}", bar.timestamp, e);
                response.rejected += 1;
                response.errors.push(e.to_string());
            }
        }
    }

    Json(response)
}
