use axum::{Json, extract::State};

use reel_types::api::HealthResponse;

use crate::error::ApiError;
use crate::state::{AppState, with_db};

/// GET /health — 503 when the store can't be reached.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    with_db(&state, |s| Ok(s.db.ping()?)).await?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}
