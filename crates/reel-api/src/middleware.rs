use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use reel_types::api::Claims;

use crate::cookies::SESSION_COOKIE;
use crate::error::ApiError;
use crate::session;
use crate::state::AppState;

pub const WORKER_SECRET_HEADER: &str = "x-worker-secret";

/// Session credential from the cookie, falling back to `Authorization: Bearer`.
fn credential(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Claims for the caller, if they carry a valid credential.
pub fn current_claims(state: &AppState, headers: &HeaderMap) -> Option<Claims> {
    let token = credential(headers)?;
    session::validate(&state.settings.jwt_secret, &token).ok()
}

/// Reject requests without a valid session credential; otherwise stash the claims.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = credential(req.headers()).ok_or_else(|| ApiError::unauthorized("sign in required"))?;
    let claims = session::validate(&state.settings.jwt_secret, &token)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Gate for the bot and download worker.
pub async fn require_worker(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = req
        .headers()
        .get(WORKER_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("worker secret required"))?;

    if !constant_time_eq(presented.as_bytes(), state.settings.worker_secret.as_bytes()) {
        return Err(ApiError::unauthorized("bad worker secret"));
    }

    Ok(next.run(req).await)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
