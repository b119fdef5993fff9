use axum::{Json, extract::State, http::HeaderMap};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use tracing::info;

use reel_types::api::{
    AuthStatusResponse, AuthTokenRequest, GenerateAuthTokenResponse, LoginResponse, SuccessResponse,
    UserResponse,
};

use crate::cookies::{clear_session_cookie, session_cookie};
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::current_claims;
use crate::state::{AppState, with_db};
use crate::{dto, handshake, session};

/// POST /auth/token — issue a pending QR login token.
pub async fn generate_auth_token(
    State(state): State<AppState>,
) -> Result<Json<GenerateAuthTokenResponse>, ApiError> {
    let session = with_db(&state, |s| handshake::issue(&s.db, Utc::now())).await?;

    Ok(Json(GenerateAuthTokenResponse {
        auth_token: session.auth_token,
        expires_at: session.expires_at,
    }))
}

/// POST /auth/status — poll whether the bot has verified the token yet.
pub async fn check_auth_status(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<AuthTokenRequest>,
) -> Result<Json<AuthStatusResponse>, ApiError> {
    let status = with_db(&state, move |s| {
        handshake::check_status(&s.db, &req.auth_token, Utc::now())
    })
    .await?;

    Ok(Json(status))
}

/// POST /auth/login — exchange a verified token for a session cookie.
pub async fn login_with_telegram(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<AuthTokenRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let now = Utc::now();
    let user = with_db(&state, move |s| {
        handshake::consume(&s.db, &req.auth_token, s.settings.owner_open_id.as_deref(), now)
    })
    .await?;

    let settings = &state.settings;
    let token = session::mint(&settings.jwt_secret, &user, now, settings.session_ttl)?;
    let jar = jar.add(session_cookie(&settings.cookie, token, settings.session_ttl));

    info!("User {} signed in via Telegram", user.id);
    Ok((
        jar,
        Json(LoginResponse {
            success: true,
            user_id: user.id,
        }),
    ))
}

/// GET /auth/me — the signed-in user, or `null`.
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Option<UserResponse>>, ApiError> {
    let Some(claims) = current_claims(&state, &headers) else {
        return Ok(Json(None));
    };

    let user_id = claims.sub;
    let user = with_db(&state, move |s| Ok(s.db.get_user_by_id(user_id)?)).await?;
    Ok(Json(user.map(dto::user)))
}

/// POST /auth/logout — drop the session cookie.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<SuccessResponse>) {
    let jar = jar.add(clear_session_cookie(&state.settings.cookie));
    (jar, Json(SuccessResponse { success: true }))
}
