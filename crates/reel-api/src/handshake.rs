//! Telegram QR login handshake.
//!
//! A token is issued to the browser, verified out-of-band by the bot, polled by the
//! browser and finally exchanged for a session credential. Expiry is passive: every read
//! re-checks `expires_at`, and the sweep in [`crate::sweep`] only bounds table growth.
//!
//! All functions take `now` so that expiry is decided by the caller's clock.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::info;

use reel_db::Database;
use reel_db::models::{SessionRow, UserFields, UserRow};
use reel_types::Patch;
use reel_types::api::AuthStatusResponse;

use crate::error::ApiError;

pub const TOKEN_LEN: usize = 32;
pub const TOKEN_TTL_MINUTES: i64 = 10;

/// 32 symbols from `[A-Za-z0-9]` drawn from the thread-local CSPRNG (~190 bits).
pub fn generate_auth_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

pub fn telegram_open_id(telegram_user_id: i64) -> String {
    format!("telegram_{}", telegram_user_id)
}

/// Create a pending session expiring `TOKEN_TTL_MINUTES` from `now`.
pub fn issue(db: &Database, now: DateTime<Utc>) -> Result<SessionRow, ApiError> {
    let token = generate_auth_token();
    let session = db.create_session(&token, now + Duration::minutes(TOKEN_TTL_MINUTES))?;
    Ok(session)
}

/// Load a session that is still usable at `now`.
fn live_session(db: &Database, auth_token: &str, now: DateTime<Utc>) -> Result<SessionRow, ApiError> {
    let session = db
        .get_session(auth_token)?
        .ok_or_else(|| ApiError::not_found("auth token not found"))?;

    if session.is_expired(now) {
        return Err(ApiError::unauthorized("auth token expired"));
    }
    Ok(session)
}

/// Pure read used by the browser while it waits for the bot.
pub fn check_status(db: &Database, auth_token: &str, now: DateTime<Utc>) -> Result<AuthStatusResponse, ApiError> {
    let session = live_session(db, auth_token, now)?;

    Ok(AuthStatusResponse {
        verified: session.verified,
        user_id: session.user_id,
        telegram_username: session.telegram_username,
    })
}

/// Details the bot knows about the Telegram account that scanned the code.
#[derive(Debug, Clone, Default)]
pub struct TelegramIdentity {
    pub telegram_user_id: i64,
    pub telegram_username: Option<String>,
    pub name: Patch<String>,
    pub email: Patch<String>,
}

/// The bot's side of the handshake: resolve or create the user for this Telegram account
/// and mark the session verified.
pub fn verify(
    db: &Database,
    auth_token: &str,
    identity: &TelegramIdentity,
    owner_open_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<SessionRow, ApiError> {
    let current = live_session(db, auth_token, now)?;
    if current.verified && current.telegram_user_id != Some(identity.telegram_user_id) {
        return Err(ApiError::Conflict(
            "auth token already verified by another account".into(),
        ));
    }

    let fields = UserFields {
        name: identity.name.clone(),
        email: identity.email.clone(),
        login_method: Patch::Set("telegram".to_string()),
        ..Default::default()
    };
    let user = db.upsert_user(&telegram_open_id(identity.telegram_user_id), &fields, owner_open_id)?;

    let session = db.mark_session_verified(
        auth_token,
        identity.telegram_user_id,
        identity.telegram_username.as_deref(),
        user.id,
    )?;

    info!(
        "Auth token verified for telegram user {} (user {})",
        identity.telegram_user_id, user.id
    );
    Ok(session)
}

/// Exchange a verified token for the linked user, recording the sign-in.
///
/// Tokens are not invalidated here: the same verified token can log in again until it
/// expires.
pub fn consume(
    db: &Database,
    auth_token: &str,
    owner_open_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<UserRow, ApiError> {
    let session = db
        .get_session(auth_token)?
        .ok_or_else(|| ApiError::unauthorized("auth token not verified"))?;

    if session.is_expired(now) {
        return Err(ApiError::unauthorized("auth token expired"));
    }
    if !session.verified {
        return Err(ApiError::unauthorized("auth token not verified"));
    }
    let user_id = session
        .user_id
        .ok_or_else(|| ApiError::unauthorized("auth token has no linked user"))?;

    let user = db
        .get_user_by_id(user_id)?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    let fields = UserFields {
        last_signed_in: Some(now),
        ..Default::default()
    };
    let user = db.upsert_user(&user.open_id, &fields, owner_open_id)?;
    Ok(user)
}
