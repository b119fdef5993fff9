use std::sync::Arc;

use chrono::Duration;
use tracing::error;

use reel_db::Database;

use crate::cookies::CookiePolicy;
use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub settings: Settings,
}

/// Runtime knobs the handlers need. Built by the server from its environment config.
#[derive(Debug, Clone)]
pub struct Settings {
    /// HS256 key for the session credential.
    pub jwt_secret: String,
    /// Shared secret the bot and download worker send in `X-Worker-Secret`.
    pub worker_secret: String,
    /// External identity that is always promoted to admin.
    pub owner_open_id: Option<String>,
    pub cookie: CookiePolicy,
    /// Lifetime of the session credential.
    pub session_ttl: Duration,
}

impl Settings {
    pub fn new(jwt_secret: impl Into<String>, worker_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            worker_secret: worker_secret.into(),
            owner_open_id: None,
            cookie: CookiePolicy::default(),
            session_ttl: Duration::days(30),
        }
    }
}

/// Run store work on the blocking pool.
pub async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Unavailable
        })?
}
