use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::{AppState, with_db};

/// How long past expiry a login session is kept before the sweep removes it.
pub const SESSION_GRACE_HOURS: i64 = 1;

/// Background task that prunes long-expired login sessions.
///
/// Expired sessions are already unusable; this only keeps the table from growing forever.
pub async fn run_session_sweep(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match sweep_once(&state).await {
            Ok(count) => {
                if count > 0 {
                    info!("Sweep: removed {} expired login sessions", count);
                }
            }
            Err(e) => {
                warn!("Session sweep error: {}", e);
            }
        }
    }
}

pub async fn sweep_once(state: &AppState) -> Result<usize, ApiError> {
    let cutoff = Utc::now() - chrono::Duration::hours(SESSION_GRACE_HOURS);
    with_db(state, move |s| Ok(s.db.delete_expired_sessions(cutoff)?)).await
}
