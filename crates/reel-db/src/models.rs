//! Database row types and write inputs.
//! Distinct from reel-types API models to keep the DB layer independent.

use chrono::{DateTime, Utc};

use reel_types::Patch;
use reel_types::models::{DownloadStatus, Role, VideoStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct UserRow {
    pub id: i64,
    pub open_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub login_method: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_signed_in: DateTime<Utc>,
}

/// Fields supplied to a user upsert.
///
/// `Patch::Keep` leaves a column unchanged on update (and NULL on insert).
#[derive(Debug, Clone, Default)]
pub struct UserFields {
    pub name: Patch<String>,
    pub email: Patch<String>,
    pub login_method: Patch<String>,
    pub role: Option<Role>,
    pub last_signed_in: Option<DateTime<Utc>>,
}

impl UserFields {
    pub fn is_empty(&self) -> bool {
        self.name.is_keep()
            && self.email.is_keep()
            && self.login_method.is_keep()
            && self.role.is_none()
            && self.last_signed_in.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRow {
    pub id: i64,
    pub auth_token: String,
    pub telegram_user_id: Option<i64>,
    pub telegram_username: Option<String>,
    pub user_id: Option<i64>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRow {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Partial session mutation. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub telegram_user_id: Option<i64>,
    pub telegram_username: Option<String>,
    pub user_id: Option<i64>,
    pub verified: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoRow {
    pub id: i64,
    pub user_id: i64,
    pub youtube_id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration: Option<i64>,
    pub file_key: String,
    pub file_url: String,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
    pub status: VideoStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Storage details reported by the download worker.
#[derive(Debug, Clone, Default)]
pub struct VideoFile {
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration: Option<i64>,
    pub file_key: String,
    pub file_url: String,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub user_id: i64,
    pub youtube_id: String,
    pub status: VideoStatus,
    pub file: VideoFile,
}

#[derive(Debug, Clone, Default)]
pub struct VideoPatch {
    pub title: Option<String>,
    pub description: Patch<String>,
    pub thumbnail_url: Patch<String>,
    pub status: Option<VideoStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRow {
    pub id: i64,
    pub user_id: i64,
    pub youtube_url: String,
    pub youtube_id: String,
    pub status: DownloadStatus,
    pub error_message: Option<String>,
    pub video_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Free-form queue mutation. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct DownloadPatch {
    pub status: Option<DownloadStatus>,
    pub error_message: Option<String>,
    pub video_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Claimed(DownloadRow),
    /// Someone else moved the entry out of `pending` first.
    AlreadyClaimed(DownloadStatus),
}
