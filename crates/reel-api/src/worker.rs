//! Endpoints for the out-of-process collaborators: the Telegram bot that verifies login
//! tokens and the download worker that drains the queue. All routes sit behind
//! [`crate::middleware::require_worker`].

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{info, warn};

use reel_db::models::{ClaimOutcome, DownloadPatch, NewVideo, VideoFile, VideoPatch};
use reel_types::api::{
    CreateVideoRequest, CreatedResponse, DownloadRequestResponse, FailDownloadRequest,
    UpdateDownloadRequest, UpdateVideoRequest, VerifySessionRequest, VerifySessionResponse,
    VideoDetails, VideoResponse,
};
use reel_types::models::VideoStatus;

use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::handshake::{self, TelegramIdentity};
use crate::state::{AppState, with_db};
use crate::dto;

fn video_file(details: VideoDetails) -> VideoFile {
    VideoFile {
        title: details.title,
        description: details.description,
        thumbnail_url: details.thumbnail_url,
        duration: details.duration,
        file_key: details.file_key,
        file_url: details.file_url,
        file_size: details.file_size,
        mime_type: details.mime_type,
    }
}

/// POST /internal/sessions/verify — the bot links a scanned token to a Telegram account.
pub async fn verify_session(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<VerifySessionRequest>,
) -> Result<Json<VerifySessionResponse>, ApiError> {
    let identity = TelegramIdentity {
        telegram_user_id: req.telegram_user_id,
        telegram_username: req.telegram_username,
        name: req.name,
        email: req.email,
    };

    let session = with_db(&state, move |s| {
        handshake::verify(
            &s.db,
            &req.auth_token,
            &identity,
            s.settings.owner_open_id.as_deref(),
            Utc::now(),
        )
    })
    .await?;

    let user_id = session.user_id.ok_or(ApiError::Internal)?;
    Ok(Json(VerifySessionResponse { user_id }))
}

/// GET /internal/downloads/pending — oldest first.
pub async fn list_pending(
    State(state): State<AppState>,
) -> Result<Json<Vec<DownloadRequestResponse>>, ApiError> {
    let rows = with_db(&state, |s| Ok(s.db.list_pending_downloads()?)).await?;
    Ok(Json(rows.into_iter().map(dto::download).collect()))
}

/// POST /internal/downloads/claim — claim the oldest pending entry, 204 when idle.
pub async fn claim_next(State(state): State<AppState>) -> Result<Response, ApiError> {
    let claimed = with_db(&state, |s| Ok(s.db.claim_next_download()?)).await?;

    match claimed {
        Some(row) => {
            info!("Worker claimed download {}", row.id);
            Ok(Json(dto::download(row)).into_response())
        }
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// POST /internal/downloads/{id}/claim — 409 if someone got there first.
pub async fn claim(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<DownloadRequestResponse>, ApiError> {
    let outcome = with_db(&state, move |s| Ok(s.db.claim_download(id)?)).await?;

    match outcome {
        ClaimOutcome::Claimed(row) => {
            info!("Worker claimed download {}", row.id);
            Ok(Json(dto::download(row)))
        }
        ClaimOutcome::AlreadyClaimed(status) => Err(ApiError::Conflict(format!(
            "download request {} already claimed ({})",
            id, status
        ))),
    }
}

/// GET /internal/downloads/{id}
pub async fn get_download(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<DownloadRequestResponse>, ApiError> {
    let row = with_db(&state, move |s| {
        s.db.get_download(id)?
            .ok_or_else(|| ApiError::not_found("download request not found"))
    })
    .await?;

    Ok(Json(dto::download(row)))
}

/// PATCH /internal/downloads/{id} — free-form mutation; the worker owns the transitions.
pub async fn update_download(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateDownloadRequest>,
) -> Result<Json<DownloadRequestResponse>, ApiError> {
    let patch = DownloadPatch {
        status: req.status,
        error_message: req.error_message,
        video_id: req.video_id,
    };

    let row = with_db(&state, move |s| Ok(s.db.update_download(id, &patch)?)).await?;
    Ok(Json(dto::download(row)))
}

/// POST /internal/downloads/{id}/complete — create the video and link it.
pub async fn complete_download(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(details): ApiJson<VideoDetails>,
) -> Result<Json<DownloadRequestResponse>, ApiError> {
    let file = video_file(details);
    let (row, video) = with_db(&state, move |s| Ok(s.db.complete_download(id, &file)?)).await?;

    info!("Download {} completed as video {}", row.id, video.id);
    Ok(Json(dto::download(row)))
}

/// POST /internal/downloads/{id}/fail
pub async fn fail_download(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<FailDownloadRequest>,
) -> Result<Json<DownloadRequestResponse>, ApiError> {
    let row = with_db(&state, move |s| Ok(s.db.fail_download(id, &req.error_message)?)).await?;

    warn!("Download {} failed: {}", row.id, row.error_message.as_deref().unwrap_or(""));
    Ok(Json(dto::download(row)))
}

/// POST /internal/videos — insert a video row directly (e.g. while it is still downloading).
pub async fn create_video(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateVideoRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let video = NewVideo {
        user_id: req.user_id,
        youtube_id: req.youtube_id,
        status: req.status.unwrap_or(VideoStatus::Downloading),
        file: video_file(req.details),
    };

    let row = with_db(&state, move |s| Ok(s.db.create_video(&video)?)).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: row.id })))
}

/// PATCH /internal/videos/{id}
pub async fn update_video(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateVideoRequest>,
) -> Result<Json<VideoResponse>, ApiError> {
    let patch = VideoPatch {
        title: req.title,
        description: req.description,
        thumbnail_url: req.thumbnail_url,
        status: req.status,
    };

    let row = with_db(&state, move |s| Ok(s.db.update_video(id, &patch)?)).await?;
    Ok(Json(dto::video(row)))
}
