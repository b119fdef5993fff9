use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use tracing::info;

use reel_types::api::{
    Claims, RequestDownloadRequest, RequestDownloadResponse, SuccessResponse, VideoResponse,
};

use crate::dto;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::state::{AppState, with_db};
use crate::youtube::validate_download_target;

/// GET /videos — the caller's ready videos, newest first.
pub async fn list_videos(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<VideoResponse>>, ApiError> {
    let user_id = claims.sub;
    let rows = with_db(&state, move |s| Ok(s.db.list_ready_videos(user_id)?)).await?;
    Ok(Json(rows.into_iter().map(dto::video).collect()))
}

/// GET /videos/{video_id}
pub async fn get_video(
    State(state): State<AppState>,
    ApiPath(video_id): ApiPath<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<VideoResponse>, ApiError> {
    let user_id = claims.sub;
    let row = with_db(&state, move |s| {
        s.db.get_video_for_user(video_id, user_id)?
            .ok_or_else(|| ApiError::not_found("video not found"))
    })
    .await?;

    Ok(Json(dto::video(row)))
}

/// DELETE /videos/{video_id}
pub async fn delete_video(
    State(state): State<AppState>,
    ApiPath(video_id): ApiPath<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let user_id = claims.sub;
    with_db(&state, move |s| Ok(s.db.delete_video_for_user(video_id, user_id)?)).await?;

    info!("User {} deleted video {}", user_id, video_id);
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /videos/downloads — queue a download for the external worker.
pub async fn request_download(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<RequestDownloadRequest>,
) -> Result<(StatusCode, Json<RequestDownloadResponse>), ApiError> {
    validate_download_target(&req.youtube_url, &req.youtube_id)?;

    let user_id = claims.sub;
    let entry = with_db(&state, move |s| {
        Ok(s.db.enqueue_download_unless_open(user_id, req.youtube_url.trim(), &req.youtube_id)?)
    })
    .await?;

    info!("User {} requested download {} ({})", user_id, entry.id, entry.youtube_id);
    Ok((
        StatusCode::CREATED,
        Json(RequestDownloadResponse {
            request_id: entry.id,
            status: entry.status,
        }),
    ))
}
