//! Row -> response conversions.

use reel_db::models::{DownloadRow, UserRow, VideoRow};
use reel_types::api::{DownloadRequestResponse, UserResponse, VideoResponse};

pub fn user(row: UserRow) -> UserResponse {
    UserResponse {
        id: row.id,
        open_id: row.open_id,
        name: row.name,
        email: row.email,
        login_method: row.login_method,
        role: row.role,
        created_at: row.created_at,
        updated_at: row.updated_at,
        last_signed_in: row.last_signed_in,
    }
}

pub fn video(row: VideoRow) -> VideoResponse {
    VideoResponse {
        id: row.id,
        user_id: row.user_id,
        youtube_id: row.youtube_id,
        title: row.title,
        description: row.description,
        thumbnail_url: row.thumbnail_url,
        duration: row.duration,
        file_key: row.file_key,
        file_url: row.file_url,
        file_size: row.file_size,
        mime_type: row.mime_type,
        status: row.status,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

pub fn download(row: DownloadRow) -> DownloadRequestResponse {
    DownloadRequestResponse {
        id: row.id,
        user_id: row.user_id,
        youtube_url: row.youtube_url,
        youtube_id: row.youtube_id,
        status: row.status,
        error_message: row.error_message,
        video_id: row.video_id,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}
