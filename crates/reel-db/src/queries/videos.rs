use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};

use reel_types::models::VideoStatus;

use super::{Assignments, OptionalExt, constraint_as_invalid, get_enum};
use crate::models::{NewVideo, VideoPatch, VideoRow};
use crate::{Database, DbError, Result, time};

const VIDEO_COLUMNS: &str = "id, user_id, youtube_id, title, description, thumbnail_url, duration, \
     file_key, file_url, file_size, mime_type, status, created_at, updated_at";

impl Database {
    // -- Video catalog --

    pub fn create_video(&self, video: &NewVideo) -> Result<VideoRow> {
        self.with_conn(|conn| insert_video(conn, video, Utc::now()))
    }

    /// Unscoped lookup for the worker side.
    pub fn get_video(&self, id: i64) -> Result<Option<VideoRow>> {
        self.with_conn(|conn| query_video(conn, id))
    }

    /// Ready videos owned by `user_id`, newest first.
    pub fn list_ready_videos(&self, user_id: i64) -> Result<Vec<VideoRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM videos
                 WHERE user_id = ?1 AND status = ?2
                 ORDER BY created_at DESC, id DESC",
                VIDEO_COLUMNS
            ))?;

            let rows = stmt
                .query_map((user_id, VideoStatus::Ready.as_str()), video_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Ownership-checked fetch: a video owned by someone else reads as missing.
    pub fn get_video_for_user(&self, video_id: i64, user_id: i64) -> Result<Option<VideoRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM videos WHERE id = ?1 AND user_id = ?2", VIDEO_COLUMNS),
                (video_id, user_id),
                video_from_row,
            )
            .optional()
        })
    }

    pub fn update_video(&self, video_id: i64, patch: &VideoPatch) -> Result<VideoRow> {
        self.with_conn(|conn| apply_video_patch(conn, video_id, None, patch))
    }

    pub fn update_video_for_user(&self, video_id: i64, user_id: i64, patch: &VideoPatch) -> Result<VideoRow> {
        self.with_conn(|conn| apply_video_patch(conn, video_id, Some(user_id), patch))
    }

    pub fn delete_video_for_user(&self, video_id: i64, user_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM videos WHERE id = ?1 AND user_id = ?2",
                (video_id, user_id),
            )?;
            if deleted == 0 {
                return Err(DbError::NotFound("video"));
            }
            Ok(())
        })
    }

}

/// A non-failed video the user already has for this source id, if any.
pub(crate) fn query_video_by_source(conn: &Connection, user_id: i64, youtube_id: &str) -> Result<Option<VideoRow>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM videos
             WHERE user_id = ?1 AND youtube_id = ?2 AND status != ?3
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
            VIDEO_COLUMNS
        ),
        (user_id, youtube_id, VideoStatus::Failed.as_str()),
        video_from_row,
    )
    .optional()
}

pub(crate) fn insert_video(conn: &Connection, video: &NewVideo, now: DateTime<Utc>) -> Result<VideoRow> {
    let ts = time::encode(now);
    let file = &video.file;

    conn.execute(
        "INSERT INTO videos (user_id, youtube_id, title, description, thumbnail_url, duration,
                             file_key, file_url, file_size, mime_type, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
        rusqlite::params![
            video.user_id,
            video.youtube_id,
            file.title,
            file.description,
            file.thumbnail_url,
            file.duration,
            file.file_key,
            file.file_url,
            file.file_size,
            file.mime_type,
            video.status.as_str(),
            ts,
        ],
    )
    .map_err(|e| constraint_as_invalid(e, "video must belong to an existing user"))?;

    query_video(conn, conn.last_insert_rowid())?.ok_or(DbError::NotFound("video"))
}

pub(crate) fn query_video(conn: &Connection, id: i64) -> Result<Option<VideoRow>> {
    conn.query_row(
        &format!("SELECT {} FROM videos WHERE id = ?1", VIDEO_COLUMNS),
        [id],
        video_from_row,
    )
    .optional()
}

fn apply_video_patch(
    conn: &Connection,
    video_id: i64,
    owner: Option<i64>,
    patch: &VideoPatch,
) -> Result<VideoRow> {
    let current = query_video(conn, video_id)?
        .filter(|v| owner.is_none_or(|uid| v.user_id == uid))
        .ok_or(DbError::NotFound("video"))?;

    let mut set = Assignments::default();
    if let Some(title) = &patch.title {
        set.push("title", title.clone());
    }
    if let Some(value) = patch.description.as_write() {
        set.push("description", value.cloned().map_or(Value::Null, Value::Text));
    }
    if let Some(value) = patch.thumbnail_url.as_write() {
        set.push("thumbnail_url", value.cloned().map_or(Value::Null, Value::Text));
    }
    if let Some(status) = patch.status {
        set.push("status", status.as_str().to_string());
    }

    if set.is_empty() {
        return Ok(current);
    }
    set.push("updated_at", time::encode(Utc::now()));

    let (sql, values) = set.into_update("videos", "id", current.id);
    conn.execute(&sql, rusqlite::params_from_iter(values))?;

    query_video(conn, current.id)?.ok_or(DbError::NotFound("video"))
}

fn video_from_row(row: &Row<'_>) -> rusqlite::Result<VideoRow> {
    Ok(VideoRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        youtube_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        thumbnail_url: row.get(5)?,
        duration: row.get(6)?,
        file_key: row.get(7)?,
        file_url: row.get(8)?,
        file_size: row.get(9)?,
        mime_type: row.get(10)?,
        status: get_enum(row, 11)?,
        created_at: time::get(row, 12)?,
        updated_at: time::get(row, 13)?,
    })
}
