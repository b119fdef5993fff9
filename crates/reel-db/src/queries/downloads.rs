use chrono::Utc;
use rusqlite::{Connection, Row, TransactionBehavior};
use tracing::debug;

use reel_types::models::{DownloadStatus, VideoStatus};

use super::videos::{insert_video, query_video, query_video_by_source};
use super::{Assignments, OptionalExt, constraint_as_invalid, get_enum};
use crate::models::{ClaimOutcome, DownloadPatch, DownloadRow, NewVideo, VideoFile, VideoRow};
use crate::{Database, DbError, Result, time};

const DOWNLOAD_COLUMNS: &str =
    "id, user_id, youtube_url, youtube_id, status, error_message, video_id, created_at, updated_at";

impl Database {
    // -- Download queue --

    pub fn enqueue_download(&self, user_id: i64, youtube_url: &str, youtube_id: &str) -> Result<DownloadRow> {
        self.with_conn(|conn| insert_download(conn, user_id, youtube_url, youtube_id))
    }

    /// Queue a download unless the user already has the video or an open request for it.
    ///
    /// The check and the insert share one transaction, so identical concurrent requests
    /// produce a single entry.
    pub fn enqueue_download_unless_open(
        &self,
        user_id: i64,
        youtube_url: &str,
        youtube_id: &str,
    ) -> Result<DownloadRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if query_video_by_source(&tx, user_id, youtube_id)?.is_some() {
                return Err(DbError::Conflict("video already in your library".to_string()));
            }
            if query_open_download(&tx, user_id, youtube_id)?.is_some() {
                return Err(DbError::Conflict("video is already being downloaded".to_string()));
            }

            let row = insert_download(&tx, user_id, youtube_url, youtube_id)?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn get_download(&self, id: i64) -> Result<Option<DownloadRow>> {
        self.with_conn(|conn| query_download(conn, id))
    }

    /// Pending entries, oldest first.
    pub fn list_pending_downloads(&self) -> Result<Vec<DownloadRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM download_queue
                 WHERE status = ?1
                 ORDER BY created_at ASC, id ASC",
                DOWNLOAD_COLUMNS
            ))?;

            let rows = stmt
                .query_map([DownloadStatus::Pending.as_str()], download_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Free-form mutation used by workers. Does not compute or police status transitions.
    ///
    /// A linked video must belong to the entry's user, and once linked the entry cannot be
    /// re-pointed at a different video.
    pub fn update_download(&self, id: i64, patch: &DownloadPatch) -> Result<DownloadRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let current = query_download(&tx, id)?.ok_or(DbError::NotFound("download request"))?;

            let mut set = Assignments::default();
            if let Some(status) = patch.status {
                set.push("status", status.as_str().to_string());
            }
            if let Some(message) = &patch.error_message {
                set.push("error_message", message.clone());
            }
            if let Some(video_id) = patch.video_id {
                check_video_link(&tx, &current, video_id)?;
                set.push("video_id", video_id);
            }

            if set.is_empty() {
                return Ok(current);
            }
            set.push("updated_at", time::encode(Utc::now()));

            let (sql, values) = set.into_update("download_queue", "id", id);
            tx.execute(&sql, rusqlite::params_from_iter(values))?;

            let row = query_download(&tx, id)?.ok_or(DbError::NotFound("download request"))?;
            tx.commit()?;
            Ok(row)
        })
    }

    /// Move one entry from `pending` to `processing`.
    ///
    /// The transition is a single conditional UPDATE, so of several racing workers
    /// exactly one sees `Claimed`.
    pub fn claim_download(&self, id: i64) -> Result<ClaimOutcome> {
        let ts = time::encode(Utc::now());

        self.with_conn(|conn| {
            let claimed = conn.execute(
                "UPDATE download_queue SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
                (
                    DownloadStatus::Processing.as_str(),
                    &ts,
                    id,
                    DownloadStatus::Pending.as_str(),
                ),
            )?;

            let row = query_download(conn, id)?.ok_or(DbError::NotFound("download request"))?;
            if claimed == 1 {
                Ok(ClaimOutcome::Claimed(row))
            } else {
                Ok(ClaimOutcome::AlreadyClaimed(row.status))
            }
        })
    }

    /// Claim the oldest pending entry, if there is one.
    pub fn claim_next_download(&self) -> Result<Option<DownloadRow>> {
        let ts = time::encode(Utc::now());

        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "UPDATE download_queue SET status = ?1, updated_at = ?2
                     WHERE id = (
                         SELECT id FROM download_queue
                         WHERE status = ?3
                         ORDER BY created_at ASC, id ASC
                         LIMIT 1
                     ) AND status = ?3
                     RETURNING {}",
                    DOWNLOAD_COLUMNS
                ),
                (
                    DownloadStatus::Processing.as_str(),
                    &ts,
                    DownloadStatus::Pending.as_str(),
                ),
                download_from_row,
            )
            .optional()
        })
    }

    /// Record a finished download: create the ready video for the entry's user, link it and
    /// mark the entry completed, all in one transaction. Only valid while `processing`.
    pub fn complete_download(&self, id: i64, file: &VideoFile) -> Result<(DownloadRow, VideoRow)> {
        let now = Utc::now();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let current = query_download(&tx, id)?.ok_or(DbError::NotFound("download request"))?;

            if current.status.is_terminal() {
                return Err(DbError::Conflict(format!(
                    "download request {} is already {}",
                    id, current.status
                )));
            }
            if current.status != DownloadStatus::Processing {
                return Err(DbError::Conflict(format!(
                    "download request {} has not been claimed",
                    id
                )));
            }

            let video = insert_video(
                &tx,
                &NewVideo {
                    user_id: current.user_id,
                    youtube_id: current.youtube_id.clone(),
                    status: VideoStatus::Ready,
                    file: file.clone(),
                },
                now,
            )?;

            tx.execute(
                "UPDATE download_queue SET status = ?1, video_id = ?2, updated_at = ?3 WHERE id = ?4",
                (
                    DownloadStatus::Completed.as_str(),
                    video.id,
                    time::encode(now),
                    id,
                ),
            )?;

            let row = query_download(&tx, id)?.ok_or(DbError::NotFound("download request"))?;
            tx.commit()?;
            Ok((row, video))
        })
    }

    /// Mark an open entry as failed with the worker's error message.
    pub fn fail_download(&self, id: i64, error_message: &str) -> Result<DownloadRow> {
        let ts = time::encode(Utc::now());

        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE download_queue SET status = ?1, error_message = ?2, updated_at = ?3
                 WHERE id = ?4 AND status IN (?5, ?6)",
                (
                    DownloadStatus::Failed.as_str(),
                    error_message,
                    &ts,
                    id,
                    DownloadStatus::Pending.as_str(),
                    DownloadStatus::Processing.as_str(),
                ),
            )?;

            let row = query_download(conn, id)?.ok_or(DbError::NotFound("download request"))?;
            if changed == 0 {
                return Err(DbError::Conflict(format!(
                    "download request {} is already {}",
                    id, row.status
                )));
            }
            Ok(row)
        })
    }
}

fn check_video_link(conn: &Connection, entry: &DownloadRow, video_id: i64) -> Result<()> {
    if let Some(existing) = entry.video_id {
        if existing != video_id {
            return Err(DbError::Conflict(format!(
                "download request {} is already linked to video {}",
                entry.id, existing
            )));
        }
    }

    let video = query_video(conn, video_id)?.ok_or(DbError::NotFound("video"))?;
    if video.user_id != entry.user_id {
        return Err(DbError::Invalid(format!(
            "video {} does not belong to the requesting user",
            video_id
        )));
    }
    Ok(())
}

fn insert_download(conn: &Connection, user_id: i64, youtube_url: &str, youtube_id: &str) -> Result<DownloadRow> {
    let ts = time::encode(Utc::now());

    conn.execute(
        "INSERT INTO download_queue (user_id, youtube_url, youtube_id, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        (user_id, youtube_url, youtube_id, DownloadStatus::Pending.as_str(), &ts),
    )
    .map_err(|e| constraint_as_invalid(e, "download request must belong to an existing user"))?;

    let id = conn.last_insert_rowid();
    debug!("Queued download {} for user {} ({})", id, user_id, youtube_id);
    query_download(conn, id)?.ok_or(DbError::NotFound("download request"))
}

/// Open (pending or processing) request the user already has for this source id.
fn query_open_download(conn: &Connection, user_id: i64, youtube_id: &str) -> Result<Option<DownloadRow>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM download_queue
             WHERE user_id = ?1 AND youtube_id = ?2 AND status IN (?3, ?4)
             ORDER BY created_at ASC, id ASC
             LIMIT 1",
            DOWNLOAD_COLUMNS
        ),
        (
            user_id,
            youtube_id,
            DownloadStatus::Pending.as_str(),
            DownloadStatus::Processing.as_str(),
        ),
        download_from_row,
    )
    .optional()
}

fn query_download(conn: &Connection, id: i64) -> Result<Option<DownloadRow>> {
    conn.query_row(
        &format!("SELECT {} FROM download_queue WHERE id = ?1", DOWNLOAD_COLUMNS),
        [id],
        download_from_row,
    )
    .optional()
}

fn download_from_row(row: &Row<'_>) -> rusqlite::Result<DownloadRow> {
    Ok(DownloadRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        youtube_url: row.get(2)?,
        youtube_id: row.get(3)?,
        status: get_enum(row, 4)?,
        error_message: row.get(5)?,
        video_id: row.get(6)?,
        created_at: time::get(row, 7)?,
        updated_at: time::get(row, 8)?,
    })
}
