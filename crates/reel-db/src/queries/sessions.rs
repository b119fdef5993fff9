use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

use super::{Assignments, OptionalExt, constraint_as_invalid};
use crate::models::{SessionPatch, SessionRow};
use crate::{Database, DbError, Result, time};

const SESSION_COLUMNS: &str =
    "id, auth_token, telegram_user_id, telegram_username, user_id, verified, created_at, expires_at";

impl Database {
    // -- Telegram login sessions --

    pub fn create_session(&self, auth_token: &str, expires_at: DateTime<Utc>) -> Result<SessionRow> {
        let created_at = Utc::now();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO telegram_sessions (auth_token, verified, created_at, expires_at)
                 VALUES (?1, 0, ?2, ?3)",
                (auth_token, time::encode(created_at), time::encode(expires_at)),
            )?;

            query_session(conn, auth_token)?.ok_or(DbError::NotFound("session"))
        })
    }

    pub fn get_session(&self, auth_token: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| query_session(conn, auth_token))
    }

    /// Apply a partial mutation to the session for `auth_token`.
    /// Fails with `NotFound` when no such token exists.
    pub fn update_session(&self, auth_token: &str, patch: &SessionPatch) -> Result<SessionRow> {
        let mut set = Assignments::default();
        if let Some(id) = patch.telegram_user_id {
            set.push("telegram_user_id", id);
        }
        if let Some(username) = &patch.telegram_username {
            set.push("telegram_username", username.clone());
        }
        if let Some(user_id) = patch.user_id {
            set.push("user_id", user_id);
        }
        if let Some(verified) = patch.verified {
            set.push("verified", verified);
        }

        self.with_conn(|conn| {
            if !set.is_empty() {
                let (sql, values) = set.into_update("telegram_sessions", "auth_token", auth_token.to_string());
                let changed = conn
                    .execute(&sql, rusqlite::params_from_iter(values))
                    .map_err(|e| constraint_as_invalid(e, "verified session needs a telegram user and a linked user"))?;
                if changed == 0 {
                    return Err(DbError::NotFound("session"));
                }
            }

            query_session(conn, auth_token)?.ok_or(DbError::NotFound("session"))
        })
    }

    /// Link a session to the Telegram account that scanned it.
    ///
    /// A session is verified once: a repeat from the same Telegram account is accepted
    /// unchanged in effect, any other account gets `Conflict`.
    pub fn mark_session_verified(
        &self,
        auth_token: &str,
        telegram_user_id: i64,
        telegram_username: Option<&str>,
        user_id: i64,
    ) -> Result<SessionRow> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE telegram_sessions
                 SET telegram_user_id = ?2, telegram_username = ?3, user_id = ?4, verified = 1
                 WHERE auth_token = ?1 AND (verified = 0 OR telegram_user_id = ?2)",
                (auth_token, telegram_user_id, telegram_username, user_id),
            )?;

            let session = query_session(conn, auth_token)?.ok_or(DbError::NotFound("session"))?;
            if changed == 0 {
                return Err(DbError::Conflict(
                    "auth token already verified by another account".to_string(),
                ));
            }
            Ok(session)
        })
    }

    /// Remove sessions whose expiry is before `cutoff`. Returns how many were deleted.
    pub fn delete_expired_sessions(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM telegram_sessions WHERE expires_at < ?1",
                [time::encode(cutoff)],
            )?;
            Ok(deleted)
        })
    }
}

fn query_session(conn: &Connection, auth_token: &str) -> Result<Option<SessionRow>> {
    conn.query_row(
        &format!("SELECT {} FROM telegram_sessions WHERE auth_token = ?1", SESSION_COLUMNS),
        [auth_token],
        session_from_row,
    )
    .optional()
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get(0)?,
        auth_token: row.get(1)?,
        telegram_user_id: row.get(2)?,
        telegram_username: row.get(3)?,
        user_id: row.get(4)?,
        verified: row.get(5)?,
        created_at: time::get(row, 6)?,
        expires_at: time::get(row, 7)?,
    })
}
