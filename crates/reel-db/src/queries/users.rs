use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use tracing::debug;

use reel_types::Patch;
use reel_types::models::Role;

use super::{Assignments, OptionalExt, get_enum};
use crate::models::{UserFields, UserRow};
use crate::{Database, DbError, Result, time};

const USER_COLUMNS: &str =
    "id, open_id, name, email, login_method, role, created_at, updated_at, last_signed_in";

impl Database {
    /// Insert the user for `open_id`, or patch the fields the caller supplied.
    ///
    /// The configured owner identity always ends up with the admin role. When the
    /// caller supplies nothing, `last_signed_in` is bumped so every login is recorded.
    pub fn upsert_user(
        &self,
        open_id: &str,
        fields: &UserFields,
        owner_open_id: Option<&str>,
    ) -> Result<UserRow> {
        if open_id.trim().is_empty() {
            return Err(DbError::Invalid("user open_id is required".into()));
        }

        let is_owner = owner_open_id.is_some_and(|owner| owner == open_id);
        let now = Utc::now();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let id = match query_user_by_open_id(&tx, open_id)? {
                None => {
                    let role = if is_owner {
                        Role::Admin
                    } else {
                        fields.role.unwrap_or(Role::User)
                    };
                    let created = time::encode(now);
                    let last_signed_in = time::encode(fields.last_signed_in.unwrap_or(now));

                    tx.execute(
                        "INSERT INTO users (open_id, name, email, login_method, role, created_at, updated_at, last_signed_in)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7)",
                        rusqlite::params![
                            open_id,
                            insert_value(&fields.name),
                            insert_value(&fields.email),
                            insert_value(&fields.login_method),
                            role.as_str(),
                            created,
                            last_signed_in,
                        ],
                    )?;
                    debug!("Created user {} ({})", tx.last_insert_rowid(), open_id);
                    tx.last_insert_rowid()
                }
                Some(user) => {
                    let mut set = Assignments::default();
                    push_patch(&mut set, "name", &fields.name);
                    push_patch(&mut set, "email", &fields.email);
                    push_patch(&mut set, "login_method", &fields.login_method);

                    if is_owner {
                        set.push("role", Role::Admin.as_str().to_string());
                    } else if let Some(role) = fields.role {
                        set.push("role", role.as_str().to_string());
                    }

                    match fields.last_signed_in {
                        Some(ts) => set.push("last_signed_in", time::encode(ts)),
                        None if fields.is_empty() => set.push("last_signed_in", time::encode(now)),
                        None => {}
                    }
                    set.push("updated_at", time::encode(now));

                    let (sql, values) = set.into_update("users", "id", user.id);
                    tx.execute(&sql, rusqlite::params_from_iter(values))?;
                    user.id
                }
            };

            let row = query_user_by_id(&tx, id)?.ok_or(DbError::NotFound("user"))?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn get_user_by_open_id(&self, open_id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_open_id(conn, open_id))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }
}

fn insert_value(patch: &Patch<String>) -> Option<&str> {
    match patch {
        Patch::Set(v) => Some(v.as_str()),
        Patch::Keep | Patch::Clear => None,
    }
}

fn push_patch(set: &mut Assignments, column: &'static str, patch: &Patch<String>) {
    if let Some(value) = patch.as_write() {
        set.push(column, value.cloned().map_or(Value::Null, Value::Text));
    }
}

pub(crate) fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        [id],
        user_from_row,
    )
    .optional()
}

fn query_user_by_open_id(conn: &Connection, open_id: &str) -> Result<Option<UserRow>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE open_id = ?1", USER_COLUMNS),
        [open_id],
        user_from_row,
    )
    .optional()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        open_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        login_method: row.get(4)?,
        role: get_enum(row, 5)?,
        created_at: time::get(row, 6)?,
        updated_at: time::get(row, 7)?,
        last_signed_in: time::get(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> UserFields {
        UserFields {
            name: Patch::Set(name.to_string()),
            login_method: Patch::Set("telegram".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn inserts_then_reads_back() {
        let db = Database::open_in_memory().unwrap();
        let user = db.upsert_user("telegram_42", &named("Ada"), None).unwrap();

        assert_eq!(user.open_id, "telegram_42");
        assert_eq!(user.name.as_deref(), Some("Ada"));
        assert_eq!(user.login_method.as_deref(), Some("telegram"));
        assert_eq!(user.email, None);
        assert_eq!(user.role, Role::User);

        let fetched = db.get_user_by_open_id("telegram_42").unwrap().unwrap();
        assert_eq!(fetched, user);
        assert_eq!(db.get_user_by_id(user.id).unwrap().unwrap(), user);
    }

    #[test]
    fn omitted_fields_stay_and_null_clears() {
        let db = Database::open_in_memory().unwrap();
        let fields = UserFields {
            email: Patch::Set("ada@example.com".into()),
            ..named("Ada")
        };
        let first = db.upsert_user("telegram_1", &fields, None).unwrap();

        let patch = UserFields {
            name: Patch::Set("Ada L.".into()),
            email: Patch::Clear,
            ..Default::default()
        };
        let second = db.upsert_user("telegram_1", &patch, None).unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.name.as_deref(), Some("Ada L."));
        assert_eq!(second.email, None);
        assert_eq!(second.login_method.as_deref(), Some("telegram"));
        assert_eq!(second.last_signed_in, first.last_signed_in);
    }

    #[test]
    fn empty_upsert_bumps_last_signed_in() {
        let db = Database::open_in_memory().unwrap();
        let first = db.upsert_user("telegram_2", &named("Bo"), None).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));

        let second = db.upsert_user("telegram_2", &UserFields::default(), None).unwrap();
        assert!(second.last_signed_in > first.last_signed_in);
        assert_eq!(second.name, first.name);
    }

    #[test]
    fn owner_is_always_admin() {
        let db = Database::open_in_memory().unwrap();
        let owner = db
            .upsert_user("telegram_owner", &named("Root"), Some("telegram_owner"))
            .unwrap();
        assert_eq!(owner.role, Role::Admin);

        let demote = UserFields {
            role: Some(Role::User),
            ..Default::default()
        };
        let still = db
            .upsert_user("telegram_owner", &demote, Some("telegram_owner"))
            .unwrap();
        assert_eq!(still.role, Role::Admin);

        let other = db
            .upsert_user("telegram_9", &named("Cy"), Some("telegram_owner"))
            .unwrap();
        assert_eq!(other.role, Role::User);
    }

    #[test]
    fn empty_open_id_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let err = db.upsert_user("  ", &named("x"), None).unwrap_err();
        assert!(matches!(err, DbError::Invalid(_)));
    }

    #[test]
    fn missing_user_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_user_by_open_id("nobody").unwrap().is_none());
        assert!(db.get_user_by_id(404).unwrap().is_none());
    }
}
