//! SQLite-backed credential store.
//!
//! Table:
//! - `users`: id, name, email (unique), password_hash, profile_picture,
//!   notify_email, notify_sms, theme, version, created_at

use super::model::{NewUser, NotificationPreferences, Theme, User};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// Errors raised by a [`UserStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email is already registered")]
    DuplicateEmail,
    #[error("user not found")]
    NotFound,
    /// The record changed between load and save.
    #[error("user record was modified concurrently")]
    Conflict,
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistence contract for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. Fails with [`StoreError::DuplicateEmail`] when the
    /// email is taken.
    async fn insert(&self, new_user: NewUser) -> StoreResult<User>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Write every mutable field back, provided the stored version still
    /// equals `user.version`. Returns the record with its new version.
    async fn save(&self, user: User) -> StoreResult<User>;

    /// Hard-delete. Returns `false` when nothing matched.
    async fn delete(&self, id: &str) -> StoreResult<bool>;
}

const USER_COLUMNS: &str = "id, name, email, password_hash, profile_picture,
     notify_email, notify_sms, theme, version, created_at";

/// SQLite implementation of [`UserStore`].
pub struct SqliteUserStore {
    conn: Mutex<Connection>,
}

impl SqliteUserStore {
    /// Open (or create) the user database at the given path.
    pub fn open(db_path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(db_path)?;

        // WAL mode for concurrent reads + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        Self::with_connection(conn)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                profile_picture TEXT,
                notify_email INTEGER NOT NULL DEFAULT 1,
                notify_sms INTEGER NOT NULL DEFAULT 1,
                theme TEXT NOT NULL DEFAULT 'light' CHECK (theme IN ('light', 'dark')),
                version INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Count registered users.
    pub fn user_count(&self) -> StoreResult<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn find_one(&self, column: &str, value: &str) -> StoreResult<Option<User>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
        let user = conn
            .query_row(&sql, params![value], row_to_user)
            .optional()?;
        Ok(user)
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn insert(&self, new_user: NewUser) -> StoreResult<User> {
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            profile_picture: None,
            notifications: NotificationPreferences::default(),
            theme: Theme::default(),
            version: 0,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO users (id, name, email, password_hash, profile_picture,
                                notify_email, notify_sms, theme, version, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                user.id,
                user.name,
                user.email,
                user.password_hash,
                user.profile_picture,
                user.notifications.email,
                user.notifications.sms,
                user.theme.as_str(),
                user.version,
                user.created_at,
            ],
        );

        match result {
            Ok(_) => Ok(user),
            Err(e) if is_constraint_violation(&e) => Err(StoreError::DuplicateEmail),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        self.find_one("id", id)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.find_one("email", email)
    }

    async fn save(&self, user: User) -> StoreResult<User> {
        let conn = self.conn.lock();
        let result = conn.execute(
            "UPDATE users SET
                name = ?1,
                email = ?2,
                password_hash = ?3,
                profile_picture = ?4,
                notify_email = ?5,
                notify_sms = ?6,
                theme = ?7,
                version = version + 1
             WHERE id = ?8 AND version = ?9",
            params![
                user.name,
                user.email,
                user.password_hash,
                user.profile_picture,
                user.notifications.email,
                user.notifications.sms,
                user.theme.as_str(),
                user.id,
                user.version,
            ],
        );

        let updated = match result {
            Ok(n) => n,
            Err(e) if is_constraint_violation(&e) => return Err(StoreError::DuplicateEmail),
            Err(e) => return Err(e.into()),
        };

        if updated == 0 {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
                params![user.id],
                |row| row.get(0),
            )?;
            return Err(if exists {
                StoreError::Conflict
            } else {
                StoreError::NotFound
            });
        }

        Ok(User {
            version: user.version + 1,
            ..user
        })
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let theme: String = row.get(7)?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        profile_picture: row.get(4)?,
        notifications: NotificationPreferences {
            email: row.get(5)?,
            sms: row.get(6)?,
        },
        theme: Theme::parse(&theme).unwrap_or_default(),
        version: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ── Tests ───────────────────────────────────────────────────────────
