//! SQLite implementation of the Database trait
//!
//! This module provides a SQLite-based implementation of the Database trait
//! using rusqlite and tokio-rusqlite for async operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use super::migrations::CREATE_SCHEMA;
use super::Database;
use crate::error::DbError;
use crate::models::{CredentialRecord, Identity, NewIdentity, RevocationRecord};

const IDENTITY_COLUMNS: &str =
    "id, email, first_name, last_name, role, is_active, created_at, updated_at";

/// SQLite database implementation
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Create a new SQLite database connection
    ///
    /// Use `:memory:` for in-memory database or a file path for persistent storage.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let conn = Connection::open(path).await?;

        // Run migrations
        conn.call(|conn| {
            conn.execute_batch(CREATE_SCHEMA)?;
            Ok::<_, rusqlite::Error>(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Create a new in-memory database (useful for testing)
    pub async fn in_memory() -> Result<Self, DbError> {
        Self::new(":memory:").await
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    // =========================================================================
    // Credential operations
    // =========================================================================

    async fn find_by_email(&self, email: &str) -> Result<Option<CredentialRecord>, DbError> {
        let email = email.to_string();

        self.conn
            .call(move |conn| {
                let sql = format!(
                    r#"
                    SELECT {IDENTITY_COLUMNS}, password_hash
                    FROM users
                    WHERE email = ?1 AND is_active = 1 AND deleted_at IS NULL
                    "#
                );
                let mut stmt = conn.prepare(&sql)?;

                let result = stmt
                    .query_row([&email], |row| {
                        Ok(CredentialRecord {
                            identity: row_to_identity(row)?,
                            password_hash: row.get(8)?,
                        })
                    })
                    .optional()?;

                Ok::<_, rusqlite::Error>(result)
            })
            .await
            .map_err(Into::into)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>, DbError> {
        let id = id.to_string();

        self.conn
            .call(move |conn| {
                let sql = format!(
                    r#"
                    SELECT {IDENTITY_COLUMNS}
                    FROM users
                    WHERE id = ?1 AND is_active = 1 AND deleted_at IS NULL
                    "#
                );
                let mut stmt = conn.prepare(&sql)?;

                let result = stmt.query_row([&id], row_to_identity).optional()?;

                Ok::<_, rusqlite::Error>(result)
            })
            .await
            .map_err(Into::into)
    }

    async fn insert_identity(&self, identity: &NewIdentity) -> Result<String, DbError> {
        let id = uuid::Uuid::new_v4().to_string();
        let email = identity.email.clone();
        let password_hash = identity.password_hash.clone();
        let first_name = identity.first_name.clone();
        let last_name = identity.last_name.clone();
        let role = identity.role.to_string();
        let now = Utc::now().to_rfc3339();

        let row_id = id.clone();
        let inserted = self
            .conn
            .call(move |conn| {
                let result = conn.execute(
                    r#"
                    INSERT INTO users
                    (id, email, password_hash, first_name, last_name, role, is_active, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)
                    "#,
                    rusqlite::params![row_id, email, password_hash, first_name, last_name, role, now],
                );

                match result {
                    Ok(_) => Ok(true),
                    Err(rusqlite::Error::SqliteFailure(err, _))
                        if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                    {
                        Ok(false)
                    }
                    Err(e) => Err(e),
                }
            })
            .await?;

        if !inserted {
            return Err(DbError::Duplicate);
        }

        Ok(id)
    }

    // =========================================================================
    // Revocation operations
    // =========================================================================

    async fn revoke_token(&self, record: &RevocationRecord) -> Result<(), DbError> {
        let token = record.token.clone();
        let expires_at = record.expires_at.timestamp();
        let created_at = record.created_at.timestamp();

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT OR IGNORE INTO revoked_tokens (token, expires_at, created_at)
                    VALUES (?1, ?2, ?3)
                    "#,
                    rusqlite::params![token, expires_at, created_at],
                )?;
                Ok::<_, rusqlite::Error>(())
            })
            .await?;

        Ok(())
    }

    async fn is_token_revoked(&self, token: &str) -> Result<bool, DbError> {
        let token = token.to_string();

        self.conn
            .call(move |conn| {
                let found = conn
                    .query_row(
                        "SELECT 1 FROM revoked_tokens WHERE token = ?1",
                        [&token],
                        |_| Ok(()),
                    )
                    .optional()?;
                Ok::<_, rusqlite::Error>(found.is_some())
            })
            .await
            .map_err(Into::into)
    }

    async fn prune_revocations(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        let now = now.timestamp();

        self.conn
            .call(move |conn| {
                let count =
                    conn.execute("DELETE FROM revoked_tokens WHERE expires_at <= ?1", [now])?;
                Ok::<_, rusqlite::Error>(count as u64)
            })
            .await
            .map_err(Into::into)
    }
}

/// Map a row starting with `IDENTITY_COLUMNS` to an identity
fn row_to_identity(row: &rusqlite::Row<'_>) -> rusqlite::Result<Identity> {
    Ok(Identity {
        id: row.get(0)?,
        email: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        role: row.get::<_, String>(4)?.parse().unwrap_or_default(),
        is_active: row.get::<_, i64>(5)? != 0,
        created_at: parse_datetime(row.get::<_, Option<String>>(6)?).unwrap_or_else(Utc::now),
        updated_at: parse_datetime(row.get::<_, Option<String>>(7)?).unwrap_or_else(Utc::now),
    })
}

/// Parse a datetime string to DateTime<Utc>
fn parse_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                // Try parsing SQLite's datetime format
                chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|dt| dt.and_utc())
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::Duration;

    async fn insert_alice(db: &SqliteDatabase) -> String {
        let identity = NewIdentity::new("alice@example.com", "hash123", "Alice", "Liddell");
        db.insert_identity(&identity).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_in_memory_database() {
        let db = SqliteDatabase::in_memory().await;
        assert!(db.is_ok());
    }

    #[tokio::test]
    async fn test_insert_and_find_by_email() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        let id = insert_alice(&db).await;

        let record = db.find_by_email("alice@example.com").await.unwrap().unwrap();
        assert_eq!(record.identity.id, id);
        assert_eq!(record.identity.first_name, "Alice");
        assert_eq!(record.identity.role, Role::User);
        assert!(record.identity.is_active);
        assert_eq!(record.password_hash, "hash123");
    }

    #[tokio::test]
    async fn test_find_by_email_unknown_returns_none() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        let result = db.find_by_email("nobody@example.com").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        let id = insert_alice(&db).await;

        let identity = db.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(identity.email, "alice@example.com");
        assert!(db.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_duplicate_email_is_rejected() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        insert_alice(&db).await;

        let again = NewIdentity::new("Alice@Example.com", "other", "A", "L");
        let result = db.insert_identity(&again).await;
        assert!(matches!(result, Err(DbError::Duplicate)));
    }

    #[tokio::test]
    async fn test_insert_with_admin_role() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        let identity =
            NewIdentity::new("root@example.com", "hash", "Root", "User").with_role(Role::Admin);
        let id = db.insert_identity(&identity).await.unwrap();

        let stored = db.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_inactive_identity_is_hidden() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        let id = insert_alice(&db).await;

        let deactivate_id = id.clone();
        db.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE users SET is_active = 0 WHERE id = ?1",
                    [&deactivate_id],
                )?;
                Ok::<_, rusqlite::Error>(())
            })
            .await
            .unwrap();

        assert!(db.find_by_email("alice@example.com").await.unwrap().is_none());
        assert!(db.find_by_id(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_and_check_token() {
        let db = SqliteDatabase::in_memory().await.unwrap();

        assert!(!db.is_token_revoked("tok").await.unwrap());

        let record = RevocationRecord::new("tok", Utc::now() + Duration::hours(1));
        db.revoke_token(&record).await.unwrap();

        assert!(db.is_token_revoked("tok").await.unwrap());
        assert!(!db.is_token_revoked("other").await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_twice_is_idempotent() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        let record = RevocationRecord::new("tok", Utc::now() + Duration::hours(1));

        db.revoke_token(&record).await.unwrap();
        db.revoke_token(&record).await.unwrap();

        assert!(db.is_token_revoked("tok").await.unwrap());
    }

    #[tokio::test]
    async fn test_prune_revocations_removes_only_expired() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        let now = Utc::now();

        db.revoke_token(&RevocationRecord::new("old", now - Duration::hours(1)))
            .await
            .unwrap();
        db.revoke_token(&RevocationRecord::new("live", now + Duration::hours(1)))
            .await
            .unwrap();

        let pruned = db.prune_revocations(now).await.unwrap();
        assert_eq!(pruned, 1);
        assert!(!db.is_token_revoked("old").await.unwrap());
        assert!(db.is_token_revoked("live").await.unwrap());
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert!(parse_datetime(Some("2024-01-15T10:30:00+00:00".to_string())).is_some());
        assert!(parse_datetime(Some("2024-01-15 10:30:00".to_string())).is_some());
        assert!(parse_datetime(Some("yesterday".to_string())).is_none());
        assert!(parse_datetime(None).is_none());
    }
}
