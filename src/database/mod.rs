//! Database layer for auth-gate
//!
//! This module defines the persistence trait the auth core talks through and
//! its SQLite implementation. The trait covers two narrow concerns: the
//! credential store (identity lookup and insert) and the revocation store
//! (revoked token records).

pub mod migrations;
pub mod sqlite;

pub use sqlite::SqliteDatabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DbError;
use crate::models::{CredentialRecord, Identity, NewIdentity, RevocationRecord};

/// Database trait for data persistence
///
/// Each method is a single atomic read or write; no multi-statement
/// transactions are required by callers. It uses `async_trait` for async
/// methods and `mockall::automock` for testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Database: Send + Sync {
    // =========================================================================
    // Credential operations
    // =========================================================================

    /// Find an active identity and its password hash by email
    async fn find_by_email(&self, email: &str) -> Result<Option<CredentialRecord>, DbError>;

    /// Find an active identity by id
    async fn find_by_id(&self, id: &str) -> Result<Option<Identity>, DbError>;

    /// Insert a new identity
    ///
    /// Returns the assigned id, or `DbError::Duplicate` if the email is
    /// already registered. The uniqueness check is enforced by the store.
    async fn insert_identity(&self, identity: &NewIdentity) -> Result<String, DbError>;

    // =========================================================================
    // Revocation operations
    // =========================================================================

    /// Record a revoked token
    ///
    /// Revoking an already revoked token is a no-op.
    async fn revoke_token(&self, record: &RevocationRecord) -> Result<(), DbError>;

    /// Check whether a token has been revoked
    async fn is_token_revoked(&self, token: &str) -> Result<bool, DbError>;

    /// Delete revocation records whose token expired at or before `now`
    ///
    /// Returns the number of deleted records
    async fn prune_revocations(&self, now: DateTime<Utc>) -> Result<u64, DbError>;
}
