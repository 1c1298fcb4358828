//! Token-related domain models
//!
//! This module defines the decoded token claims and the revocation record
//! written on logout.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::identity::Role;

/// Claims carried by a signed bearer token
///
/// Field names follow the registered JWT claim names where one exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: identity id
    pub sub: String,

    pub email: String,

    pub role: Role,

    /// Issued at (unix seconds)
    pub iat: i64,

    /// Expires at (unix seconds)
    pub exp: i64,

    /// Issuer label
    pub iss: String,
}

impl Claims {
    /// Identity id the token was issued for
    pub fn identity_id(&self) -> &str {
        &self.sub
    }

    /// Expiry instant
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Check whether the token is expired at `now` (expiry instant included)
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

/// Revoked token record
///
/// Written once per logout and never updated. `expires_at` is copied from the
/// token so the record can be pruned once the token would be dead anyway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationRecord {
    /// Raw token value
    pub token: String,

    /// Expiry of the revoked token
    pub expires_at: DateTime<Utc>,

    /// When the token was revoked
    pub created_at: DateTime<Utc>,
}

impl RevocationRecord {
    /// Create a new revocation record stamped with the current time
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
            created_at: Utc::now(),
        }
    }
}
