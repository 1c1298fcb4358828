//! Identity domain models
//!
//! An identity is owned by the credential store; the auth core only reads it.
//! [`Identity`] is the safe view (no secret material) and is what crosses the
//! operation boundary. [`CredentialRecord`] pairs it with the stored hash.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role assigned to an identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Safe identity view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque stable identifier
    pub id: String,

    pub email: String,

    pub first_name: String,

    pub last_name: String,

    pub role: Role,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Stored credential: identity plus password hash
///
/// Deliberately not `Serialize`; use [`CredentialRecord::into_identity`] to
/// obtain something that can leave the process.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub identity: Identity,

    /// Argon2id hash in PHC format
    pub password_hash: String,
}

impl CredentialRecord {
    /// Strip the password hash
    pub fn into_identity(self) -> Identity {
        self.identity
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("identity", &self.identity)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

/// Identity to be persisted by the credential store
///
/// The store assigns the id and the timestamps.
#[derive(Clone, PartialEq, Eq)]
pub struct NewIdentity {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

impl NewIdentity {
    /// Create a new identity with the default `user` role
    pub fn new(
        email: impl Into<String>,
        password_hash: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password_hash: password_hash.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            role: Role::User,
        }
    }

    /// Set the role
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

impl fmt::Debug for NewIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewIdentity")
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_identity() -> Identity {
        Identity {
            id: "u1".to_string(),
            email: "alice@example.com".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            role: Role::User,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_role_round_trips_through_str() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::Admin.to_string(), "admin");
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"user\"").unwrap(),
            Role::User
        );
    }

    #[test]
    fn test_new_identity_defaults_to_user_role() {
        let identity = NewIdentity::new("a@b.co", "hash", "A", "B");
        assert_eq!(identity.role, Role::User);
        assert_eq!(identity.with_role(Role::Admin).role, Role::Admin);
    }

    #[test]
    fn test_safe_identity_has_no_hash() {
        let record = CredentialRecord {
            identity: sample_identity(),
            password_hash: "$argon2id$secret".to_string(),
        };

        let json = serde_json::to_string(&record.clone().into_identity()).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(json.contains("alice@example.com"));
    }

    #[test]
    fn test_debug_redacts_password_hash() {
        let record = CredentialRecord {
            identity: sample_identity(),
            password_hash: "$argon2id$secret".to_string(),
        };
        let debug = format!("{:?}", record);
        assert!(!debug.contains("argon2id"));
        assert!(debug.contains("<redacted>"));

        let new_identity = NewIdentity::new("a@b.co", "$argon2id$secret", "A", "B");
        assert!(!format!("{:?}", new_identity).contains("argon2id"));
    }
}
