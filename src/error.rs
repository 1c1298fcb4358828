//! Application error types for auth-gate
//!
//! This module defines the error types used throughout the application.
//! All error types use `thiserror` for ergonomic error handling.
//!
//! Two families matter at the operation boundary:
//! - [`Rejection`]: policy outcomes whose message is safe to show to callers
//! - [`InternalError`]: store, hashing and signing failures that are logged
//!   and only ever surfaced as [`INTERNAL_ERROR_MESSAGE`]

use thiserror::Error;

/// Message returned to callers for every internal failure
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Token validation and issuance errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token cannot be parsed as a token of the expected structure
    #[error("Malformed token")]
    Malformed,

    /// Signature mismatch or unexpected signing algorithm
    #[error("Bad token signature")]
    BadSignature,

    /// Expiry is at or before the validation instant
    #[error("Token expired")]
    Expired,

    /// Signing primitive failed
    #[error("Token signing failed: {0}")]
    Signing(String),

    /// No signing key configured
    #[error("Signing key is not configured")]
    MissingKey,
}

/// Request gate failures
///
/// All of these surface to the caller as the same "unauthenticated" fault.
/// The variants only exist so logs can tell them apart.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Missing authorization header
    #[error("Missing authorization header")]
    MissingAuth,

    /// Authorization header without the `Bearer ` prefix
    #[error("Invalid authorization format")]
    MalformedHeader,

    /// Token failed validation
    #[error("Invalid token: {0}")]
    InvalidToken(TokenError),

    /// Token was revoked by logout
    #[error("Token revoked")]
    Revoked,

    /// Revocation lookup could not be completed
    #[error("Revocation lookup failed")]
    RevocationUnavailable,
}

/// Password hashing errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    /// Hashing failed
    #[error("Hash failed: {0}")]
    HashFailed(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Record not found
    #[error("Record not found")]
    NotFound,

    /// Unique key already taken
    #[error("Duplicate key")]
    Duplicate,

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Registration field validation failures
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Email is required")]
    EmailRequired,

    #[error("Password is required")]
    PasswordRequired,

    #[error("Password must be at least 6 characters")]
    PasswordTooShort,

    #[error("First name is required")]
    FirstNameRequired,

    #[error("Last name is required")]
    LastNameRequired,

    #[error("Invalid email format")]
    InvalidEmail,
}

/// Policy rejections
///
/// The display text of every variant is a user-safe message.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Login rate limiter exhausted
    #[error("Too many login attempts. Please try again later.")]
    TooManyAttempts,

    /// Empty email or password on login
    #[error("Email and password are required")]
    MissingCredentials,

    /// Unknown email or wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Logout with a token that does not validate
    #[error("Invalid token")]
    InvalidToken,

    /// Registration with an email that is already taken
    #[error("Email already registered")]
    EmailTaken,

    /// Identity behind a valid token no longer exists
    #[error("User not found")]
    UserNotFound,

    /// Registration field validation
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

/// Failures that are logged in full and hidden from callers
#[derive(Debug, Error)]
pub enum InternalError {
    /// Credential or revocation store failure
    #[error("Store error: {0}")]
    Store(#[from] DbError),

    /// Password hashing failure
    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    /// Token signing failure
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Store call exceeded its deadline
    #[error("Store call timed out")]
    Timeout,

    /// Blocking task failed to complete
    #[error("Background task failed: {0}")]
    Task(String),
}

/// Outcome of an orchestrator operation that did not succeed
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Policy rejection with a user-safe message
    #[error("Rejected: {0}")]
    Rejected(#[from] Rejection),

    /// Internal failure
    #[error("Internal: {0}")]
    Internal(#[from] InternalError),
}

impl ServiceError {
    /// Message that may be shown to the caller
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Rejected(rejection) => rejection.to_string(),
            ServiceError::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        ServiceError::Internal(InternalError::Store(err))
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Rejected(Rejection::Validation(err))
    }
}
