//! Authentication manager
//!
//! This module coordinates the token service, the login rate limiter and
//! the credential and revocation stores to implement login, logout and
//! registration. It also performs the per-request token check used by the
//! request gate.
//!
//! Every operation returns `Result<T, ServiceError>`: policy rejections
//! carry a user-safe message, internal failures carry full detail for the
//! logs and are mapped to a generic message at the boundary.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::database::Database;
use crate::error::{
    AuthError, DbError, InternalError, Rejection, ServiceError, ValidationError,
};
use crate::models::{Claims, Identity, NewIdentity, RegisterRequest, RevocationRecord, Role};

use super::jwt::TokenService;
use super::password::{hash_password, verify_password, DUMMY_HASH};
use super::ratelimit::{LoginRateLimiter, RateLimitConfig};

/// Minimum accepted password length, in characters
pub const MIN_PASSWORD_LEN: usize = 6;

/// Configuration for the authentication manager
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Login rate limit
    pub rate_limit: RateLimitConfig,

    /// Deadline for every individual store call
    pub store_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            store_timeout: Duration::from_secs(5),
        }
    }
}

/// Successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub user: Identity,
}

/// Authentication manager
pub struct AuthManager<D: Database> {
    db: Arc<D>,
    tokens: TokenService,
    rate_limiter: LoginRateLimiter,
    store_timeout: Duration,
}

impl<D: Database> AuthManager<D> {
    /// Create a new authentication manager
    pub fn new(db: Arc<D>, tokens: TokenService, config: AuthConfig) -> Self {
        Self {
            db,
            tokens,
            rate_limiter: LoginRateLimiter::new(config.rate_limit),
            store_timeout: config.store_timeout,
        }
    }

    /// Token service used for issuance and validation
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Authenticate with email and password and issue a token
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ServiceError> {
        if !self.rate_limiter.allow() {
            warn!("Login rate limit exceeded");
            return Err(Rejection::TooManyAttempts.into());
        }

        if email.is_empty() || password.is_empty() {
            return Err(Rejection::MissingCredentials.into());
        }

        let record = self
            .with_store_timeout(self.db.find_by_email(email))
            .await?;

        // Unknown email and wrong password must be indistinguishable, in
        // message and in cost
        let hash = record
            .as_ref()
            .map_or_else(|| DUMMY_HASH.to_string(), |r| r.password_hash.clone());
        let candidate = password.to_string();
        let matches = tokio::task::spawn_blocking(move || verify_password(&candidate, &hash))
            .await
            .map_err(|e| InternalError::Task(e.to_string()))?;

        let record = match record {
            Some(record) => record,
            None => {
                debug!("Login for unknown email");
                return Err(Rejection::InvalidCredentials.into());
            }
        };

        if !matches {
            debug!(user_id = %record.identity.id, "Login with wrong password");
            return Err(Rejection::InvalidCredentials.into());
        }

        let user = record.into_identity();
        let token = self
            .tokens
            .issue(&user.id, &user.email, user.role)
            .map_err(InternalError::from)?;

        info!(user_id = %user.id, role = %user.role, "Login successful");

        Ok(LoginOutcome { token, user })
    }

    /// Revoke a token
    ///
    /// Revoking an already revoked token that still validates succeeds.
    pub async fn logout(&self, token: &str) -> Result<(), ServiceError> {
        let claims = self.tokens.validate(token).map_err(|e| {
            debug!(reason = %e, "Logout with invalid token");
            Rejection::InvalidToken
        })?;

        let record = RevocationRecord::new(token, claims.expires_at());
        self.with_store_timeout(self.db.revoke_token(&record))
            .await?;

        info!(user_id = %claims.sub, "Token revoked");

        Ok(())
    }

    /// Register a new identity with the `user` role
    ///
    /// Returns the new identity id. No token is issued.
    pub async fn register(&self, request: &RegisterRequest) -> Result<String, ServiceError> {
        validate_registration(request)?;

        let id = self
            .create_identity(
                &request.email,
                &request.password,
                &request.first_name,
                &request.last_name,
                Role::User,
            )
            .await?;

        info!(user_id = %id, "Account created");

        Ok(id)
    }

    /// Load the identity behind validated claims
    pub async fn profile(&self, claims: &Claims) -> Result<Identity, ServiceError> {
        self.with_store_timeout(self.db.find_by_id(claims.identity_id()))
            .await?
            .ok_or_else(|| Rejection::UserNotFound.into())
    }

    /// Validate a bearer token for a protected call
    ///
    /// Checks signature, expiry and revocation. A failed revocation lookup
    /// rejects the call.
    pub async fn authenticate(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.tokens.validate(token).map_err(AuthError::InvalidToken)?;

        match self.with_store_timeout(self.db.is_token_revoked(token)).await {
            Ok(false) => Ok(claims),
            Ok(true) => Err(AuthError::Revoked),
            Err(e) => {
                error!(error = %e, "Revocation lookup failed");
                Err(AuthError::RevocationUnavailable)
            }
        }
    }

    /// Create an admin identity unless the email is already registered
    ///
    /// Returns `true` if an identity was created.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<bool, ServiceError> {
        validate_registration(&RegisterRequest::new(email, password, "Admin", "User"))?;

        match self
            .create_identity(email, password, "Admin", "User", Role::Admin)
            .await
        {
            Ok(id) => {
                info!(user_id = %id, "Bootstrap admin created");
                Ok(true)
            }
            Err(ServiceError::Rejected(Rejection::EmailTaken)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete revocation records whose token has expired
    pub async fn prune_revocations(&self) -> Result<u64, ServiceError> {
        let pruned = self
            .with_store_timeout(self.db.prune_revocations(Utc::now()))
            .await?;

        if pruned > 0 {
            info!(count = pruned, "Pruned expired revocation records");
        }

        Ok(pruned)
    }

    async fn create_identity(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
        role: Role,
    ) -> Result<String, ServiceError> {
        // Fast path only; the unique constraint on insert is authoritative
        if self
            .with_store_timeout(self.db.find_by_email(email))
            .await?
            .is_some()
        {
            return Err(Rejection::EmailTaken.into());
        }

        let plaintext = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&plaintext))
            .await
            .map_err(|e| InternalError::Task(e.to_string()))?
            .map_err(InternalError::from)?;

        let identity =
            NewIdentity::new(email, password_hash, first_name, last_name).with_role(role);

        match self
            .with_store_timeout(self.db.insert_identity(&identity))
            .await
        {
            Ok(id) => Ok(id),
            Err(InternalError::Store(DbError::Duplicate)) => {
                debug!("Duplicate email caught by store constraint");
                Err(Rejection::EmailTaken.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Run a store call bounded by the configured deadline
    async fn with_store_timeout<T, F>(&self, fut: F) -> Result<T, InternalError>
    where
        F: Future<Output = Result<T, DbError>>,
    {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result.map_err(InternalError::from),
            Err(_) => Err(InternalError::Timeout),
        }
    }
}

/// Check registration fields
///
/// The email check is structural only: longer than 3 characters and
/// containing both `@` and `.`.
pub fn validate_registration(request: &RegisterRequest) -> Result<(), ValidationError> {
    if request.email.is_empty() {
        return Err(ValidationError::EmailRequired);
    }

    if request.password.is_empty() {
        return Err(ValidationError::PasswordRequired);
    }

    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }

    if request.first_name.is_empty() {
        return Err(ValidationError::FirstNameRequired);
    }

    if request.last_name.is_empty() {
        return Err(ValidationError::LastNameRequired);
    }

    let email = &request.email;
    if email.chars().count() <= 3 || !email.contains('@') || !email.contains('.') {
        return Err(ValidationError::InvalidEmail);
    }

    Ok(())
}
