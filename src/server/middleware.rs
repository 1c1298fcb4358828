//! HTTP middleware for auth-gate
//!
//! This module provides middleware layers for:
//! - Authentication (the request gate in front of every operation)
//! - Request/response logging

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use std::time::Instant;

use crate::auth::AuthManager;
use crate::database::Database;
use crate::error::AuthError;
use crate::models::{Claims, Role};

/// Operations that skip authentication
pub const PUBLIC_METHODS: &[&str] = &[
    "/auth.AuthService/Login",
    "/auth.AuthService/Register",
    "/health",
];

const BEARER_PREFIX: &str = "Bearer ";

/// Check whether an operation is on the public allow-list
pub fn is_public_method(operation: &str) -> bool {
    PUBLIC_METHODS.contains(&operation)
}

/// Caller identity attached to a request by the gate
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser(pub Claims);

impl AuthenticatedUser {
    pub fn id(&self) -> &str {
        &self.0.sub
    }

    pub fn email(&self) -> &str {
        &self.0.email
    }

    pub fn role(&self) -> Role {
        self.0.role
    }
}

/// Outcome of a call as recorded by a handler
///
/// Handlers attach this to their response so the logging layer can tell a
/// policy rejection apart from a success; both are HTTP 200.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Rejected,
    Failed,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::Rejected => "rejected",
            CallOutcome::Failed => "failed",
        }
    }
}

/// Extract the bearer token from the authorization header
///
/// The `Bearer ` prefix is required; a bare token is rejected.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuth)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    match value.strip_prefix(BEARER_PREFIX) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::MalformedHeader),
    }
}

/// Authentication middleware function
///
/// This middleware:
/// 1. Passes public operations through unauthenticated
/// 2. Extracts the bearer token from the Authorization header
/// 3. Validates the token, including the revocation check
/// 4. Adds the authenticated user to the request extensions
pub async fn auth_middleware<D: Database + 'static>(
    State(auth_manager): State<Arc<AuthManager<D>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthResponse> {
    let operation = request.uri().path().to_string();

    if is_public_method(&operation) {
        return Ok(next.run(request).await);
    }

    let token = bearer_token(request.headers())
        .map_err(|e| reject(&operation, e))?
        .to_string();
    let claims = auth_manager
        .authenticate(&token)
        .await
        .map_err(|e| reject(&operation, e))?;

    let user = AuthenticatedUser(claims);
    tracing::debug!(
        operation = %operation,
        user_id = %user.id(),
        role = %user.role(),
        "Request authenticated"
    );

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

fn reject(operation: &str, error: AuthError) -> AuthResponse {
    tracing::warn!(operation = %operation, reason = %error, "Request rejected by gate");
    AuthResponse::from_error(&error)
}

/// Authentication error response
#[derive(Debug)]
pub struct AuthResponse {
    status: StatusCode,
    message: &'static str,
}

impl AuthResponse {
    fn from_error(error: &AuthError) -> Self {
        let message = match error {
            AuthError::MissingAuth => "Missing authorization header",
            AuthError::MalformedHeader => "Invalid authorization format",
            AuthError::InvalidToken(_)
            | AuthError::Revoked
            | AuthError::RevocationUnavailable => "Invalid or expired token",
        };

        Self {
            status: StatusCode::UNAUTHORIZED,
            message,
        }
    }
}

impl IntoResponse for AuthResponse {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message
        });
        (self.status, Json(body)).into_response()
    }
}

/// Logging middleware function
///
/// Logs every call, public or protected, including calls rejected by the
/// gate:
/// - Operation name
/// - Status code and outcome
/// - Response time
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let operation = request.uri().path().to_string();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status();
    let outcome = match response.extensions().get::<CallOutcome>() {
        Some(outcome) => outcome.as_str(),
        None if status.is_success() => CallOutcome::Success.as_str(),
        None if status == StatusCode::UNAUTHORIZED => "unauthenticated",
        None => CallOutcome::Failed.as_str(),
    };

    tracing::info!(
        operation = %operation,
        status = %status.as_u16(),
        outcome = outcome,
        duration_ms = %elapsed.as_millis(),
        "Request completed"
    );

    response
}
