//! HTTP router for auth-gate
//!
//! This module defines the axum router that handles all HTTP requests.
//! Every operation is a `POST` to its fully-qualified method name:
//! - `/auth.AuthService/Login`, `/auth.AuthService/Register` (public)
//! - `/auth.AuthService/Logout`, `/user.UserService/GetProfile` (protected)
//!
//! Policy outcomes and internal failures are both answered with HTTP 200
//! and a `{success, message}` payload. Only the gate answers 401.

use axum::{
    extract::State,
    http::HeaderMap,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::AuthManager;
use crate::database::Database;
use crate::error::ServiceError;
use crate::models::{
    LoginRequest, LoginResponse, LogoutRequest, LogoutResponse, ProfileResponse,
    RegisterRequest, RegisterResponse,
};

use super::middleware::{
    auth_middleware, bearer_token, logging_middleware, AuthenticatedUser, CallOutcome,
};

pub const LOGIN_PATH: &str = "/auth.AuthService/Login";
pub const LOGOUT_PATH: &str = "/auth.AuthService/Logout";
pub const REGISTER_PATH: &str = "/auth.AuthService/Register";
pub const GET_PROFILE_PATH: &str = "/user.UserService/GetProfile";

/// Shared application state
pub struct AppState<D: Database> {
    /// Authentication manager
    pub auth_manager: Arc<AuthManager<D>>,
}

impl<D: Database> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            auth_manager: Arc::clone(&self.auth_manager),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Build the main application router
///
/// The logging layer wraps the gate so calls rejected by the gate are
/// logged too.
pub fn build_router<D: Database + 'static>(state: AppState<D>) -> Router {
    let auth_manager = Arc::clone(&state.auth_manager);

    Router::new()
        .route("/health", get(health_handler))
        .route(LOGIN_PATH, post(login_handler::<D>))
        .route(LOGOUT_PATH, post(logout_handler::<D>))
        .route(REGISTER_PATH, post(register_handler::<D>))
        .route(GET_PROFILE_PATH, post(get_profile_handler::<D>))
        .layer(middleware::from_fn_with_state(
            auth_manager,
            auth_middleware::<D>,
        ))
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

// =============================================================================
// Response helpers
// =============================================================================

fn respond<T: Serialize>(outcome: CallOutcome, body: T) -> Response {
    (Extension(outcome), Json(body)).into_response()
}

/// Log a failed operation and return the caller-safe message
fn failure(operation: &'static str, err: &ServiceError) -> (CallOutcome, String) {
    match err {
        ServiceError::Rejected(rejection) => {
            tracing::info!(operation, reason = %rejection, "Operation rejected");
            (CallOutcome::Rejected, err.public_message())
        }
        ServiceError::Internal(internal) => {
            tracing::error!(operation, error = %internal, "Operation failed");
            (CallOutcome::Failed, err.public_message())
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint handler
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn login_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Json(request): Json<LoginRequest>,
) -> Response {
    match state
        .auth_manager
        .login(&request.email, &request.password)
        .await
    {
        Ok(outcome) => respond(
            CallOutcome::Success,
            LoginResponse::success(outcome.token, outcome.user),
        ),
        Err(err) => {
            let (outcome, message) = failure("Login", &err);
            respond(outcome, LoginResponse::failure(message))
        }
    }
}

/// Revokes the token in the body, or the caller's own token if none is given
async fn logout_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    headers: HeaderMap,
    Json(request): Json<LogoutRequest>,
) -> Response {
    let token = if request.token.is_empty() {
        bearer_token(&headers).unwrap_or_default().to_string()
    } else {
        request.token
    };

    match state.auth_manager.logout(&token).await {
        Ok(()) => respond(CallOutcome::Success, LogoutResponse::success()),
        Err(err) => {
            let (outcome, message) = failure("Logout", &err);
            respond(outcome, LogoutResponse::failure(message))
        }
    }
}

async fn register_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Json(request): Json<RegisterRequest>,
) -> Response {
    match state.auth_manager.register(&request).await {
        Ok(user_id) => respond(CallOutcome::Success, RegisterResponse::success(user_id)),
        Err(err) => {
            let (outcome, message) = failure("Register", &err);
            respond(outcome, RegisterResponse::failure(message))
        }
    }
}

async fn get_profile_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Response {
    match state.auth_manager.profile(&user.0).await {
        Ok(identity) => respond(CallOutcome::Success, ProfileResponse::success(identity)),
        Err(err) => {
            let (outcome, message) = failure("GetProfile", &err);
            respond(outcome, ProfileResponse::failure(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{hash_password, AuthConfig, TokenService, DEFAULT_ISSUER, DEFAULT_TOKEN_TTL};
    use crate::database::MockDatabase;
    use crate::error::DbError;
    use crate::models::{CredentialRecord, Identity, Role};
    use axum::http::{header, HeaderName, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use chrono::Utc;
    use std::sync::Mutex;
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    const SECRET: &str = "router-test-secret";

    fn token_service() -> TokenService {
        TokenService::new(SECRET, DEFAULT_ISSUER, DEFAULT_TOKEN_TTL).unwrap()
    }

    fn alice() -> Identity {
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

    fn create_test_server(mock_db: MockDatabase) -> TestServer {
        let auth_manager = Arc::new(AuthManager::new(
            Arc::new(mock_db),
            token_service(),
            AuthConfig::default(),
        ));
        let app = build_router(AppState { auth_manager });
        TestServer::new(app).unwrap()
    }

    /// Records `operation status` for every "Request completed" event
    #[derive(Clone, Default)]
    struct CompletedCalls(Arc<Mutex<Vec<String>>>);

    #[derive(Default)]
    struct CompletedFields {
        message: String,
        operation: String,
        status: String,
    }

    impl Visit for CompletedFields {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            let value = format!("{:?}", value);
            match field.name() {
                "message" => self.message = value,
                "operation" => self.operation = value,
                "status" => self.status = value,
                _ => {}
            }
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for CompletedCalls {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = CompletedFields::default();
            event.record(&mut fields);
            if fields.message == "Request completed" {
                self.0
                    .lock()
                    .unwrap()
                    .push(format!("{} {}", fields.operation, fields.status));
            }
        }
    }

    fn bearer(token: &str) -> (HeaderName, HeaderValue) {
        (
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        )
    }

    // Test 1: Health endpoint returns OK
    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let server = create_test_server(MockDatabase::new());

        let response = server.get("/health").await;
        response.assert_status_ok();

        let body: HealthResponse = response.json();
        assert_eq!(body.status, "healthy");
        assert!(!body.version.is_empty());
    }

    // Test 2: Login returns token and safe user view
    #[tokio::test]
    async fn test_login_success_payload() {
        let record = CredentialRecord {
            identity: alice(),
            password_hash: hash_password("secret123").unwrap(),
        };
        let mut mock_db = MockDatabase::new();
        mock_db
            .expect_find_by_email()
            .returning(move |_| Ok(Some(record.clone())));
        let server = create_test_server(mock_db);

        let response = server
            .post(LOGIN_PATH)
            .json(&LoginRequest {
                email: "alice@example.com".to_string(),
                password: "secret123".to_string(),
            })
            .await;
        response.assert_status_ok();

        let body: serde_json::Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Login successful");
        assert!(body["token"].as_str().is_some());
        assert_eq!(body["user"]["email"], "alice@example.com");
        assert!(body["user"].get("password_hash").is_none());
    }

    // Test 3: Internal failure is a 200 with the generic message
    #[tokio::test]
    async fn test_login_internal_error_is_generic() {
        let mut mock_db = MockDatabase::new();
        mock_db
            .expect_find_by_email()
            .returning(|_| Err(DbError::Migration("secret detail".to_string())));
        let server = create_test_server(mock_db);

        let response = server
            .post(LOGIN_PATH)
            .json(&LoginRequest {
                email: "alice@example.com".to_string(),
                password: "secret123".to_string(),
            })
            .await;
        response.assert_status_ok();

        let body: LoginResponse = response.json();
        assert!(!body.success);
        assert_eq!(body.message, "Internal server error");
        assert!(body.token.is_none());
    }

    // Test 4: Register validation failure is a policy rejection
    #[tokio::test]
    async fn test_register_validation_rejection() {
        let server = create_test_server(MockDatabase::new());

        let response = server
            .post(REGISTER_PATH)
            .json(&RegisterRequest::new("bob@example.com", "12345", "Bob", "Builder"))
            .await;
        response.assert_status_ok();

        let body: RegisterResponse = response.json();
        assert!(!body.success);
        assert_eq!(body.message, "Password must be at least 6 characters");
        assert!(body.user_id.is_none());
    }

    // Test 5: Protected operations need a token
    #[tokio::test]
    async fn test_protected_routes_require_auth() {
        let server = create_test_server(MockDatabase::new());

        server
            .post(GET_PROFILE_PATH)
            .json(&serde_json::json!({}))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .post(LOGOUT_PATH)
            .json(&LogoutRequest::default())
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    // Test 6: GetProfile returns the caller's identity
    #[tokio::test]
    async fn test_get_profile() {
        let mut mock_db = MockDatabase::new();
        mock_db.expect_is_token_revoked().returning(|_| Ok(false));
        mock_db
            .expect_find_by_id()
            .withf(|id| id == "u1")
            .returning(|_| Ok(Some(alice())));
        let server = create_test_server(mock_db);

        let token = token_service()
            .issue("u1", "alice@example.com", Role::User)
            .unwrap();
        let (name, value) = bearer(&token);

        let response = server
            .post(GET_PROFILE_PATH)
            .add_header(name, value)
            .json(&serde_json::json!({}))
            .await;
        response.assert_status_ok();

        let body: ProfileResponse = response.json();
        assert!(body.success);
        assert_eq!(body.user.unwrap().id, "u1");
    }

    // Test 7: Logout without a body token revokes the caller's token
    #[tokio::test]
    async fn test_logout_defaults_to_caller_token() {
        let token = token_service()
            .issue("u1", "alice@example.com", Role::User)
            .unwrap();

        let expected = token.clone();
        let mut mock_db = MockDatabase::new();
        mock_db.expect_is_token_revoked().returning(|_| Ok(false));
        mock_db
            .expect_revoke_token()
            .withf(move |record| record.token == expected)
            .times(1)
            .returning(|_| Ok(()));
        let server = create_test_server(mock_db);

        let (name, value) = bearer(&token);
        let response = server
            .post(LOGOUT_PATH)
            .add_header(name, value)
            .json(&LogoutRequest::default())
            .await;
        response.assert_status_ok();

        let body: LogoutResponse = response.json();
        assert!(body.success);
        assert_eq!(body.message, "Logged out successfully");
    }

    // Test 8: Calls turned away by the gate still reach the logging layer
    #[tokio::test]
    async fn test_gate_rejections_are_logged() {
        let calls = CompletedCalls::default();
        let subscriber = tracing_subscriber::registry().with(calls.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let server = create_test_server(MockDatabase::new());
        server
            .post(GET_PROFILE_PATH)
            .json(&serde_json::json!({}))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server.get("/health").await.assert_status_ok();

        let recorded = calls.0.lock().unwrap().clone();
        assert!(
            recorded.contains(&format!("{} 401", GET_PROFILE_PATH)),
            "recorded: {:?}",
            recorded
        );
        assert!(recorded.contains(&"/health 200".to_string()));
    }
}
