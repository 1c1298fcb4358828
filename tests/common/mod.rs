//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use auth_gate::auth::{AuthConfig, AuthManager, RateLimitConfig, TokenService, DEFAULT_ISSUER};
use auth_gate::config::ServerConfig;
use auth_gate::database::SqliteDatabase;
use auth_gate::server::{AppState, Server};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub const TEST_SECRET: &str = "integration-test-secret";

/// Create an in-memory database for testing
pub async fn create_test_database() -> Arc<SqliteDatabase> {
    Arc::new(
        SqliteDatabase::in_memory()
            .await
            .expect("Failed to create test database"),
    )
}

/// Create a token service with the shared test secret
pub fn create_test_token_service() -> TokenService {
    TokenService::new(TEST_SECRET, DEFAULT_ISSUER, Duration::from_secs(3600))
        .expect("Failed to create token service")
}

/// Create a test authentication manager with the default login rate limit
pub fn create_test_auth_manager(db: Arc<SqliteDatabase>) -> Arc<AuthManager<SqliteDatabase>> {
    create_test_auth_manager_with_limit(db, RateLimitConfig::default())
}

/// Create a test authentication manager with a custom login rate limit
pub fn create_test_auth_manager_with_limit(
    db: Arc<SqliteDatabase>,
    rate_limit: RateLimitConfig,
) -> Arc<AuthManager<SqliteDatabase>> {
    let config = AuthConfig {
        rate_limit,
        ..AuthConfig::default()
    };
    Arc::new(AuthManager::new(db, create_test_token_service(), config))
}

/// Create a test application state
pub async fn create_test_state() -> AppState<SqliteDatabase> {
    let database = create_test_database().await;
    AppState {
        auth_manager: create_test_auth_manager(database),
    }
}

/// Running test server
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestApp {
    /// Full URL for a path on this server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// POST a JSON body, optionally with a bearer token
    pub async fn call(
        &self,
        path: &str,
        token: Option<&str>,
        body: serde_json::Value,
    ) -> reqwest::Response {
        let mut request = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Request failed")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Run a test server in the background
///
/// The server is shut down when the returned `TestApp` is dropped.
pub async fn run_test_server(state: AppState<SqliteDatabase>) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local address");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let server = Server::new(ServerConfig::default(), state);

    tokio::spawn(async move {
        server
            .serve(listener, async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("Server error");
    });

    TestApp {
        addr,
        client: reqwest::Client::new(),
        shutdown_tx: Some(shutdown_tx),
    }
}
