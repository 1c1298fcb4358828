//! Authentication core for auth-gate
//!
//! This module provides the authentication control plane:
//! - Signed token issuance and validation
//! - Password hashing
//! - Login rate limiting
//! - Login, logout and registration orchestration
//! - Background pruning of expired revocation records

pub mod jwt;
pub mod manager;
pub mod password;
pub mod pruner;
pub mod ratelimit;

pub use jwt::{TokenService, DEFAULT_ISSUER, DEFAULT_TOKEN_TTL};
pub use manager::{validate_registration, AuthConfig, AuthManager, LoginOutcome};
pub use password::{hash_password, verify_password};
pub use pruner::RevocationPruner;
pub use ratelimit::{LoginRateLimiter, RateLimitConfig};
