//! Domain models for auth-gate
//!
//! This module contains the core domain models used throughout the application.

pub mod identity;
pub mod rpc;
pub mod token;

// Re-export commonly used types
pub use identity::{CredentialRecord, Identity, NewIdentity, Role};
pub use rpc::{
    LoginRequest, LoginResponse, LogoutRequest, LogoutResponse, ProfileResponse,
    RegisterRequest, RegisterResponse,
};
pub use token::{Claims, RevocationRecord};
