//! auth-gate - credential issuance and session validation
//!
//! This crate provides the authentication control plane of a networked service:
//! signed bearer token issuance and validation, revocation on logout, a
//! request gate that enforces authentication on every inbound call, and a
//! process-wide rate limiter on the login path.

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod server;
pub mod telemetry;
