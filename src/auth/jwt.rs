//! Signed bearer tokens
//!
//! Tokens are HS256 JWTs carrying [`Claims`]. The signing key is loaded once
//! at construction and never changes for the lifetime of the service.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::error::TokenError;
use crate::models::{Claims, Role};

/// Default issuer label
pub const DEFAULT_ISSUER: &str = "auth-gate";

/// Default validity window of an issued token
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Token issuance and validation
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl: Duration,
}

impl TokenService {
    /// Create a token service from a shared secret
    ///
    /// Returns `TokenError::MissingKey` if the secret is empty.
    pub fn new(secret: &str, issuer: impl Into<String>, ttl: Duration) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingKey);
        }

        // Only HS256 is accepted
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer: issuer.into(),
            ttl,
        })
    }

    /// Issuer label stamped into every token
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue a token for an identity
    pub fn issue(&self, identity_id: &str, email: &str, role: Role) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: identity_id.to_string(),
            email: email.to_string(),
            role,
            iat: now,
            exp: expiry_after(now, self.ttl)?,
            iss: self.issuer.clone(),
        };

        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(ALGORITHM), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Validate a token and return its claims
    ///
    /// Expiry is inclusive: a token is rejected at its expiry instant.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::BadSignature
                }
                // `alg: none` and unknown algorithms fail header deserialization
                ErrorKind::Json(_) | ErrorKind::Base64(_) | ErrorKind::Utf8(_)
                    if header_names_foreign_alg(token) =>
                {
                    TokenError::BadSignature
                }
                _ => TokenError::Malformed,
            }
        })?;

        // jsonwebtoken treats `exp == now` as still valid
        if data.claims.is_expired_at(Utc::now()) {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }

    /// Issue and validate a throwaway token
    ///
    /// Run once at startup so a broken key fails fast.
    pub fn self_check(&self) -> Result<(), TokenError> {
        let token = self.issue("self-check", "self-check@localhost", Role::User)?;
        let claims = self.validate(&token)?;

        if claims.sub != "self-check" {
            return Err(TokenError::Malformed);
        }

        Ok(())
    }
}

fn expiry_after(now: i64, ttl: Duration) -> Result<i64, TokenError> {
    i64::try_from(ttl.as_secs())
        .ok()
        .and_then(|secs| now.checked_add(secs))
        .ok_or_else(|| TokenError::Signing("token lifetime out of range".to_string()))
}

/// Whether the token header decodes and names an algorithm other than HS256
fn header_names_foreign_alg(token: &str) -> bool {
    let Some((header, _)) = token.split_once('.') else {
        return false;
    };
    let Ok(bytes) = URL_SAFE_NO_PAD.decode(header.trim_end_matches('=')) else {
        return false;
    };
    let Ok(header) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
        return false;
    };

    match header.get("alg").and_then(|alg| alg.as_str()) {
        Some(alg) => alg != "HS256",
        None => false,
    }
}
