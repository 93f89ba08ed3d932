//! Compact HS256 tokens: `base64url(header).base64url(payload).base64url(signature)`.
//!
//! Tokens are stateless and immutable. Nothing is stored server-side; a token
//! stops working when `exp` passes.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::TokenError;
use crate::secrets::SigningKey;

pub const DEFAULT_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // Account id
    pub user: String, // Account email
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct TokenCodec {
    ttl_secs: i64,
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_SECS)
    }
}

impl TokenCodec {
    pub fn new(ttl_secs: i64) -> Self {
        Self { ttl_secs }
    }

    /// Deterministic for identical inputs.
    pub fn issue(
        &self,
        subject_id: &str,
        subject_email: &str,
        key: &SigningKey,
        now: DateTime<Utc>,
    ) -> Result<String, JwtError> {
        let iat = now.timestamp();
        let claims = Claims {
            sub: subject_id.to_string(),
            user: subject_email.to_string(),
            iat,
            exp: iat + self.ttl_secs,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(key.as_bytes()),
        )
    }

    /// Checks shape and signature, then expiry against `now`. A token is
    /// still valid at exactly `now == exp` and expired any time after it.
    pub fn validate(
        &self,
        token: &str,
        key: &SigningKey,
        now: DateTime<Utc>,
    ) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(key.as_bytes()),
            &validation(),
        )
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            _ => TokenError::Malformed,
        })?
        .claims;

        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(TokenError::Malformed)?;
        if now > expires_at {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

// Expiry is checked against the caller's clock, so the library's own
// wall-clock check and leeway are switched off.
fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.required_spec_claims.clear();
    validation
}
