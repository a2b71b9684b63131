pub mod access;
pub mod password;
pub mod role;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use access::{AccessError, Guard};
pub use role::Role;

/// Sessions live for a fixed 24 hours; there is no refresh.
pub const SESSION_TTL_HOURS: i64 = 24;

/// Name of the httpOnly cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

/// Signed token payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub uid: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// The verified caller for the duration of one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Identity {
    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid session token: {0}")]
    Invalid(String),

    #[error("session token expired")]
    Expired,

    #[error("session secret not configured")]
    InvalidSecret,

    #[error("failed to sign session token: {0}")]
    Signing(String),
}

/// Mints and verifies HS256 session tokens. Holds no per-session state.
#[derive(Clone)]
pub struct SessionCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl SessionCodec {
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::InvalidSecret);
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(SESSION_TTL_HOURS),
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a token with the standard session lifetime.
    pub fn mint(&self, user_id: Uuid, role: Role) -> Result<String, TokenError> {
        self.mint_at(user_id, role, self.ttl, Utc::now())
    }

    pub fn mint_at(
        &self,
        user_id: Uuid,
        role: Role,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            uid: user_id,
            role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify signature and structure, then expiry against `now`.
    /// A token is dead from the second `now >= exp`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the injected clock, without leeway.
        validation.validate_exp = false;

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;
        let claims = data.claims;

        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        let issued_at = DateTime::<Utc>::from_timestamp(claims.iat, 0)
            .ok_or_else(|| TokenError::Invalid("iat out of range".to_string()))?;
        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
            .ok_or_else(|| TokenError::Invalid("exp out of range".to_string()))?;

        Ok(Identity {
            user_id: claims.uid,
            role: claims.role,
            issued_at,
            expires_at,
        })
    }
}
