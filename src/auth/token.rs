use crate::clock::{Clock, SystemClock};
use crate::error::AppError;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Lifetime of every issued credential.
pub const SESSION_TTL_SECS: i64 = 24 * 60 * 60;

/// Represents the claims encoded within a session token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject of the token: the user's id.
    pub sub: i64,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
    /// Expiration, seconds since epoch.
    pub exp: i64,
}

/// Why a credential was refused. Only ever logged; every kind maps to the same
/// `invalid_token` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    Malformed,
    BadSignature,
    Expired,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionError::Malformed => write!(f, "malformed credential"),
            SessionError::BadSignature => write!(f, "credential signature mismatch"),
            SessionError::Expired => write!(f, "credential expired"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<SessionError> for AppError {
    fn from(_: SessionError) -> AppError {
        AppError::Unauthorized("invalid_token".into())
    }
}

/// Issues and validates stateless session credentials (HS256 JWTs).
///
/// Nothing is stored server-side: a credential is valid exactly when its signature
/// matches the process secret and its expiry lies in the future. There is no revocation.
pub struct SessionAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
    clock: Arc<dyn Clock>,
}

impl SessionAuthenticator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // expiry is checked against our own clock in `validate`
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl_secs: SESSION_TTL_SECS,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Overrides the 24 hour credential lifetime.
    pub fn with_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        self
    }

    /// Generates a credential for `subject_id`, valid for the configured lifetime from now.
    ///
    /// Returns `AppError::InternalServerError` if encoding fails.
    pub fn issue(&self, subject_id: i64) -> Result<String, AppError> {
        let issued_at = self.clock.utc_now().timestamp();
        let claims = Claims {
            sub: subject_id,
            iat: issued_at,
            exp: issued_at.saturating_add(self.ttl_secs),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
    }

    /// Verifies `token` and returns the subject it was issued for.
    ///
    /// A credential is expired from the second its `exp` is reached.
    pub fn validate(&self, token: &str) -> Result<i64, SessionError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => SessionError::BadSignature,
                ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Malformed,
            })?;

        if self.clock.utc_now().timestamp() >= claims.exp {
            return Err(SessionError::Expired);
        }
        Ok(claims.sub)
    }
}

impl fmt::Debug for SessionAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionAuthenticator")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}
