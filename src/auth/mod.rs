pub mod extractors;
pub mod middleware;
pub mod oauth;
pub mod password;
pub mod token;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::User;

pub use extractors::AuthenticatedUserId;
pub use middleware::AuthMiddleware;
pub use oauth::{IdentityProvider, IdentityProviders, OAuthProfile};
pub use password::{hash_password, verify_password};
pub use token::{Claims, SessionAuthenticator, SessionError};

lazy_static! {
    // Letters, marks, spaces, apostrophes, dots and hyphens
    static ref FULL_NAME_REGEX: regex::Regex = regex::Regex::new(r"^[\p{L}\p{M} .'-]+$").unwrap();
}

/// Payload of `POST /api/auth/login`.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Payload of `POST /api/auth/register`.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    /// At least 8 characters.
    #[validate(length(min = 8))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
    #[validate(
        length(min = 1, max = 100),
        regex(
            path = "FULL_NAME_REGEX",
            message = "Full name may only contain letters, spaces, apostrophes, dots or hyphens"
        )
    )]
    pub full_name: Option<String>,
    /// Accounts are limited to users aged 13 and over.
    #[validate(range(min = 13, max = 150))]
    pub age: i32,
}

/// Body returned by every endpoint that establishes a session.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
    /// Bearer token valid for 24 hours.
    pub token: String,
    pub user_id: i64,
    pub user: User,
}

impl AuthResponse {
    pub fn new(token: String, user: User) -> Self {
        Self {
            message: None,
            token,
            user_id: user.id,
            user,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
