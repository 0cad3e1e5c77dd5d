use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use super::UnknownVariant;

/// Where an account's identity comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    /// Email and password registered with this service.
    Local,
    Google,
    Github,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Local => "local",
            AuthProvider::Google => "google",
            AuthProvider::Github => "github",
        }
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthProvider {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(AuthProvider::Local),
            "google" => Ok(AuthProvider::Google),
            "github" => Ok(AuthProvider::Github),
            other => Err(UnknownVariant {
                kind: "auth provider",
                value: other.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for AuthProvider {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A user account as stored and as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub age: i32,
    /// bcrypt hash; `None` for accounts created through a social provider.
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub avatar_url: Option<String>,
    #[sqlx(try_from = "String")]
    pub provider: AuthProvider,
    /// Provider-side subject. For local accounts this is the email.
    pub provider_user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_login: Option<DateTime<Utc>>,
}

/// Fields needed to create a user; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub age: i32,
    pub password_hash: Option<String>,
    pub avatar_url: Option<String>,
    pub provider: AuthProvider,
    pub provider_user_id: String,
}

impl NewUser {
    pub fn local(email: String, full_name: String, age: i32, password_hash: String) -> Self {
        Self {
            provider_user_id: email.clone(),
            email,
            full_name,
            age,
            password_hash: Some(password_hash),
            avatar_url: None,
            provider: AuthProvider::Local,
        }
    }
}

/// One of the lookup keys a user can be found under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserAlias {
    Id(i64),
    Email(String),
    Provider {
        provider: AuthProvider,
        subject: String,
    },
}

impl UserAlias {
    pub fn provider(provider: AuthProvider, subject: impl Into<String>) -> Self {
        UserAlias::Provider {
            provider,
            subject: subject.into(),
        }
    }

    /// Every alias `user` is reachable under.
    pub fn all_of(user: &User) -> [UserAlias; 3] {
        [
            UserAlias::Id(user.id),
            UserAlias::Email(user.email.clone()),
            UserAlias::provider(user.provider, user.provider_user_id.clone()),
        ]
    }
}
