//! Social sign-in through OAuth 2.0 authorization-code providers.
//!
//! Each provider knows how to build its consent URL and how to turn a callback `code`
//! into an [`OAuthProfile`]. The routes in [`crate::routes::oauth`] only talk to the
//! [`IdentityProvider`] trait, so tests can substitute a stub.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Url;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::AppError;
use crate::models::{AuthProvider, NewUser};

/// Credentials registered with a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

/// Identity asserted by a provider after a successful exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthProfile {
    pub provider: AuthProvider,
    /// Provider-side stable user id.
    pub subject: String,
    pub email: String,
    pub email_verified: bool,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

impl OAuthProfile {
    /// Account fields for a first sign-in. Social accounts carry no password or age.
    pub fn into_new_user(self) -> NewUser {
        NewUser {
            email: self.email,
            full_name: self.name.unwrap_or_default(),
            age: 0,
            password_hash: None,
            avatar_url: self.avatar_url,
            provider: self.provider,
            provider_user_id: self.subject,
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn kind(&self) -> AuthProvider;

    /// Consent page the user is redirected to, carrying `state` for CSRF protection.
    fn authorize_url(&self, state: &str) -> Result<String, AppError>;

    /// Trades an authorization code for the user's profile.
    async fn exchange(&self, code: &str) -> Result<OAuthProfile, AppError>;
}

struct Endpoints {
    authorize: &'static str,
    token: &'static str,
    userinfo: &'static str,
    scope: &'static str,
}

static GOOGLE: Endpoints = Endpoints {
    authorize: "https://accounts.google.com/o/oauth2/auth",
    token: "https://oauth2.googleapis.com/token",
    userinfo: "https://www.googleapis.com/oauth2/v3/userinfo",
    scope: "openid profile email",
};

static GITHUB: Endpoints = Endpoints {
    authorize: "https://github.com/login/oauth/authorize",
    token: "https://github.com/login/oauth/access_token",
    userinfo: "https://api.github.com/user",
    scope: "user:email",
};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: String,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
    picture: Option<String>,
}

impl From<GoogleUserInfo> for OAuthProfile {
    fn from(info: GoogleUserInfo) -> Self {
        OAuthProfile {
            provider: AuthProvider::Google,
            subject: info.sub,
            email: info.email,
            email_verified: info.email_verified,
            name: info.name,
            avatar_url: info.picture,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

impl From<GithubUser> for OAuthProfile {
    fn from(user: GithubUser) -> Self {
        // users with a private email get GitHub's noreply address
        let email = user
            .email
            .unwrap_or_else(|| format!("{}+{}@users.noreply.github.com", user.id, user.login));
        OAuthProfile {
            provider: AuthProvider::Github,
            subject: user.id.to_string(),
            email,
            email_verified: false,
            name: user.name.or(Some(user.login)),
            avatar_url: user.avatar_url,
        }
    }
}

/// Authorization-code client for one of the built-in providers.
pub struct OAuthClient {
    kind: AuthProvider,
    config: OAuthClientConfig,
    endpoints: &'static Endpoints,
    http: reqwest::Client,
}

impl OAuthClient {
    pub fn google(config: OAuthClientConfig) -> Self {
        Self::with_endpoints(AuthProvider::Google, config, &GOOGLE)
    }

    pub fn github(config: OAuthClientConfig) -> Self {
        Self::with_endpoints(AuthProvider::Github, config, &GITHUB)
    }

    fn with_endpoints(
        kind: AuthProvider,
        config: OAuthClientConfig,
        endpoints: &'static Endpoints,
    ) -> Self {
        Self {
            kind,
            config,
            endpoints,
            http: reqwest::Client::new(),
        }
    }

    async fn access_token(&self, code: &str) -> Result<String, AppError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_url.as_str()),
        ];
        let response = self
            .http
            .post(self.endpoints.token)
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            log::warn!("{} token exchange rejected with {}", self.kind, status);
            return Err(AppError::InternalServerError(format!(
                "token exchange failed: {}",
                status
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl IdentityProvider for OAuthClient {
    fn kind(&self) -> AuthProvider {
        self.kind
    }

    fn authorize_url(&self, state: &str) -> Result<String, AppError> {
        let url = Url::parse_with_params(
            self.endpoints.authorize,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", self.endpoints.scope),
                ("state", state),
                ("access_type", "offline"),
            ],
        )
        .map_err(|e| AppError::InternalServerError(format!("invalid authorize url: {}", e)))?;
        Ok(url.into())
    }

    async fn exchange(&self, code: &str) -> Result<OAuthProfile, AppError> {
        let access_token = self.access_token(code).await?;

        let response = self
            .http
            .get(self.endpoints.userinfo)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, concat!("taskgate/", env!("CARGO_PKG_VERSION")))
            .send()
            .await?
            .error_for_status()?;

        let profile: OAuthProfile = match self.kind {
            AuthProvider::Github => response.json::<GithubUser>().await?.into(),
            _ => response.json::<GoogleUserInfo>().await?.into(),
        };
        Ok(profile)
    }
}

impl fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClient")
            .field("kind", &self.kind)
            .field("client_id", &self.config.client_id)
            .finish()
    }
}

/// The configured social providers, looked up by the `{provider}` path segment.
#[derive(Clone, Default)]
pub struct IdentityProviders {
    providers: HashMap<AuthProvider, Arc<dyn IdentityProvider>>,
}

impl IdentityProviders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the built-in clients for every provider that has credentials.
    pub fn from_config(google: Option<OAuthClientConfig>, github: Option<OAuthClientConfig>) -> Self {
        let mut providers = Self::new();
        if let Some(config) = google {
            providers = providers.with(Arc::new(OAuthClient::google(config)));
        }
        if let Some(config) = github {
            providers = providers.with(Arc::new(OAuthClient::github(config)));
        }
        providers
    }

    pub fn with(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    /// Resolves a path segment. Local accounts never go through OAuth.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn IdentityProvider>, AppError> {
        name.parse::<AuthProvider>()
            .ok()
            .filter(|kind| *kind != AuthProvider::Local)
            .and_then(|kind| self.providers.get(&kind).cloned())
            .ok_or_else(|| AppError::NotFound("unknown_provider".into()))
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for IdentityProviders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.providers.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OAuthClientConfig {
        OAuthClientConfig {
            client_id: "client-123".into(),
            client_secret: "shh".into(),
            redirect_url: "http://localhost:8080/auth/google/callback".into(),
        }
    }

    #[test]
    fn test_authorize_url_carries_client_and_state() {
        let client = OAuthClient::google(config());
        let url = client.authorize_url("state-abc").unwrap();

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/auth?"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("state=state-abc"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fauth%2Fgoogle%2Fcallback"));
        assert!(!url.contains("shh"));
    }

    #[test]
    fn test_google_profile_keeps_verification_flag() {
        let info: GoogleUserInfo = serde_json::from_str(
            r#"{"sub":"1098","email":"ana@example.com","email_verified":true,"name":"Ana","picture":"https://img/a.png"}"#,
        )
        .unwrap();
        let profile = OAuthProfile::from(info);

        assert_eq!(profile.provider, AuthProvider::Google);
        assert_eq!(profile.subject, "1098");
        assert!(profile.email_verified);
        assert_eq!(profile.avatar_url.as_deref(), Some("https://img/a.png"));
    }

    #[test]
    fn test_github_profile_without_public_email() {
        let user: GithubUser =
            serde_json::from_str(r#"{"id":1234,"login":"octo","name":null,"email":null,"avatar_url":null}"#)
                .unwrap();
        let profile = OAuthProfile::from(user);

        assert_eq!(profile.subject, "1234");
        assert_eq!(profile.email, "1234+octo@users.noreply.github.com");
        assert_eq!(profile.name.as_deref(), Some("octo"));
    }

    #[test]
    fn test_new_user_from_profile() {
        let profile = OAuthProfile {
            provider: AuthProvider::Github,
            subject: "1234".into(),
            email: "octo@example.com".into(),
            email_verified: false,
            name: None,
            avatar_url: None,
        };
        let user = profile.into_new_user();

        assert_eq!(user.provider, AuthProvider::Github);
        assert_eq!(user.provider_user_id, "1234");
        assert!(user.password_hash.is_none());
        assert_eq!(user.full_name, "");
    }

    #[test]
    fn test_resolve_only_configured_providers() {
        let providers = IdentityProviders::from_config(Some(config()), None);

        assert!(providers.resolve("google").is_ok());
        for name in ["github", "local", "facebook"] {
            match providers.resolve(name) {
                Err(AppError::NotFound(code)) => assert_eq!(code, "unknown_provider"),
                other => panic!("expected unknown_provider for {}, got {:?}", name, other.map(|p| p.kind())),
            }
        }
    }
}
