#![allow(dead_code)]

use actix_http::Request;
use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    test, web, App,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use taskgate::{
    admission::{AdmissionController, RateLimitMiddleware},
    auth::{IdentityProvider, IdentityProviders, OAuthProfile, SessionAuthenticator},
    cache::EntityCache,
    clock::ManualClock,
    models::AuthProvider,
    routes,
    state::AppState,
    store::MemoryStore,
    AppError,
};

pub const SECRET: &[u8] = b"integration-secret";
pub const GOOD_CODE: &str = "good-code";

/// Identity provider that accepts [`GOOD_CODE`] and asserts a fixed profile.
pub struct StubProvider {
    pub profile: OAuthProfile,
}

#[async_trait]
impl IdentityProvider for StubProvider {
    fn kind(&self) -> AuthProvider {
        self.profile.provider
    }

    fn authorize_url(&self, state: &str) -> Result<String, AppError> {
        Ok(format!("https://provider.test/authorize?state={}", state))
    }

    async fn exchange(&self, code: &str) -> Result<OAuthProfile, AppError> {
        if code == GOOD_CODE {
            Ok(self.profile.clone())
        } else {
            Err(AppError::InternalServerError("token exchange failed".into()))
        }
    }
}

pub fn github_profile() -> OAuthProfile {
    OAuthProfile {
        provider: AuthProvider::Github,
        subject: "1234".into(),
        email: "octo@example.com".into(),
        email_verified: false,
        name: Some("Octo Cat".into()),
        avatar_url: None,
    }
}

pub fn unverified_google_profile() -> OAuthProfile {
    OAuthProfile {
        provider: AuthProvider::Google,
        subject: "g-555".into(),
        email: "unverified@example.com".into(),
        email_verified: false,
        name: None,
        avatar_url: None,
    }
}

/// Everything a test may want to poke at behind the running app.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<EntityCache>,
    pub admission: Arc<AdmissionController>,
    pub clock: Arc<ManualClock>,
    pub state: web::Data<AppState>,
    pub sessions: web::Data<SessionAuthenticator>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_burst(1_000)
    }

    /// Admission allows `burst` requests per client and refills slowly.
    pub fn with_burst(burst: u32) -> Self {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(EntityCache::new(Duration::from_secs(300)).with_clock(clock.clone()));
        let admission =
            Arc::new(AdmissionController::new(burst, 1.0).with_clock(clock.clone()));
        let identity = IdentityProviders::new()
            .with(Arc::new(StubProvider {
                profile: github_profile(),
            }))
            .with(Arc::new(StubProvider {
                profile: unverified_google_profile(),
            }));
        let state = web::Data::new(AppState::new(
            store.clone(),
            store.clone(),
            cache.clone(),
            Duration::from_secs(5),
            identity,
        ));
        let sessions =
            web::Data::new(SessionAuthenticator::new(SECRET).with_clock(clock.clone()));

        Self {
            store,
            cache,
            admission,
            clock,
            state,
            sessions,
        }
    }

    /// The full application as `main` assembles it, minus CORS and access logging.
    pub async fn app(
        &self,
    ) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error>
    {
        test::init_service(
            App::new()
                .app_data(self.state.clone())
                .app_data(self.sessions.clone())
                .wrap(RateLimitMiddleware::new(self.admission.clone()))
                .configure(routes::configure_app),
        )
        .await
    }
}

pub fn client_addr() -> SocketAddr {
    "203.0.113.7:50000".parse().unwrap()
}

pub fn get(uri: &str) -> test::TestRequest {
    test::TestRequest::get().uri(uri).peer_addr(client_addr())
}

pub fn post_json(uri: &str, body: &Value) -> test::TestRequest {
    test::TestRequest::post()
        .uri(uri)
        .peer_addr(client_addr())
        .set_json(body)
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

/// Registers a local account and returns `(user_id, token)`.
pub async fn register<S, B>(app: &S, email: &str, password: &str) -> (i64, String)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = post_json(
        "/api/auth/register",
        &json!({
            "email": email,
            "password": password,
            "confirm_password": password,
            "full_name": "Test User",
            "age": 30
        }),
    )
    .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    (
        body["user_id"].as_i64().unwrap(),
        body["token"].as_str().unwrap().to_string(),
    )
}

/// Sends `req` and returns the status and JSON body (`Null` for an empty body).
pub async fn send<S, B>(app: &S, req: Request) -> (actix_web::http::StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let bytes = test::read_body(resp).await;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}
