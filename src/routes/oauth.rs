use actix_web::{
    cookie::{time::Duration as CookieDuration, Cookie, SameSite},
    get,
    http::header,
    web, HttpRequest, HttpResponse, Responder,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::{AuthResponse, SessionAuthenticator},
    error::AppError,
    models::{AuthProvider, UserAlias},
    state::AppState,
};

/// Cookie holding the `state` handed to the provider; compared on callback.
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

fn state_cookie(value: String) -> Cookie<'static> {
    Cookie::build(OAUTH_STATE_COOKIE, value)
        .path("/auth")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::minutes(10))
        .finish()
}

/// Redirects to the provider's consent page.
#[get("/{provider}/login")]
pub async fn oauth_login(
    state: web::Data<AppState>,
    provider: web::Path<String>,
) -> Result<impl Responder, AppError> {
    let provider = state.identity.resolve(&provider)?;
    let csrf_state = Uuid::new_v4().simple().to_string();
    let location = provider.authorize_url(&csrf_state)?;

    Ok(HttpResponse::TemporaryRedirect()
        .insert_header((header::LOCATION, location))
        .cookie(state_cookie(csrf_state))
        .finish())
}

/// Completes a social sign-in: finds or creates the account and opens a session.
#[get("/{provider}/callback")]
pub async fn oauth_callback(
    req: HttpRequest,
    state: web::Data<AppState>,
    sessions: web::Data<SessionAuthenticator>,
    provider: web::Path<String>,
    query: web::Query<CallbackQuery>,
) -> Result<impl Responder, AppError> {
    let provider = state.identity.resolve(&provider)?;
    let query = query.into_inner();

    let expected = req.cookie(OAUTH_STATE_COOKIE);
    match (expected, query.state.as_deref()) {
        (Some(cookie), Some(returned)) if !returned.is_empty() && cookie.value() == returned => {}
        _ => return Err(AppError::BadRequest("invalid_state".into())),
    }

    let code = query
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::BadRequest("missing_code".into()))?;

    let profile = provider.exchange(&code).await?;
    if profile.provider == AuthProvider::Google && !profile.email_verified {
        return Err(AppError::Forbidden("email_not_verified".into()));
    }

    let alias = UserAlias::provider(profile.provider, profile.subject.clone());
    let user = match state.users.get(alias).await? {
        Some(user) => state.users.record_login(user).await,
        None => state.users.create(profile.into_new_user()).await?,
    };

    let token = sessions.issue(user.id)?;

    let mut expired = state_cookie(String::new());
    expired.make_removal();
    Ok(HttpResponse::Ok()
        .cookie(expired)
        .json(AuthResponse::new(token, (*user).clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::oauth::OAuthClientConfig;
    use crate::auth::IdentityProviders;
    use crate::cache::EntityCache;
    use crate::store::MemoryStore;
    use actix_web::{http::StatusCode, test, App};
    use std::sync::Arc;
    use std::time::Duration;

    fn state() -> web::Data<AppState> {
        let store = Arc::new(MemoryStore::new());
        let identity = IdentityProviders::from_config(
            None,
            Some(OAuthClientConfig {
                client_id: "gh-client".into(),
                client_secret: "gh-secret".into(),
                redirect_url: "http://localhost:8080/auth/github/callback".into(),
            }),
        );
        web::Data::new(AppState::new(
            store.clone(),
            store,
            Arc::new(EntityCache::new(Duration::from_secs(300))),
            Duration::from_secs(5),
            identity,
        ))
    }

    #[actix_rt::test]
    async fn test_login_redirects_with_state_cookie() {
        let app = test::init_service(
            App::new()
                .app_data(state())
                .service(web::scope("/auth").service(oauth_login)),
        )
        .await;

        let req = test::TestRequest::get().uri("/auth/github/login").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);

        let cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() == OAUTH_STATE_COOKIE)
            .expect("state cookie");
        let location = resp.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.starts_with("https://github.com/login/oauth/authorize?"));
        assert!(location.contains(&format!("state={}", cookie.value())));
        assert_eq!(cookie.http_only(), Some(true));
    }

    #[actix_rt::test]
    async fn test_unconfigured_provider_is_unknown() {
        let app = test::init_service(
            App::new()
                .app_data(state())
                .service(web::scope("/auth").service(oauth_login)),
        )
        .await;

        for uri in ["/auth/google/login", "/auth/local/login", "/auth/myspace/login"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{}", uri);
        }
    }

    #[actix_rt::test]
    async fn test_callback_rejects_mismatched_state() {
        let app = test::init_service(
            App::new()
                .app_data(state())
                .app_data(web::Data::new(SessionAuthenticator::new(b"oauth-secret")))
                .service(web::scope("/auth").service(oauth_callback)),
        )
        .await;

        let cases = [
            (None, "/auth/github/callback?code=abc&state=s1"),
            (Some("s2"), "/auth/github/callback?code=abc&state=s1"),
            (Some("s1"), "/auth/github/callback?code=abc"),
        ];
        for (cookie, uri) in cases {
            let mut req = test::TestRequest::get().uri(uri);
            if let Some(value) = cookie {
                req = req.cookie(Cookie::new(OAUTH_STATE_COOKIE, value));
            }
            let resp = test::call_service(&app, req.to_request()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", uri);
            let body: serde_json::Value = test::read_body_json(resp).await;
            assert_eq!(body["error"], "invalid_state");
        }

        let req = test::TestRequest::get()
            .uri("/auth/github/callback?state=s1")
            .cookie(Cookie::new(OAUTH_STATE_COOKIE, "s1"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "missing_code");
    }
}
