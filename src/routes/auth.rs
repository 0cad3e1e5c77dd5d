use crate::{
    auth::{
        password::{hash_password_blocking, verify_password_blocking},
        AuthResponse, LoginRequest, RegisterRequest, SessionAuthenticator,
    },
    error::AppError,
    models::{AuthProvider, NewUser, UserAlias},
    state::AppState,
};
use actix_web::{post, web, HttpResponse, Responder};
use validator::Validate;

/// Register a new user
///
/// Creates a local account and returns a session token for it.
#[post("/register")]
pub async fn register(
    state: web::Data<AppState>,
    sessions: web::Data<SessionAuthenticator>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    register_data.validate()?;
    let register_data = register_data.into_inner();

    let existing = state
        .users
        .get(UserAlias::Email(register_data.email.clone()))
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("user_exists".into()));
    }

    let password_hash = hash_password_blocking(register_data.password).await?;
    let user = state
        .users
        .create(NewUser::local(
            register_data.email,
            register_data.full_name.unwrap_or_default(),
            register_data.age,
            password_hash,
        ))
        .await?;

    let token = sessions.issue(user.id)?;

    Ok(HttpResponse::Created()
        .json(AuthResponse::new(token, (*user).clone()).with_message("register success")))
}

/// Login user
///
/// Checks a local account's password and returns a session token.
#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    sessions: web::Data<SessionAuthenticator>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    login_data.validate()?;
    let login_data = login_data.into_inner();

    let user = state
        .users
        .get(UserAlias::Email(login_data.email))
        .await?
        .ok_or_else(|| AppError::Unauthorized("invalid_credentials".into()))?;

    if user.provider != AuthProvider::Local {
        return Err(AppError::Unauthorized("use_oauth_login".into()));
    }
    let password_hash = user
        .password_hash
        .clone()
        .ok_or_else(|| AppError::Unauthorized("invalid_credentials".into()))?;
    if !verify_password_blocking(login_data.password, password_hash).await? {
        return Err(AppError::Unauthorized("invalid_credentials".into()));
    }

    let user = state.users.record_login(user).await;

    let token = sessions.issue(user.id)?;
    Ok(HttpResponse::Ok().json(AuthResponse::new(token, (*user).clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::IdentityProviders;
    use crate::cache::EntityCache;
    use crate::store::MemoryStore;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn app_data() -> (web::Data<AppState>, web::Data<SessionAuthenticator>) {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(
            store.clone(),
            store,
            Arc::new(EntityCache::new(Duration::from_secs(300))),
            Duration::from_secs(5),
            IdentityProviders::new(),
        );
        (
            web::Data::new(state),
            web::Data::new(SessionAuthenticator::new(b"route-secret")),
        )
    }

    #[actix_rt::test]
    async fn test_register_validation() {
        let (state, sessions) = app_data();
        let app = test::init_service(
            App::new()
                .app_data(state)
                .app_data(sessions)
                .service(register),
        )
        .await;

        let bad_payloads = [
            json!({
                "email": "invalid-email",
                "password": "password123",
                "confirm_password": "password123",
                "age": 30
            }),
            json!({
                "email": "test@example.com",
                "password": "short",
                "confirm_password": "short",
                "age": 30
            }),
            json!({
                "email": "test@example.com",
                "password": "password123",
                "confirm_password": "password321",
                "age": 30
            }),
            json!({
                "email": "test@example.com",
                "password": "password123",
                "confirm_password": "password123",
                "age": 10
            }),
        ];
        for payload in bad_payloads {
            let req = test::TestRequest::post()
                .uri("/register")
                .set_json(&payload)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "{}", payload);
        }
    }

    #[actix_rt::test]
    async fn test_login_validation() {
        let (state, sessions) = app_data();
        let app = test::init_service(
            App::new()
                .app_data(state)
                .app_data(sessions)
                .service(login),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/login")
            .set_json(json!({
                "email": "invalid-email",
                "password": "password123"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_client_error());

        let req = test::TestRequest::post()
            .uri("/login")
            .set_json(json!({
                "email": "nobody@example.com",
                "password": "password123"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "invalid_credentials");
    }
}
