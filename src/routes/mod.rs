pub mod auth;
pub mod health;
pub mod oauth;
pub mod tasks;

use actix_web::{error::JsonPayloadError, error::QueryPayloadError, web, HttpRequest, HttpResponse};

use crate::auth::AuthMiddleware;
use crate::error::AppError;

/// Routes mounted under `/api`. Everything in `/tasks` sits behind the session gate.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(auth::login)
            .service(auth::register),
    )
    .service(
        web::scope("/tasks")
            .wrap(AuthMiddleware)
            .service(tasks::get_tasks)
            .service(tasks::create_task)
            .service(tasks::get_task)
            .service(tasks::update_task)
            .service(tasks::delete_task),
    );
}

/// The whole route table: health, social sign-in and the `/api` scope. Anything else
/// answers 404 `not_found`.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .service(health::index)
        .service(health::health)
        .service(
            web::scope("/auth")
                .service(oauth::oauth_login)
                .service(oauth::oauth_callback),
        )
        .service(web::scope("/api").configure(config))
        .default_service(web::to(no_route));
}

async fn no_route() -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound("not_found".into()))
}

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    log::debug!("rejected request body: {}", err);
    AppError::BadRequest("invalid_request".into()).into()
}

fn query_error(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    log::debug!("rejected query string: {}", err);
    AppError::BadRequest("invalid_query".into()).into()
}
