use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use serde_json::json;
use std::time::Duration;

use crate::state::AppState;

/// Upper bound on the store round-trip made by `/health`.
pub const PING_DEADLINE: Duration = Duration::from_secs(1);

/// Readiness probe. 200 while the store answers, 503 otherwise.
/// Public, but still subject to admission control.
#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> impl Responder {
    match state.users.ping(PING_DEADLINE).await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": "ok",
            "timestamp": Utc::now()
        })),
        Err(e) => {
            log::warn!("health check failed: {}", e);
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unhealthy",
                "timestamp": Utc::now()
            }))
        }
    }
}

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({ "message": "Hello from taskgate" }))
}
