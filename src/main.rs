use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;

use taskgate::{
    admission::{AdmissionController, RateLimitMiddleware},
    auth::{IdentityProviders, SessionAuthenticator},
    cache::EntityCache,
    config::Config,
    housekeeping, routes,
    state::AppState,
    store::PgStore,
};

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|e| startup_error("invalid configuration", e))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(config.store_timeout)
        .connect(&config.database_url)
        .await
        .map_err(|e| startup_error("failed to connect to database", e))?;
    sqlx::migrate!()
        .run(&pool)
        .await
        .map_err(|e| startup_error("failed to run migrations", e))?;

    let store = Arc::new(PgStore::new(pool));
    let cache = Arc::new(EntityCache::new(config.cache_ttl));
    let admission = Arc::new(AdmissionController::new(
        config.rate_limit_burst,
        config.rate_limit_per_second,
    ));
    let identity = IdentityProviders::from_config(config.google.clone(), config.github.clone());
    if identity.is_empty() {
        log::info!("no social sign-in providers configured");
    }

    let state = web::Data::new(AppState::new(
        store.clone(),
        store,
        Arc::clone(&cache),
        config.store_timeout,
        identity,
    ));
    let sessions = web::Data::new(SessionAuthenticator::new(config.jwt_secret.as_bytes()));

    housekeeping::spawn(
        cache,
        Arc::clone(&admission),
        config.cache_sweep_interval,
        config.rate_limit_idle,
    );

    let trust_forwarded_for = config.trust_forwarded_for;
    log::info!("Starting taskgate server at {}", config.server_url());
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .app_data(sessions.clone())
            .wrap(
                RateLimitMiddleware::new(Arc::clone(&admission))
                    .trust_forwarded_for(trust_forwarded_for),
            )
            .wrap(cors)
            .wrap(Logger::default())
            .configure(routes::configure_app)
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
