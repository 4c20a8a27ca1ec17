use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use alcove_api::auth::{self, AppState, AppStateInner};
use alcove_api::messages;
use alcove_api::middleware::require_auth;
use alcove_api::users;

/// Everything the server reads from the environment, resolved once at
/// startup. Components receive what they need from here — nothing reads the
/// environment after this point.
struct Config {
    host: String,
    port: u16,
    db_path: String,
    jwt_secret: String,
    token_ttl_minutes: i64,
}

impl Config {
    fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: std::env::var("ALCOVE_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("ALCOVE_PORT").unwrap_or_else(|_| "8000".into()).parse()?,
            db_path: std::env::var("ALCOVE_DB_PATH").unwrap_or_else(|_| "alcove.db".into()),
            jwt_secret: std::env::var("ALCOVE_JWT_SECRET")
                .unwrap_or_else(|_| "dev-secret-change-me".into()),
            token_ttl_minutes: std::env::var("ALCOVE_TOKEN_TTL_MINUTES")
                .unwrap_or_else(|_| "30".into())
                .parse()?,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alcove=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = alcove_db::Database::open(&PathBuf::from(&config.db_path))?;

    // Shared state
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        token_ttl_minutes: config.token_ttl_minutes,
    });

    // Routes
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/lookup/", post(users::lookup_friend_id))
        .route("/friends", get(users::get_friends))
        .route("/friends", post(users::add_friend))
        .route("/messages/", get(messages::get_conversations))
        .route("/messages/{friend_id}", get(messages::get_conversation))
        .route("/messages/{friend_id}", post(messages::send_message))
        .route("/messages/{friend_id}/file/{file_id}", get(messages::receive_file))
        .route("/messages/{friend_id}/file/{file_id}", post(messages::send_file))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_auth))
        .with_state(app_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Alcove server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
