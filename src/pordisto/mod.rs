use crate::cli::globals::GlobalArgs;
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::{Extension, MatchedPath},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa::OpenApi;

pub mod broadcast;
pub mod credentials;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod rate_limit;
pub mod session;
pub mod state;

use handlers::{health, login, logout, register, session as session_query};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login::login,
        handlers::register::register,
        handlers::logout::logout,
        handlers::session::session,
        broadcast::events
    ),
    components(
        schemas(
            handlers::types::LoginRequest,
            handlers::types::RegisterRequest,
            handlers::types::SessionResponse
        )
    ),
    tags(
        (name = "auth", description = "Session lifecycle and access control API"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Interval for the background pass dropping dead session records; reads
/// already treat expired records as absent, this only bounds memory.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: String,
    config: state::AuthConfig,
    globals: &GlobalArgs,
) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let auth_state = Arc::new(state::AuthState::new(
        config,
        globals.auth_secret.clone(),
        Arc::new(rate_limit::FixedWindowLimiter::default()),
    ));

    spawn_expiry_sweeper(auth_state.clone());

    let origin = base_origin(auth_state.config().base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(origin))
        .allow_credentials(true);

    let app = Router::new()
        .route("/", get(|| async { "pordisto" }))
        .route("/health", get(health))
        // Page shells; the real UI is served elsewhere, the guard only
        // needs route targets to classify.
        .route("/login", get(|| async { "Sign in" }))
        .route("/register", get(|| async { "Create an account" }))
        .route("/dashboard", get(|| async { "Dashboard" }))
        .route("/v1/auth/login", post(login))
        .route("/v1/auth/register", post(register))
        .route("/v1/auth/logout", post(logout))
        .route("/v1/auth/session", get(session_query))
        .route("/v1/auth/events", get(broadcast::events))
        .route("/v1/openapi.json", get(|| async { axum::Json(openapi()) }))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(auth_state.clone()))
                .layer(Extension(pool.clone()))
                // The guard must run after the extensions are in place and
                // before any protected handler.
                .layer(middleware::from_fn(guard::route_guard)),
        );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn spawn_expiry_sweeper(auth_state: Arc<state::AuthState>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            auth_state.sessions().sweep(session::unix_now()).await;
        }
    });
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn base_origin(base_url: &str) -> Result<HeaderValue> {
    let parsed =
        Url::parse(base_url).with_context(|| format!("Invalid base URL: {base_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Base URL must include a valid host: {base_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build origin header")
}
