//! api-server — HTTP front end for the user directory.
//!
//! Serves two surfaces over the same `UserService`:
//! - JSON API under `/api/users` (list/get/create/update/delete).
//! - Server-rendered HTML UI under `/users` with search, details, create,
//!   edit and delete-confirmation pages.
//!
//! Storage is in-memory or SQLite (default, via the `sqlite` feature), opened
//! once at startup and shared by every request; each request works in its own
//! unit of work.
//!
//! Run:
//! ```bash
//! # pretty logs (default); PORT optional
//! cargo run -p api-server
//!
//! # ephemeral storage, JSON logs
//! STORAGE_PROVIDER=memory LOG_FORMAT=json cargo run -p api-server
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.
//!

mod api;
mod config;
mod store;
mod ui;

use std::net::SocketAddr;

use axum::http::HeaderValue;
use axum::{routing::get, Router};
use domain::service::UserService;
use domain::{CoreError, Outcome, UserInput, UserStore};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use store::{AnyRepo, AnyStore};

#[derive(Clone)]
pub(crate) struct AppState {
    store: AnyStore,
}

impl AppState {
    /// Fresh service over a new unit of work.
    pub(crate) fn service(&self) -> UserService<AnyRepo> {
        UserService::new(self.store.open())
    }
}

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);
    cfg.warn_if_ephemeral();

    let store = match build_store(&cfg) {
        Ok(s) => s,
        Err(e) => {
            error!(err = %e, "failed to open user store");
            std::process::exit(1);
        }
    };
    if cfg.seed_sample_user {
        if let Err(e) = seed_sample_user(&store) {
            error!(err = %e, "failed to seed sample user");
            std::process::exit(1);
        }
    }
    let state = AppState { store };

    // Request ID header name
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");

    let mut app = router(state)
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid));

    // CORS - already validated in Config::from_env()
    let cors = if cfg.cors_allow_origin == HeaderValue::from_static("*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([cfg.cors_allow_origin.clone()]))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    };
    app = app.layer(cors);

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, err = %e, "failed to bind");
            std::process::exit(1);
        }
    };
    info!(%addr, "api-server listening");
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(err = %e, "server error");
        std::process::exit(1);
    }
    // The router, and with it the last store handle, is dropped by now.
    info!("api-server stopped");
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ui::root))
        .route("/users", get(ui::index))
        .route("/users/new", get(ui::new_form).post(ui::create))
        .route("/users/:id", get(ui::details))
        .route("/users/:id/edit", get(ui::edit_form).post(ui::update))
        .route(
            "/users/:id/delete",
            get(ui::delete_confirm).post(ui::delete),
        )
        .route("/api/users", get(api::list_users).post(api::create_user))
        .route(
            "/api/users/:id",
            get(api::get_user)
                .put(api::update_user)
                .delete(api::delete_user),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(err = %e, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

// Construct the user store based on config and feature flags.
fn build_store(cfg: &config::Config) -> Result<AnyStore, CoreError> {
    let store = match cfg.storage_provider {
        config::StorageProvider::Memory => AnyStore::memory(),
        #[cfg(feature = "sqlite")]
        config::StorageProvider::Sqlite => AnyStore::sqlite(&cfg.db_path)?,
        #[cfg(not(feature = "sqlite"))]
        config::StorageProvider::Sqlite => {
            return Err(CoreError::Repository(
                "STORAGE_PROVIDER=sqlite but api-server was built without the `sqlite` feature"
                    .into(),
            ))
        }
    };
    info!(kind = store.kind(), "user store ready");
    Ok(store)
}

/// Insert the sample user when the store is empty. Returns whether it did.
fn seed_sample_user<S: UserStore>(store: &S) -> Result<bool, CoreError> {
    if store.count()? > 0 {
        return Ok(false);
    }
    let mut svc = UserService::new(store.open());
    let sample = UserInput::new(
        "Test User",
        "test@example.com",
        "+10000000000",
        "Sample address",
    );
    match svc.create(sample)? {
        Outcome::Done(user) => {
            info!(id = %user.id, "seeded sample user");
            Ok(true)
        }
        // Another instance seeded concurrently.
        Outcome::Declined(_) => Ok(false),
    }
}
