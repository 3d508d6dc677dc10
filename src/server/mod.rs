//! HTTP surface of the gallery.
//!
//! Handlers receive an [`AppState`] carrying the catalog, the upload gate
//! and the session guard; there is no process-wide state. Sessions live in
//! an in-memory `tower-sessions` store, so restarting the server logs the
//! admin out.

pub mod error;
pub mod pages;
pub mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};
use tracing::{error, info, warn};

use crate::auth::{AdminCredentials, SessionGuard};
use crate::catalog::{self, CatalogService, DEMO_PHOTOS};
use crate::config::Config;
use crate::upload::UploadGate;

/// Multipart framing allowance on top of the upload ceiling.
const BODY_LIMIT_SLACK: u64 = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub gate: Arc<UploadGate>,
    pub guard: Arc<SessionGuard>,
    pub static_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub session_idle_minutes: i64,
}

impl AppState {
    pub fn new(config: &Config, catalog: CatalogService) -> Result<Self> {
        let credentials = AdminCredentials::from_config(&config.admin)
            .context("Invalid [admin] configuration")?;

        Ok(Self {
            catalog: Arc::new(catalog),
            gate: Arc::new(UploadGate::from_config(config)),
            guard: Arc::new(SessionGuard::new(credentials)),
            static_dir: config.server.static_dir.clone(),
            templates_dir: config.server.templates_dir.clone(),
            session_idle_minutes: config.server.session_idle_minutes,
        })
    }
}

pub fn router(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            state.session_idle_minutes,
        )));

    let body_limit = usize::try_from(state.gate.max_bytes().saturating_add(BODY_LIMIT_SLACK))
        .unwrap_or(usize::MAX);

    let admin = Router::new()
        .route("/admin", get(routes::admin_panel))
        .route("/admin/upload", post(routes::upload_photo))
        .route("/admin/delete/{id}", post(routes::delete_photo))
        .route("/admin/edit/{id}", post(routes::edit_caption))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            routes::require_admin,
        ))
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .route("/", get(routes::index_page))
        .route("/atre-akihabara/", get(routes::atre_page))
        .route("/yodobashi/", get(routes::yodobashi_page))
        .route("/api/photos", get(routes::list_photos))
        .route("/api/photos/{id}", get(routes::get_photo))
        .route("/health", get(routes::health))
        .route("/login", get(routes::login_form).post(routes::login))
        .route("/logout", get(routes::logout))
        .merge(admin)
        .nest_service("/static", ServeDir::new(&state.static_dir))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the configured catalog and serve until Ctrl+C or SIGTERM.
pub async fn serve(config: Config) -> Result<()> {
    info!("Initializing state...");

    let store = catalog::open_store(&config.catalog)
        .with_context(|| format!("Failed to open {:?} catalog store", config.catalog.backend))?;
    let catalog = CatalogService::new(store, &config.server.static_dir);
    info!(store = %catalog.store_description(), "Catalog store opened");

    if config.catalog.seed_demo_photos {
        if let Err(e) = catalog.seed_if_empty(DEMO_PHOTOS) {
            warn!(error = %e, "Failed to seed demo photos");
        }
    }

    let state = AppState::new(&config, catalog)?;
    let app = router(state);

    let address = config.server.bind;
    info!("Binding to {address}");

    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
