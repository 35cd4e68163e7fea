//! HTTP API
//!
//! axum router over the conductor. All responses are JSON, including errors.
//!
//! # Endpoints
//!
//! - GET / and GET /health - liveness
//! - POST /execute - run (or queue) a free-text command
//! - GET /tasks, PATCH /tasks/:id - list tasks, toggle done
//! - GET /projects, PATCH /projects/:id - list projects, advance status
//! - POST /api/ingest - merge life metrics into the context snapshot
//! - GET /api/status - score the context snapshot
//! - POST /api/execute - run one action directly
//! - GET /api/queue - pending and dead-lettered commands
//! - GET /api/memory - recent memory records

pub mod error;
pub mod routes;

pub use error::ApiError;
pub use routes::degraded_execution;

use crate::conductor::Conductor;
use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, patch, post};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub conductor: Arc<Conductor>,
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers(Any);

    if allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}

pub fn router(conductor: Arc<Conductor>, allowed_origins: &[String]) -> Router {
    let state = AppState { conductor };

    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/execute", post(routes::execute))
        .route("/tasks", get(routes::list_tasks))
        .route("/tasks/:id", patch(routes::toggle_task))
        .route("/projects", get(routes::list_projects))
        .route("/projects/:id", patch(routes::toggle_project))
        .route("/api/ingest", post(routes::ingest))
        .route("/api/status", get(routes::status))
        .route("/api/execute", post(routes::execute_action))
        .route("/api/queue", get(routes::queue))
        .route("/api/memory", get(routes::memory))
        .fallback(routes::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves
pub async fn serve<F>(
    bind: &str,
    conductor: Arc<Conductor>,
    allowed_origins: &[String],
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    let addr = listener.local_addr().context("Failed to read local address")?;

    info!("LifeOS API listening on http://{}", addr);

    axum::serve(listener, router(conductor, allowed_origins))
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("API server shutting down gracefully");
        })
        .await
        .context("API server error")?;

    Ok(())
}
