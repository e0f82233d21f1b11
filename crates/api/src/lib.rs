//! `api` crate — HTTP façade over the in-process `Scheduler`.
//!
//! Implements exactly the facade contract: no workflow CRUD, no webhook
//! ingestion, no database. Exposes:
//!   GET  /api/v1/jobs
//!   GET  /api/v1/jobs/:name
//!   GET  /api/v1/jobs/:name/dag
//!   POST /api/v1/jobs/:name/run
//!   POST /api/v1/jobs/:name/toggle
//!   GET  /api/v1/events

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use engine::Scheduler;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use handlers::AppState;

pub async fn serve(bind: &str, scheduler: Arc<Scheduler>) -> Result<(), std::io::Error> {
    let shutdown_scheduler = Arc::clone(&scheduler);
    let state = AppState { scheduler };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_router = Router::new()
        .route("/jobs", get(handlers::jobs::list))
        .route("/jobs/:name", get(handlers::jobs::get))
        .route("/jobs/:name/dag", get(handlers::jobs::get_dag))
        .route("/jobs/:name/run", post(handlers::runs::submit_run))
        .route("/jobs/:name/toggle", post(handlers::runs::toggle_active))
        .route("/events", get(handlers::events::subscribe_events));

    let app = Router::new()
        .nest("/api/v1", api_router)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal, draining in-flight job runs");
            shutdown_scheduler.shutdown().await;
        }
    }

    Ok(())
}
