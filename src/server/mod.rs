//! HTTP surface over the pipeline and the record store.

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

pub use error::ApiError;

use crate::metrics::metrics_handler;
use crate::pipeline::CompliancePipeline;
use crate::storage::ComplianceRepository;

/// State shared by every handler.
pub struct AppState {
    pub pipeline: CompliancePipeline,
}

impl AppState {
    pub fn new(pipeline: CompliancePipeline) -> Self {
        Self { pipeline }
    }

    pub fn repository(&self) -> &ComplianceRepository {
        self.pipeline.repository()
    }
}

/// CORS for a single browser origin. An unparseable origin allows none.
fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(e) => {
            tracing::warn!(origin = %origin, error = %e, "Invalid CORS origin, cross-origin requests disabled");
            layer
        }
    }
}

pub fn build_router(state: Arc<AppState>, cors_origin: &str) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/metrics", get(metrics_handler))
        .route("/run-pipeline", post(routes::run_pipeline))
        .route(
            "/regulations",
            get(routes::list_regulations).post(routes::create_regulation),
        )
        .route("/regulations/{id}", get(routes::get_regulation))
        .route("/regulations/{id}/run", post(routes::run_stored_regulation))
        .route("/reg-intel/sources", get(routes::list_sources))
        .route("/impact/assess/{regulation_diff_id}", post(routes::assess_impact))
        .route("/impact/findings", get(routes::list_findings))
        .route("/planner/plan/{finding_id}", post(routes::plan_finding))
        .route("/planner/action-items", get(routes::list_action_items))
        .route("/planner/action-items/{id}", put(routes::update_action_item))
        .route("/report/generate", post(routes::generate_report))
        .layer(cors_layer(cors_origin))
        .with_state(state)
}

/// Binds `addr` and serves until the process is stopped.
pub async fn serve(state: Arc<AppState>, addr: &str, cors_origin: &str) -> std::io::Result<()> {
    let app = build_router(state, cors_origin);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Compliance API listening");
    axum::serve(listener, app).await
}
