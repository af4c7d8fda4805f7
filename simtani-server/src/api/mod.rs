//! HTTP adapter over the registry service.
//!
//! Bodies are JSON with camelCase field names. Callers are identified by
//! gateway headers, see [`auth`].

pub mod auth;
pub mod error;
pub mod registry;
pub mod reports;
pub mod verification;


use std::sync::Arc;

use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::AppState;

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "simtani"
    }))
}

/// Build the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/kecamatan",
            get(registry::list_districts).post(registry::create_district),
        )
        .route(
            "/api/petani",
            get(registry::list_farmers).post(registry::create_farmer),
        )
        .route(
            "/api/petani/:id",
            get(registry::get_farmer)
                .put(registry::update_farmer)
                .delete(registry::delete_farmer),
        )
        .route(
            "/api/kelompok-tani",
            get(registry::list_groups).post(registry::create_group),
        )
        .route(
            "/api/kelompok-tani/:id",
            get(registry::get_group)
                .put(registry::update_group)
                .delete(registry::delete_group),
        )
        .route("/api/kelompok-tani/:id/events", get(registry::group_events))
        .route(
            "/api/komoditas",
            get(registry::list_commodities).post(registry::create_commodity),
        )
        .route(
            "/api/komoditas/:id",
            get(registry::get_commodity)
                .put(registry::update_commodity)
                .delete(registry::delete_commodity),
        )
        .route("/api/verifikasi/pending", get(verification::pending_groups))
        .route("/api/verifikasi/stats", get(verification::verification_stats))
        .route("/api/verifikasi/:id", put(verification::verify_group))
        .route("/api/laporan/dashboard", get(reports::dashboard))
        .route("/api/laporan/petani", get(reports::farmer_report))
        .route("/api/laporan/kelompok-tani", get(reports::group_report))
        .route("/api/laporan/komoditas", get(reports::commodity_report))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
