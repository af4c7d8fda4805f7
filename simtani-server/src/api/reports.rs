//! Handlers for the dashboard and reports.
//!
//! Only accepted groups and their commodities are counted. The farmer
//! report is a plain listing and is not filtered.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use simtani_core::report::{CommodityReportEntry, DashboardStats, FarmerReportEntry, GroupDetail};

use super::auth::{authorize, ANY_ROLE, REPORT_READERS};
use super::error::ApiError;
use crate::AppState;

/// Handler: GET /api/laporan/dashboard
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DashboardStats>, ApiError> {
    authorize(&headers, ANY_ROLE)?;
    Ok(Json(state.registry.dashboard().await?))
}

/// Handler: GET /api/laporan/kelompok-tani
pub async fn group_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<GroupDetail>>, ApiError> {
    authorize(&headers, REPORT_READERS)?;
    Ok(Json(state.registry.group_report().await?))
}

/// Handler: GET /api/laporan/komoditas
pub async fn commodity_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<CommodityReportEntry>>, ApiError> {
    authorize(&headers, REPORT_READERS)?;
    Ok(Json(state.registry.commodity_report().await?))
}

/// Handler: GET /api/laporan/petani
pub async fn farmer_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<FarmerReportEntry>>, ApiError> {
    authorize(&headers, REPORT_READERS)?;
    Ok(Json(state.registry.farmer_report().await?))
}
