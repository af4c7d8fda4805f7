//! Handlers for the verification workflow.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use simtani_core::report::VerificationStats;
use simtani_core::{FarmerGroup, GroupId, VerifyCommand};

use super::auth::{authorize, ADMIN_ONLY};
use super::error::ApiError;
use crate::AppState;

/// Request body for deciding a group.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// `DITERIMA` or `DITOLAK`.
    pub status: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Handler: PUT /api/verifikasi/:id
pub async fn verify_group(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<FarmerGroup>, ApiError> {
    let actor = authorize(&headers, ADMIN_ONLY)?;
    let Json(request) = body?;

    // The decision is checked before the group is looked up.
    let command = VerifyCommand::parse(&request.status, request.note, actor.user_id)?;
    let group = state.registry.verify(GroupId::from(id), command).await?;
    Ok(Json(group))
}

/// Handler: GET /api/verifikasi/pending
pub async fn pending_groups(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<FarmerGroup>>, ApiError> {
    authorize(&headers, ADMIN_ONLY)?;
    Ok(Json(state.registry.pending_groups().await?))
}

/// Handler: GET /api/verifikasi/stats
pub async fn verification_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<VerificationStats>, ApiError> {
    authorize(&headers, ADMIN_ONLY)?;
    Ok(Json(state.registry.verification_stats().await?))
}
