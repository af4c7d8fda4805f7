//! Handlers for districts, farmers, farmer groups and commodities.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use simtani_core::input::{
    CommodityPatch, FarmerPatch, GroupPatch, NewCommodity, NewDistrict, NewFarmer, NewGroup,
};
use simtani_core::report::GroupDetail;
use simtani_core::{Commodity, CommodityId, District, Farmer, FarmerGroup, FarmerId, GroupId};

use super::auth::{authorize, ADMIN_ONLY, ANY_ROLE, EDITORS};
use super::error::ApiError;
use crate::events::GroupEvent;
use crate::AppState;

/// Default number of timeline events per request.
const DEFAULT_EVENT_LIMIT: usize = 50;

type ApiResult<T> = Result<T, ApiError>;
type Body<T> = Result<Json<T>, JsonRejection>;

// =============================================================================
// Districts
// =============================================================================

/// Handler: GET /api/kecamatan
pub async fn list_districts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<District>>> {
    authorize(&headers, ANY_ROLE)?;
    Ok(Json(state.registry.list_districts().await?))
}

/// Handler: POST /api/kecamatan
pub async fn create_district(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Body<NewDistrict>,
) -> ApiResult<(StatusCode, Json<District>)> {
    authorize(&headers, ADMIN_ONLY)?;
    let Json(input) = body?;
    let district = state.registry.create_district(input).await?;
    Ok((StatusCode::CREATED, Json(district)))
}

// =============================================================================
// Farmers
// =============================================================================

/// Handler: GET /api/petani
pub async fn list_farmers(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Farmer>>> {
    authorize(&headers, ANY_ROLE)?;
    Ok(Json(state.registry.list_farmers().await?))
}

/// Handler: GET /api/petani/:id
pub async fn get_farmer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<Farmer>> {
    authorize(&headers, ANY_ROLE)?;
    Ok(Json(state.registry.get_farmer(FarmerId::from(id)).await?))
}

/// Handler: POST /api/petani
pub async fn create_farmer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Body<NewFarmer>,
) -> ApiResult<(StatusCode, Json<Farmer>)> {
    authorize(&headers, EDITORS)?;
    let Json(input) = body?;
    let farmer = state.registry.create_farmer(input).await?;
    Ok((StatusCode::CREATED, Json(farmer)))
}

/// Handler: PUT /api/petani/:id
pub async fn update_farmer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Body<FarmerPatch>,
) -> ApiResult<Json<Farmer>> {
    authorize(&headers, EDITORS)?;
    let Json(patch) = body?;
    Ok(Json(
        state
            .registry
            .update_farmer(FarmerId::from(id), patch)
            .await?,
    ))
}

/// Handler: DELETE /api/petani/:id
pub async fn delete_farmer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    authorize(&headers, ADMIN_ONLY)?;
    state.registry.delete_farmer(FarmerId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Farmer groups
// =============================================================================

/// Handler: GET /api/kelompok-tani
///
/// Lists every group whatever its verification status.
pub async fn list_groups(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<FarmerGroup>>> {
    authorize(&headers, ANY_ROLE)?;
    Ok(Json(state.registry.list_groups().await?))
}

/// Handler: GET /api/kelompok-tani/:id
pub async fn get_group(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<GroupDetail>> {
    authorize(&headers, ANY_ROLE)?;
    Ok(Json(state.registry.get_group(GroupId::from(id)).await?))
}

/// Handler: POST /api/kelompok-tani
pub async fn create_group(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Body<NewGroup>,
) -> ApiResult<(StatusCode, Json<FarmerGroup>)> {
    authorize(&headers, EDITORS)?;
    let Json(input) = body?;
    let group = state.registry.create_group(input).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// Handler: PUT /api/kelompok-tani/:id
pub async fn update_group(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Body<GroupPatch>,
) -> ApiResult<Json<FarmerGroup>> {
    authorize(&headers, EDITORS)?;
    let Json(patch) = body?;
    Ok(Json(
        state.registry.update_group(GroupId::from(id), patch).await?,
    ))
}

/// Handler: DELETE /api/kelompok-tani/:id
pub async fn delete_group(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    authorize(&headers, ADMIN_ONLY)?;
    state.registry.delete_group(GroupId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

/// Handler: GET /api/kelompok-tani/:id/events
pub async fn group_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Json<Vec<GroupEvent>>> {
    authorize(&headers, ADMIN_ONLY)?;
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    Ok(Json(
        state
            .registry
            .group_events(GroupId::from(id), limit)
            .await?,
    ))
}

// =============================================================================
// Commodities
// =============================================================================

/// Handler: GET /api/komoditas
pub async fn list_commodities(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Commodity>>> {
    authorize(&headers, ANY_ROLE)?;
    Ok(Json(state.registry.list_commodities().await?))
}

/// Handler: GET /api/komoditas/:id
pub async fn get_commodity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<Commodity>> {
    authorize(&headers, ANY_ROLE)?;
    Ok(Json(
        state.registry.get_commodity(CommodityId::from(id)).await?,
    ))
}

/// Handler: POST /api/komoditas
pub async fn create_commodity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Body<NewCommodity>,
) -> ApiResult<(StatusCode, Json<Commodity>)> {
    authorize(&headers, EDITORS)?;
    let Json(input) = body?;
    let commodity = state.registry.create_commodity(input).await?;
    Ok((StatusCode::CREATED, Json(commodity)))
}

/// Handler: PUT /api/komoditas/:id
pub async fn update_commodity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Body<CommodityPatch>,
) -> ApiResult<Json<Commodity>> {
    authorize(&headers, EDITORS)?;
    let Json(patch) = body?;
    Ok(Json(
        state
            .registry
            .update_commodity(CommodityId::from(id), patch)
            .await?,
    ))
}

/// Handler: DELETE /api/komoditas/:id
pub async fn delete_commodity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    authorize(&headers, ADMIN_ONLY)?;
    state.registry.delete_commodity(CommodityId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
