//! Queue affiliations and facility categories

use axum::{
    extract::{Path, Query, State},
    Json,
};
use hedwig_common::db::facility::{
    search_affiliation, search_category, sync_facility_category, sync_queue_affiliation,
};
use hedwig_common::types::{Affiliation, Category};
use hedwig_common::{ResultCollection, SyncCounts};
use serde::Deserialize;
use tracing::info;

use super::{ApiResult, SyncRequest};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HiddenQuery {
    /// Restrict to hidden (true) or visible (false) entries
    pub hidden: Option<bool>,
}

/// GET /api/queue/:id/affiliations
pub async fn get_affiliations(
    State(state): State<AppState>,
    Path(queue_id): Path<i64>,
    Query(query): Query<HiddenQuery>,
) -> ApiResult<Json<ResultCollection<Affiliation>>> {
    let affiliations = search_affiliation(&state.db, queue_id, query.hidden, false).await?;
    Ok(Json(affiliations))
}

/// PUT /api/queue/:id/affiliations
pub async fn put_affiliations(
    State(state): State<AppState>,
    Path(queue_id): Path<i64>,
    Json(request): Json<SyncRequest<Affiliation>>,
) -> ApiResult<Json<SyncCounts>> {
    let records = request.into_collection(|r| r.queue_id = queue_id);
    let counts = sync_queue_affiliation(&state.db, queue_id, &records).await?;

    info!(
        "Queue {} affiliations: {} inserted, {} updated, {} deleted",
        queue_id, counts.inserted, counts.updated, counts.deleted
    );

    Ok(Json(counts))
}

/// GET /api/facility/:id/categories
pub async fn get_categories(
    State(state): State<AppState>,
    Path(facility_id): Path<i64>,
    Query(query): Query<HiddenQuery>,
) -> ApiResult<Json<ResultCollection<Category>>> {
    let categories = search_category(&state.db, facility_id, query.hidden).await?;
    Ok(Json(categories))
}

/// PUT /api/facility/:id/categories
pub async fn put_categories(
    State(state): State<AppState>,
    Path(facility_id): Path<i64>,
    Json(request): Json<SyncRequest<Category>>,
) -> ApiResult<Json<SyncCounts>> {
    let records = request.into_collection(|r| r.facility_id = facility_id);
    let counts = sync_facility_category(&state.db, facility_id, &records).await?;

    info!(
        "Facility {} categories: {} inserted, {} updated, {} deleted",
        facility_id, counts.inserted, counts.updated, counts.deleted
    );

    Ok(Json(counts))
}
