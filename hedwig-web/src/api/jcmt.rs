//! JCMT observing time requests, allocations and availability

use axum::{
    extract::{Path, State},
    Json,
};
use hedwig_common::db::jcmt::{
    search_jcmt_allocation, search_jcmt_available, search_jcmt_request,
    sync_jcmt_call_available, sync_jcmt_proposal_allocation, sync_jcmt_proposal_request,
};
use hedwig_common::types::collection::{JcmtRequestTable, JcmtRequestTotal};
use hedwig_common::types::{JcmtAvailable, JcmtRequest};
use hedwig_common::{ResultCollection, SyncCounts};
use serde::Serialize;
use tracing::info;

use super::{ApiResult, SyncRequest};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct TimeRequestSummary {
    pub records: ResultCollection<JcmtRequest>,
    pub table: JcmtRequestTable,
    pub total: JcmtRequestTotal,
}

impl From<ResultCollection<JcmtRequest>> for TimeRequestSummary {
    fn from(records: ResultCollection<JcmtRequest>) -> Self {
        let table = records.to_table();
        let total = records.get_total();
        Self {
            records,
            table,
            total,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AvailableSummary {
    pub records: ResultCollection<JcmtAvailable>,
    pub total: JcmtRequestTotal,
}

/// GET /api/proposal/:id/jcmt/requests
pub async fn get_requests(
    State(state): State<AppState>,
    Path(proposal_id): Path<i64>,
) -> ApiResult<Json<TimeRequestSummary>> {
    let records = search_jcmt_request(&state.db, proposal_id).await?;
    Ok(Json(records.into()))
}

/// PUT /api/proposal/:id/jcmt/requests
pub async fn put_requests(
    State(state): State<AppState>,
    Path(proposal_id): Path<i64>,
    Json(request): Json<SyncRequest<JcmtRequest>>,
) -> ApiResult<Json<SyncCounts>> {
    let records = request.into_collection(|r| r.proposal_id = proposal_id);
    let counts = sync_jcmt_proposal_request(&state.db, proposal_id, &records).await?;

    info!(
        "Proposal {} JCMT requests: {} inserted, {} updated, {} deleted",
        proposal_id, counts.inserted, counts.updated, counts.deleted
    );

    Ok(Json(counts))
}

/// GET /api/proposal/:id/jcmt/allocations
pub async fn get_allocations(
    State(state): State<AppState>,
    Path(proposal_id): Path<i64>,
) -> ApiResult<Json<TimeRequestSummary>> {
    let records = search_jcmt_allocation(&state.db, proposal_id).await?;
    Ok(Json(records.into()))
}

/// PUT /api/proposal/:id/jcmt/allocations
pub async fn put_allocations(
    State(state): State<AppState>,
    Path(proposal_id): Path<i64>,
    Json(request): Json<SyncRequest<JcmtRequest>>,
) -> ApiResult<Json<SyncCounts>> {
    let records = request.into_collection(|r| r.proposal_id = proposal_id);
    let counts = sync_jcmt_proposal_allocation(&state.db, proposal_id, &records).await?;

    info!(
        "Proposal {} JCMT allocations: {} inserted, {} updated, {} deleted",
        proposal_id, counts.inserted, counts.updated, counts.deleted
    );

    Ok(Json(counts))
}

/// GET /api/call/:id/jcmt/available
pub async fn get_available(
    State(state): State<AppState>,
    Path(call_id): Path<i64>,
) -> ApiResult<Json<AvailableSummary>> {
    let records = search_jcmt_available(&state.db, call_id).await?;
    let total = records.get_total();

    Ok(Json(AvailableSummary { records, total }))
}

/// PUT /api/call/:id/jcmt/available
pub async fn put_available(
    State(state): State<AppState>,
    Path(call_id): Path<i64>,
    Json(request): Json<SyncRequest<JcmtAvailable>>,
) -> ApiResult<Json<SyncCounts>> {
    let records = request.into_collection(|r| r.call_id = call_id);
    let counts = sync_jcmt_call_available(&state.db, call_id, &records).await?;

    info!(
        "Call {} JCMT available time: {} inserted, {} updated, {} deleted",
        call_id, counts.inserted, counts.updated, counts.deleted
    );

    Ok(Json(counts))
}
