//! Proposal members, targets and categories

use axum::{
    extract::{Path, State},
    Json,
};
use hedwig_common::db::proposal::{
    search_member, search_proposal_category, search_target, sync_proposal_category,
    sync_proposal_member, sync_proposal_member_institution, sync_proposal_member_student,
    sync_proposal_target,
};
use hedwig_common::types::{Member, ProposalCategory, Target};
use hedwig_common::{ResultCollection, SyncCounts};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiResult, SyncRequest};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MemberSyncRequest {
    pub records: Vec<Member>,
    /// Person making the change, who must remain an editor
    #[serde(default)]
    pub editor_person_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TargetList {
    pub targets: ResultCollection<Target>,
    /// Sum of the requested time over all targets, in hours
    pub total_time: f64,
}

fn log_counts(proposal_id: i64, what: &str, counts: &SyncCounts) {
    info!(
        "Proposal {} {}: {} inserted, {} updated, {} deleted",
        proposal_id, what, counts.inserted, counts.updated, counts.deleted
    );
}

/// GET /api/proposal/:id/members
pub async fn get_members(
    State(state): State<AppState>,
    Path(proposal_id): Path<i64>,
) -> ApiResult<Json<ResultCollection<Member>>> {
    Ok(Json(search_member(&state.db, proposal_id).await?))
}

/// PUT /api/proposal/:id/members
pub async fn put_members(
    State(state): State<AppState>,
    Path(proposal_id): Path<i64>,
    Json(request): Json<MemberSyncRequest>,
) -> ApiResult<Json<SyncCounts>> {
    let editor_person_id = request.editor_person_id;
    let records = SyncRequest {
        records: request.records,
    }
    .into_collection(|r| r.proposal_id = proposal_id);

    let counts = sync_proposal_member(&state.db, proposal_id, &records, editor_person_id).await?;
    log_counts(proposal_id, "members", &counts);

    Ok(Json(counts))
}

/// PUT /api/proposal/:id/members/institutions
pub async fn put_member_institutions(
    State(state): State<AppState>,
    Path(proposal_id): Path<i64>,
    Json(request): Json<SyncRequest<Member>>,
) -> ApiResult<Json<SyncCounts>> {
    let records = request.into_collection(|r| r.proposal_id = proposal_id);
    let counts = sync_proposal_member_institution(&state.db, proposal_id, &records).await?;
    log_counts(proposal_id, "member institutions", &counts);

    Ok(Json(counts))
}

/// PUT /api/proposal/:id/members/students
pub async fn put_member_students(
    State(state): State<AppState>,
    Path(proposal_id): Path<i64>,
    Json(request): Json<SyncRequest<Member>>,
) -> ApiResult<Json<SyncCounts>> {
    let records = request.into_collection(|r| r.proposal_id = proposal_id);
    let counts = sync_proposal_member_student(&state.db, proposal_id, &records).await?;
    log_counts(proposal_id, "member students", &counts);

    Ok(Json(counts))
}

/// GET /api/proposal/:id/targets
pub async fn get_targets(
    State(state): State<AppState>,
    Path(proposal_id): Path<i64>,
) -> ApiResult<Json<TargetList>> {
    let targets = search_target(&state.db, proposal_id).await?;
    let total_time = targets.total_time();

    Ok(Json(TargetList {
        targets,
        total_time,
    }))
}

/// PUT /api/proposal/:id/targets
pub async fn put_targets(
    State(state): State<AppState>,
    Path(proposal_id): Path<i64>,
    Json(request): Json<SyncRequest<Target>>,
) -> ApiResult<Json<SyncCounts>> {
    let records = request.into_collection(|r| r.proposal_id = proposal_id);
    let counts = sync_proposal_target(&state.db, proposal_id, &records).await?;
    log_counts(proposal_id, "targets", &counts);

    Ok(Json(counts))
}

/// GET /api/proposal/:id/categories
pub async fn get_categories(
    State(state): State<AppState>,
    Path(proposal_id): Path<i64>,
) -> ApiResult<Json<ResultCollection<ProposalCategory>>> {
    Ok(Json(search_proposal_category(&state.db, proposal_id).await?))
}

/// PUT /api/proposal/:id/categories
pub async fn put_categories(
    State(state): State<AppState>,
    Path(proposal_id): Path<i64>,
    Json(request): Json<SyncRequest<ProposalCategory>>,
) -> ApiResult<Json<SyncCounts>> {
    let records = request.into_collection(|r| r.proposal_id = proposal_id);
    let counts = sync_proposal_category(&state.db, proposal_id, &records).await?;
    log_counts(proposal_id, "categories", &counts);

    Ok(Json(counts))
}
