//! Review groups and rating summaries

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use hedwig_common::db::facility::get_call;
use hedwig_common::db::proposal::{get_proposal, search_proposal};
use hedwig_common::db::review::{
    search_group_member, search_reviewer, search_reviewer_by_call, sync_group_member,
};
use hedwig_common::stats::label_quartiles;
use hedwig_common::types::{GroupMember, GroupType, Reviewer};
use hedwig_common::{ResultCollection, SyncCounts};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiResult, SyncRequest};
use crate::AppState;

/// GET /api/queue/:id/group/:group_type
pub async fn get_group(
    State(state): State<AppState>,
    Path((queue_id, group_path)): Path<(i64, String)>,
) -> ApiResult<Json<ResultCollection<GroupMember>>> {
    let group_type = GroupType::by_url_path(&group_path)?;
    Ok(Json(search_group_member(&state.db, queue_id, Some(group_type)).await?))
}

/// PUT /api/queue/:id/group/:group_type
///
/// Removes members missing from the request; new members can not be added
/// this way.
pub async fn put_group(
    State(state): State<AppState>,
    Path((queue_id, group_path)): Path<(i64, String)>,
    Json(request): Json<SyncRequest<GroupMember>>,
) -> ApiResult<Json<SyncCounts>> {
    let group_type = GroupType::by_url_path(&group_path)?;
    let records = request.into_collection(|r| {
        r.queue_id = queue_id;
        r.group_type = group_type;
    });

    let counts = sync_group_member(&state.db, queue_id, group_type, &records).await?;

    info!(
        "Queue {} group {}: {} deleted",
        queue_id,
        group_type.url_path(),
        counts.deleted
    );

    Ok(Json(counts))
}

#[derive(Debug, Default, Deserialize)]
pub struct RatingQuery {
    #[serde(default)]
    pub include_unweighted: bool,
    #[serde(default)]
    pub std_dev: bool,
}

#[derive(Debug, Serialize)]
pub struct RatingResponse {
    pub proposal_id: i64,
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
}

/// GET /api/proposal/:id/rating
pub async fn get_rating(
    State(state): State<AppState>,
    Path(proposal_id): Path<i64>,
    Query(query): Query<RatingQuery>,
) -> ApiResult<Json<RatingResponse>> {
    get_proposal(&state.db, proposal_id).await?;
    let reviewers = search_reviewer(&state.db, proposal_id).await?;
    let roles = state.facility.role_catalog();

    let (rating, std_dev) = if query.std_dev {
        match reviewers.overall_rating_with_std_dev(roles, query.include_unweighted) {
            Some((rating, std_dev)) => (Some(rating), Some(std_dev)),
            None => (None, None),
        }
    } else {
        (reviewers.overall_rating(roles, query.include_unweighted), None)
    };

    Ok(Json(RatingResponse {
        proposal_id,
        rating,
        std_dev,
    }))
}

#[derive(Debug, Serialize)]
pub struct ProposalRating {
    pub proposal_id: i64,
    pub number: i64,
    pub title: String,
    pub rating: Option<f64>,
    /// 4 for the top quarter of rated proposals down to 1 for the bottom
    pub quartile: Option<u8>,
}

/// GET /api/call/:id/ratings
///
/// Every proposal in the call with its overall rating. Proposals without
/// a rating are listed but not labelled with a quartile.
pub async fn get_call_ratings(
    State(state): State<AppState>,
    Path(call_id): Path<i64>,
    Query(query): Query<RatingQuery>,
) -> ApiResult<Json<Vec<ProposalRating>>> {
    get_call(&state.db, call_id).await?;
    let proposals = search_proposal(&state.db, call_id, None).await?;
    let reviewers = search_reviewer_by_call(&state.db, call_id).await?;
    let roles = state.facility.role_catalog();

    let mut by_proposal: BTreeMap<i64, ResultCollection<Reviewer>> = BTreeMap::new();
    for reviewer in reviewers.into_values() {
        by_proposal
            .entry(reviewer.proposal_id)
            .or_default()
            .insert(reviewer.id, reviewer);
    }

    let ratings: BTreeMap<i64, f64> = by_proposal
        .iter()
        .filter_map(|(&proposal_id, reviewers)| {
            reviewers
                .overall_rating(roles, query.include_unweighted)
                .map(|rating| (proposal_id, rating))
        })
        .collect();

    let quartiles = label_quartiles(&ratings);

    Ok(Json(
        proposals
            .values()
            .map(|proposal| ProposalRating {
                proposal_id: proposal.id,
                number: proposal.number,
                title: proposal.title.clone(),
                rating: ratings.get(&proposal.id).copied(),
                quartile: quartiles.get(&proposal.id).copied(),
            })
            .collect(),
    ))
}
