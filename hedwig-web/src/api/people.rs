use axum::{
    extract::{Path, State},
    Json,
};
use hedwig_common::db::people::{search_email, sync_person_email};
use hedwig_common::types::Email;
use hedwig_common::{ResultCollection, SyncCounts};
use tracing::info;

use super::{ApiResult, SyncRequest};
use crate::AppState;

/// GET /api/person/:id/emails
pub async fn get_emails(
    State(state): State<AppState>,
    Path(person_id): Path<i64>,
) -> ApiResult<Json<ResultCollection<Email>>> {
    Ok(Json(search_email(&state.db, person_id).await?))
}

/// PUT /api/person/:id/emails
///
/// The `verified` flag is not taken from the request: an address keeps its
/// stored flag until the address itself changes.
pub async fn put_emails(
    State(state): State<AppState>,
    Path(person_id): Path<i64>,
    Json(request): Json<SyncRequest<Email>>,
) -> ApiResult<Json<SyncCounts>> {
    let records = request.into_collection(|r| {
        r.person_id = person_id;
        r.verified = false;
    });
    let counts = sync_person_email(&state.db, person_id, &records).await?;

    info!(
        "Person {} email addresses: {} inserted, {} updated, {} deleted",
        person_id, counts.inserted, counts.updated, counts.deleted
    );

    Ok(Json(counts))
}
