//! hedwig-web library: JSON service over the Hedwig storage layer
//!
//! Every collection endpoint follows the same pattern: `GET` returns the
//! stored collection, `PUT` replaces it with the submitted records and
//! answers with the insert/update/delete counts.

use axum::Router;
use hedwig_common::types::FacilityKind;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Shared secret for request signing; 0 disables checking
    pub shared_secret: i64,
    /// Facility whose reviewer role rules apply
    pub facility: FacilityKind,
}

impl AppState {
    pub fn new(db: SqlitePool, shared_secret: i64, facility: FacilityKind) -> Self {
        Self {
            db,
            shared_secret,
            facility,
        }
    }
}

/// Build application router
///
/// `/health` is public; everything under `/api` passes through the
/// signature check.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, put};

    let protected = Router::new()
        .route(
            "/api/queue/:id/affiliations",
            get(api::facility::get_affiliations).put(api::facility::put_affiliations),
        )
        .route(
            "/api/queue/:id/group/:group_type",
            get(api::review::get_group).put(api::review::put_group),
        )
        .route(
            "/api/facility/:id/categories",
            get(api::facility::get_categories).put(api::facility::put_categories),
        )
        .route(
            "/api/person/:id/emails",
            get(api::people::get_emails).put(api::people::put_emails),
        )
        .route(
            "/api/proposal/:id/members",
            get(api::proposal::get_members).put(api::proposal::put_members),
        )
        .route(
            "/api/proposal/:id/members/institutions",
            put(api::proposal::put_member_institutions),
        )
        .route(
            "/api/proposal/:id/members/students",
            put(api::proposal::put_member_students),
        )
        .route(
            "/api/proposal/:id/targets",
            get(api::proposal::get_targets).put(api::proposal::put_targets),
        )
        .route(
            "/api/proposal/:id/categories",
            get(api::proposal::get_categories).put(api::proposal::put_categories),
        )
        .route("/api/proposal/:id/rating", get(api::review::get_rating))
        .route("/api/call/:id/ratings", get(api::review::get_call_ratings))
        .route(
            "/api/proposal/:id/jcmt/requests",
            get(api::jcmt::get_requests).put(api::jcmt::put_requests),
        )
        .route(
            "/api/proposal/:id/jcmt/allocations",
            get(api::jcmt::get_allocations).put(api::jcmt::put_allocations),
        )
        .route(
            "/api/call/:id/jcmt/available",
            get(api::jcmt::get_available).put(api::jcmt::put_available),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    let public = Router::new().merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
