//! HTTP API handlers for hedwig-web

pub mod auth;
pub mod error;
pub mod facility;
pub mod health;
pub mod jcmt;
pub mod people;
pub mod proposal;
pub mod review;

pub use auth::auth_middleware;
pub use error::{ApiError, ApiResult};
pub use health::health_routes;

use hedwig_common::ResultCollection;
use serde::Deserialize;

/// Body of a `PUT` which replaces a collection.
///
/// The signature fields (`timestamp`, `hash`) are checked by the middleware
/// and ignored here.
#[derive(Debug, Deserialize)]
pub struct SyncRequest<T> {
    pub records: Vec<T>,
}

impl<T> SyncRequest<T> {
    /// Records as a collection, after `attach` has pointed each one at
    /// the parent named in the path
    pub fn into_collection(self, attach: impl FnMut(&mut T)) -> ResultCollection<T> {
        let mut records = self.records;
        records.iter_mut().for_each(attach);
        ResultCollection::from_values(records)
    }
}
