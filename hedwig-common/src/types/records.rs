//! Record types for the entities managed by the storage layer
//!
//! Records which take part in reconciliation carry `id: Option<i64>`: `None`
//! marks a record which has not been stored yet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{GroupType, ProposalState, ReviewerRole};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: i64,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Queue {
    pub id: i64,
    pub facility_id: i64,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Semester {
    pub id: i64,
    pub facility_id: i64,
    pub name: String,
    pub code: String,
    pub date_start: DateTime<Utc>,
    pub date_end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub id: i64,
    pub semester_id: i64,
    pub queue_id: i64,
    pub date_open: DateTime<Utc>,
    pub date_close: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: i64,
    pub call_id: i64,
    pub number: i64,
    pub state: ProposalState,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Institution {
    pub id: i64,
    pub name: String,
    pub organization: String,
    pub address: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub public: bool,
    pub institution_id: Option<i64>,
    pub admin: bool,
}

/// Affiliation which members of a proposal may claim within a queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Affiliation {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub queue_id: i64,
    pub name: String,
    #[serde(default)]
    pub hidden: bool,
}

/// Science category offered by a facility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub facility_id: i64,
    pub name: String,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalCategory {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub proposal_id: i64,
    pub category_id: i64,
    #[serde(default)]
    pub category_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub person_id: i64,
    pub address: String,
    #[serde(default)]
    pub primary: bool,
    /// Never taken from input: reset whenever the address changes
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub public: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub proposal_id: i64,
    #[serde(default)]
    pub sort_order: Option<i64>,
    pub person_id: i64,
    #[serde(default)]
    pub pi: bool,
    #[serde(default)]
    pub editor: bool,
    #[serde(default)]
    pub observer: bool,
    #[serde(default)]
    pub student: bool,
    pub affiliation_id: i64,
    #[serde(default)]
    pub institution_id: Option<i64>,
    #[serde(default)]
    pub person_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub proposal_id: i64,
    #[serde(default)]
    pub sort_order: Option<i64>,
    pub name: String,
    /// Coordinate system code
    #[serde(default)]
    pub system: Option<i64>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    /// Requested time in hours
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub priority: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub queue_id: i64,
    pub group_type: GroupType,
    pub person_id: i64,
    #[serde(default)]
    pub person_name: Option<String>,
}

/// Reviewer assignment, joined with the review itself when one exists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reviewer {
    pub id: i64,
    pub proposal_id: i64,
    pub person_id: i64,
    pub role: ReviewerRole,
    #[serde(default)]
    pub person_name: Option<String>,
    pub review_present: bool,
    #[serde(default)]
    pub review_text: Option<String>,
    #[serde(default)]
    pub review_assessment: Option<i64>,
    #[serde(default)]
    pub review_rating: Option<i64>,
    /// Percentage weight for roles which carry one
    #[serde(default)]
    pub review_weight: Option<i64>,
    #[serde(default)]
    pub review_edited: Option<DateTime<Utc>>,
}

/// Review content submitted by a reviewer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewInput {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub assessment: Option<i64>,
    #[serde(default)]
    pub rating: Option<i64>,
    #[serde(default)]
    pub weight: Option<i64>,
}

/// Observing time requested (or allocated) on one instrument in one
/// weather band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JcmtRequest {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub proposal_id: i64,
    pub instrument: i64,
    pub weather: i64,
    pub time: f64,
}

/// Time available for a call in one weather band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JcmtAvailable {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub call_id: i64,
    pub weather: i64,
    pub time: f64,
}
