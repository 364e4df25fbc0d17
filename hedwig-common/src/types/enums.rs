//! Enumerations shared by all facilities

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Reviewer role on a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ReviewerRole {
    Technical,
    External,
    CommitteePrimary,
    CommitteeSecondary,
    CommitteeOther,
    Feedback,
}

/// Properties of a reviewer role.
///
/// `name_review` indicates whether the name can be suffixed with "review".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleInfo {
    pub name: &'static str,
    pub unique: bool,
    pub text: bool,
    pub assessment: bool,
    pub rating: bool,
    pub weight: bool,
    pub cttee: bool,
    pub name_review: bool,
    pub feedback: bool,
    pub note: bool,
}

impl ReviewerRole {
    /// All roles in display order
    pub const ALL: [ReviewerRole; 6] = [
        ReviewerRole::Technical,
        ReviewerRole::External,
        ReviewerRole::CommitteePrimary,
        ReviewerRole::CommitteeSecondary,
        ReviewerRole::CommitteeOther,
        ReviewerRole::Feedback,
    ];

    pub fn code(self) -> i64 {
        match self {
            ReviewerRole::Technical => 1,
            ReviewerRole::External => 2,
            ReviewerRole::CommitteePrimary => 3,
            ReviewerRole::CommitteeSecondary => 4,
            ReviewerRole::CommitteeOther => 5,
            ReviewerRole::Feedback => 6,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.code() == code)
    }

    /// Role information without any facility-specific overrides
    pub fn info(self) -> RoleInfo {
        //                                unique text   assess rating weight cttee  "Rev"  feedbk note
        let (name, flags) = match self {
            ReviewerRole::Technical =>
                ("Technical", [true, true, true, false, false, false, true, false, true]),
            ReviewerRole::External =>
                ("External", [false, true, false, true, false, false, true, false, false]),
            ReviewerRole::CommitteePrimary =>
                ("TAC Primary", [true, true, false, true, true, true, true, true, true]),
            ReviewerRole::CommitteeSecondary =>
                ("TAC Secondary", [false, true, false, true, true, true, true, true, true]),
            ReviewerRole::CommitteeOther =>
                ("Rating", [false, false, false, true, true, true, false, false, false]),
            ReviewerRole::Feedback =>
                ("Feedback", [true, true, false, false, false, false, false, false, false]),
        };

        RoleInfo {
            name,
            unique: flags[0],
            text: flags[1],
            assessment: flags[2],
            rating: flags[3],
            weight: flags[4],
            cttee: flags[5],
            name_review: flags[6],
            feedback: flags[7],
            note: flags[8],
        }
    }
}

impl TryFrom<i64> for ReviewerRole {
    type Error = String;

    fn try_from(code: i64) -> std::result::Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("reviewer role not recognised: {}", code))
    }
}

impl From<ReviewerRole> for i64 {
    fn from(role: ReviewerRole) -> i64 {
        role.code()
    }
}

impl fmt::Display for ReviewerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().name)
    }
}

/// Facility-specific view of the reviewer roles
pub trait RoleCatalog: Send + Sync {
    fn role_info(&self, role: ReviewerRole) -> RoleInfo;

    fn cttee_roles(&self) -> Vec<ReviewerRole> {
        ReviewerRole::ALL
            .into_iter()
            .filter(|role| self.role_info(*role).cttee)
            .collect()
    }

    /// Roles whose reviewers may write the feedback review
    fn feedback_roles(&self) -> Vec<ReviewerRole> {
        ReviewerRole::ALL
            .into_iter()
            .filter(|role| self.role_info(*role).feedback)
            .collect()
    }
}

/// Role catalogue used by facilities without their own rules
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericRoles;

impl RoleCatalog for GenericRoles {
    fn role_info(&self, role: ReviewerRole) -> RoleInfo {
        role.info()
    }
}

/// Proposal life-cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ProposalState {
    Preparation,
    Submitted,
    Withdrawn,
    Review,
    Abandoned,
    Accepted,
    Rejected,
}

struct StateInfo {
    short_name: &'static str,
    name: &'static str,
    edit: bool,
    submitted: bool,
    reviewed: bool,
}

impl ProposalState {
    pub const ALL: [ProposalState; 7] = [
        ProposalState::Preparation,
        ProposalState::Submitted,
        ProposalState::Withdrawn,
        ProposalState::Review,
        ProposalState::Abandoned,
        ProposalState::Accepted,
        ProposalState::Rejected,
    ];

    pub fn code(self) -> i64 {
        match self {
            ProposalState::Preparation => 1,
            ProposalState::Submitted => 2,
            ProposalState::Withdrawn => 3,
            ProposalState::Review => 4,
            ProposalState::Abandoned => 5,
            ProposalState::Accepted => 6,
            ProposalState::Rejected => 7,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.code() == code)
    }

    fn info(self) -> StateInfo {
        let (short_name, name, edit, submitted, reviewed) = match self {
            ProposalState::Preparation => ("Prep", "In preparation", true, false, false),
            ProposalState::Submitted => ("Sub", "Submitted", true, true, false),
            ProposalState::Withdrawn => ("Wdwn", "Withdrawn", true, false, false),
            ProposalState::Review => ("Rev", "Under review", false, true, false),
            ProposalState::Abandoned => ("Abnd", "Abandoned", false, false, false),
            ProposalState::Accepted => ("Acc", "Accepted", false, true, true),
            ProposalState::Rejected => ("Rej", "Rejected", false, true, true),
        };
        StateInfo { short_name, name, edit, submitted, reviewed }
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    pub fn short_name(self) -> &'static str {
        self.info().short_name
    }

    /// Editable states are also the states of proposals whose call is open
    pub fn can_edit(self) -> bool {
        self.info().edit
    }

    pub fn is_submitted(self) -> bool {
        self.info().submitted
    }

    pub fn is_reviewed(self) -> bool {
        self.info().reviewed
    }

    pub fn editable_states() -> Vec<ProposalState> {
        Self::ALL.into_iter().filter(|s| s.can_edit()).collect()
    }

    pub fn submitted_states() -> Vec<ProposalState> {
        Self::ALL.into_iter().filter(|s| s.is_submitted()).collect()
    }

    pub fn reviewed_states() -> Vec<ProposalState> {
        Self::ALL.into_iter().filter(|s| s.is_reviewed()).collect()
    }

    /// Case-insensitive lookup by full name
    pub fn by_name(name: &str) -> Option<ProposalState> {
        let lower = name.to_lowercase();
        Self::ALL.into_iter().find(|s| s.name().to_lowercase() == lower)
    }
}

impl TryFrom<i64> for ProposalState {
    type Error = String;

    fn try_from(code: i64) -> std::result::Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("proposal state not recognised: {}", code))
    }
}

impl From<ProposalState> for i64 {
    fn from(state: ProposalState) -> i64 {
        state.code()
    }
}

/// Type of review group attached to a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum GroupType {
    Committee,
    Technical,
    Coordinator,
}

impl GroupType {
    pub const ALL: [GroupType; 3] = [GroupType::Committee, GroupType::Technical, GroupType::Coordinator];

    pub fn code(self) -> i64 {
        match self {
            GroupType::Committee => 1,
            GroupType::Technical => 2,
            GroupType::Coordinator => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            GroupType::Committee => "Committee",
            GroupType::Technical => "Technical assessors",
            GroupType::Coordinator => "Review coordinators",
        }
    }

    pub fn url_path(self) -> &'static str {
        match self {
            GroupType::Committee => "committee",
            GroupType::Technical => "technical",
            GroupType::Coordinator => "coordinator",
        }
    }

    pub fn by_url_path(path: &str) -> Result<GroupType> {
        Self::ALL
            .into_iter()
            .find(|g| g.url_path() == path)
            .ok_or_else(|| Error::InvalidInput(format!("URL path \"{}\" not recognised", path)))
    }

    /// Members may view all proposals
    pub fn view_all_proposals(self) -> bool {
        matches!(self, GroupType::Committee | GroupType::Coordinator)
    }

    /// Members may edit reviewer assignments
    pub fn review_coord(self) -> bool {
        matches!(self, GroupType::Coordinator)
    }
}

impl TryFrom<i64> for GroupType {
    type Error = String;

    fn try_from(code: i64) -> std::result::Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("group type not recognised: {}", code))
    }
}

impl From<GroupType> for i64 {
    fn from(group: GroupType) -> i64 {
        group.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_codes_round_trip() {
        for role in ReviewerRole::ALL {
            assert_eq!(ReviewerRole::from_code(role.code()), Some(role));
        }
        assert_eq!(ReviewerRole::from_code(99), None);
    }

    #[test]
    fn test_generic_cttee_and_feedback_roles() {
        let roles = GenericRoles;
        assert_eq!(
            roles.cttee_roles(),
            vec![
                ReviewerRole::CommitteePrimary,
                ReviewerRole::CommitteeSecondary,
                ReviewerRole::CommitteeOther
            ]
        );
        assert_eq!(
            roles.feedback_roles(),
            vec![ReviewerRole::CommitteePrimary, ReviewerRole::CommitteeSecondary]
        );
    }

    #[test]
    fn test_rating_and_weight_flags() {
        assert!(!ReviewerRole::Technical.info().rating);
        assert!(ReviewerRole::External.info().rating);
        assert!(!ReviewerRole::External.info().weight);
        assert!(ReviewerRole::CommitteeOther.info().weight);
    }

    #[test]
    fn test_proposal_state_predicates() {
        assert!(ProposalState::Submitted.can_edit());
        assert!(ProposalState::Submitted.is_submitted());
        assert!(!ProposalState::Review.can_edit());
        assert_eq!(
            ProposalState::reviewed_states(),
            vec![ProposalState::Accepted, ProposalState::Rejected]
        );
        assert_eq!(ProposalState::by_name("under REVIEW"), Some(ProposalState::Review));
        assert_eq!(ProposalState::by_name("pending"), None);
    }

    #[test]
    fn test_group_type_url_path() {
        assert_eq!(GroupType::by_url_path("technical").unwrap(), GroupType::Technical);
        assert!(GroupType::by_url_path("nobody").is_err());
    }

    #[test]
    fn test_role_serializes_as_code() {
        let json = serde_json::to_string(&ReviewerRole::CommitteeSecondary).unwrap();
        assert_eq!(json, "4");
        let role: ReviewerRole = serde_json::from_str("2").unwrap();
        assert_eq!(role, ReviewerRole::External);
        assert!(serde_json::from_str::<ReviewerRole>("42").is_err());
    }
}
