//! JCMT-specific enumerations and role overrides

use super::enums::{ReviewerRole, RoleCatalog, RoleInfo};

/// Weather band, by 225 GHz opacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JcmtWeather {
    Band1,
    Band2,
    Band3,
    Band4,
    Band5,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherInfo {
    pub name: &'static str,
    pub available: bool,
    /// Representative opacity
    pub rep: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Time in this band is not charged against the allocation
    pub free: bool,
}

impl JcmtWeather {
    pub const ALL: [JcmtWeather; 5] = [
        JcmtWeather::Band1,
        JcmtWeather::Band2,
        JcmtWeather::Band3,
        JcmtWeather::Band4,
        JcmtWeather::Band5,
    ];

    pub fn code(self) -> i64 {
        match self {
            JcmtWeather::Band1 => 1,
            JcmtWeather::Band2 => 2,
            JcmtWeather::Band3 => 3,
            JcmtWeather::Band4 => 4,
            JcmtWeather::Band5 => 5,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.code() == code)
    }

    pub fn info(self) -> WeatherInfo {
        let (name, rep, min, max, free) = match self {
            JcmtWeather::Band1 => ("Band 1", 0.045, None, Some(0.05), false),
            JcmtWeather::Band2 => ("Band 2", 0.065, Some(0.05), Some(0.08), false),
            JcmtWeather::Band3 => ("Band 3", 0.1, Some(0.08), Some(0.12), false),
            JcmtWeather::Band4 => ("Band 4", 0.16, Some(0.12), Some(0.2), false),
            JcmtWeather::Band5 => ("Band 5", 0.25, Some(0.2), None, true),
        };
        WeatherInfo { name, available: true, rep, min, max, free }
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JcmtInstrument {
    Scuba2,
    Harp,
    RxA3,
    RxA3m,
}

impl JcmtInstrument {
    pub const ALL: [JcmtInstrument; 4] = [
        JcmtInstrument::Scuba2,
        JcmtInstrument::Harp,
        JcmtInstrument::RxA3,
        JcmtInstrument::RxA3m,
    ];

    pub fn code(self) -> i64 {
        match self {
            JcmtInstrument::Scuba2 => 1,
            JcmtInstrument::Harp => 2,
            JcmtInstrument::RxA3 => 3,
            JcmtInstrument::RxA3m => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            JcmtInstrument::Scuba2 => "SCUBA-2",
            JcmtInstrument::Harp => "HARP",
            JcmtInstrument::RxA3 => "RxA3",
            JcmtInstrument::RxA3m => "RxA3m",
        }
    }

    pub fn available(self) -> bool {
        !matches!(self, JcmtInstrument::RxA3)
    }
}

/// Self-declared expertise of a committee reviewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JcmtReviewerExpertise {
    NonExpert,
    Intermediate,
    Expert,
}

impl JcmtReviewerExpertise {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(JcmtReviewerExpertise::NonExpert),
            2 => Some(JcmtReviewerExpertise::Intermediate),
            3 => Some(JcmtReviewerExpertise::Expert),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            JcmtReviewerExpertise::NonExpert => "Non-expert",
            JcmtReviewerExpertise::Intermediate => "Intermediate",
            JcmtReviewerExpertise::Expert => "Expert",
        }
    }

    /// Percentage weight given to a rating at this expertise level
    pub fn weight(self) -> i64 {
        match self {
            JcmtReviewerExpertise::NonExpert => 50,
            JcmtReviewerExpertise::Intermediate => 75,
            JcmtReviewerExpertise::Expert => 100,
        }
    }
}

/// JCMT committee roles carry no explicit weight; expertise is recorded
/// instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct JcmtRoles;

impl JcmtRoles {
    /// Whether reviewers in this role state their expertise
    pub fn expertise(role: ReviewerRole) -> bool {
        matches!(
            role,
            ReviewerRole::CommitteePrimary
                | ReviewerRole::CommitteeSecondary
                | ReviewerRole::CommitteeOther
        )
    }

    /// Whether the external reviewer questionnaire applies
    pub fn external_questions(role: ReviewerRole) -> bool {
        role == ReviewerRole::External
    }
}

impl RoleCatalog for JcmtRoles {
    fn role_info(&self, role: ReviewerRole) -> RoleInfo {
        let base = role.info();
        match role {
            ReviewerRole::CommitteePrimary => RoleInfo { weight: false, ..base },
            ReviewerRole::CommitteeSecondary => RoleInfo { unique: true, weight: false, ..base },
            ReviewerRole::CommitteeOther => RoleInfo {
                name: "Rating",
                name_review: false,
                weight: false,
                ..base
            },
            _ => base,
        }
    }
}
