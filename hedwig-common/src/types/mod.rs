//! Domain types: enumerations, records and record collections

pub mod collection;
pub mod enums;
pub mod jcmt;
pub mod records;

pub use collection::ResultCollection;
pub use enums::{GenericRoles, GroupType, ProposalState, ReviewerRole, RoleCatalog, RoleInfo};
pub use jcmt::{JcmtInstrument, JcmtReviewerExpertise, JcmtRoles, JcmtWeather};
pub use records::*;

use crate::Error;
use std::str::FromStr;

/// Facility whose rules govern reviewer roles and time requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacilityKind {
    #[default]
    Generic,
    Jcmt,
}

impl FacilityKind {
    pub fn code(self) -> &'static str {
        match self {
            FacilityKind::Generic => "generic",
            FacilityKind::Jcmt => "jcmt",
        }
    }

    pub fn role_catalog(self) -> &'static dyn RoleCatalog {
        match self {
            FacilityKind::Generic => &GenericRoles,
            FacilityKind::Jcmt => &JcmtRoles,
        }
    }
}

impl FromStr for FacilityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "generic" => Ok(FacilityKind::Generic),
            "jcmt" => Ok(FacilityKind::Jcmt),
            other => Err(Error::Config(format!("Unknown facility: {}", other))),
        }
    }
}
