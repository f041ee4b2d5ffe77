//! Houses and resident memberships.
//!
//! A house is the billable root aggregate. Memberships decide who may file
//! a resident pay-in for a house.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use moobaan_shared::types::{HouseId, MembershipId, UserId};

use crate::error::CoreError;

/// Maximum number of active memberships a single house may hold.
pub const MAX_ACTIVE_MEMBERSHIPS: usize = 3;

/// Whether a house is billable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HouseStatus {
    /// House is occupied and billable.
    Active,
    /// House is not billable.
    Inactive,
}

impl fmt::Display for HouseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Inactive => write!(f, "INACTIVE"),
        }
    }
}

/// A billable unit in the village.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct House {
    /// Unique identifier.
    pub id: HouseId,
    /// Unique house code, e.g. "A-101".
    pub code: String,
    /// Current status.
    pub status: HouseStatus,
    /// When the house was registered.
    pub created_at: DateTime<Utc>,
}

impl House {
    /// Creates an active house.
    pub fn new(code: &str, now: DateTime<Utc>) -> Result<Self, CoreError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(CoreError::Validation("House code is required".to_string()));
        }
        Ok(Self {
            id: HouseId::new(),
            code: code.to_string(),
            status: HouseStatus::Active,
            created_at: now,
        })
    }

    /// Fails unless the house accepts new financial records.
    pub fn ensure_active(&self) -> Result<(), CoreError> {
        match self.status {
            HouseStatus::Active => Ok(()),
            HouseStatus::Inactive => Err(CoreError::Validation(format!(
                "House {} is inactive",
                self.code
            ))),
        }
    }
}

/// Role of a resident within a house.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipRole {
    /// Registered owner.
    Owner,
    /// Family member or co-resident.
    Family,
}

/// Whether a membership is in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipStatus {
    /// Membership grants access.
    Active,
    /// Membership is revoked.
    Inactive,
}

/// Link between a user and a house.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidentMembership {
    /// Unique identifier.
    pub id: MembershipId,
    /// House the user belongs to.
    pub house_id: HouseId,
    /// The resident.
    pub user_id: UserId,
    /// Role within the house.
    pub role: MembershipRole,
    /// Current status.
    pub status: MembershipStatus,
    /// When the membership was created.
    pub created_at: DateTime<Utc>,
}

impl ResidentMembership {
    /// Returns true if the membership is in force.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }
}

/// Builds a new active membership after checking the house's capacity.
///
/// `existing` are all memberships currently recorded for the house.
pub fn admit_resident(
    house: &House,
    existing: &[ResidentMembership],
    user_id: UserId,
    role: MembershipRole,
    now: DateTime<Utc>,
) -> Result<ResidentMembership, CoreError> {
    house.ensure_active()?;

    if existing.iter().any(|m| m.user_id == user_id) {
        return Err(CoreError::Validation(format!(
            "User {user_id} already has a membership in house {}",
            house.code
        )));
    }

    let active = existing.iter().filter(|m| m.is_active()).count();
    if active >= MAX_ACTIVE_MEMBERSHIPS {
        return Err(CoreError::Validation(format!(
            "House {} already has {MAX_ACTIVE_MEMBERSHIPS} active residents",
            house.code
        )));
    }

    Ok(ResidentMembership {
        id: MembershipId::new(),
        house_id: house.id,
        user_id,
        role,
        status: MembershipStatus::Active,
        created_at: now,
    })
}

/// Returns true if `user_id` holds an active membership among `memberships`.
#[must_use]
pub fn is_active_resident(memberships: &[ResidentMembership], user_id: UserId) -> bool {
    memberships
        .iter()
        .any(|m| m.user_id == user_id && m.is_active())
}
