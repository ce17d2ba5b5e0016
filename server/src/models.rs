//! # Domain Model
//!
//! Typed shapes for the documents in the store. Field names serialize as
//! camelCase to match the stored document shapes; statuses and roles are
//! lowercase string tags.
//!
//! The `id` field mirrors the document key. The store stamps it on write,
//! so it is defaulted on deserialize and carried through on reads.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Superadmin,
    Admin,
    Regular,
}

impl Role {
    /// Admin capability within one organization. Superadmin is the founding
    /// registrant; admins are approved by them.
    pub fn can_administer(self) -> bool {
        matches!(self, Role::Superadmin | Role::Admin)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Denied,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Denied,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// A school/campus tenant. The unit of data isolation.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<GeoPoint>,
    pub approval_status: ApprovalStatus,
    pub applied_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A user's role + approval record within one organization. Document key is
/// the user id, so there is exactly one membership per (org, user) pair.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub role: Role,
    pub application_status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<GeoPoint>,
}

/// A found item cataloged by an organization's admins. `location_id` must
/// resolve within the same organization; after a location is deleted it
/// resolves to nothing and readers fall back to a placeholder.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub location_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Verification question an admin can attach so claimants can be vetted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_answer: Option<String>,
    pub found_at: DateTime<Utc>,
}

/// A user's assertion of ownership over a found item. Top-level collection;
/// carries the owning organization id alongside the item id so the claimed
/// item resolves without dereferencing an opaque reference.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    #[serde(default)]
    pub id: String,
    pub organization_id: String,
    pub item_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A report of a missing (not yet found) item. Write-only from the
/// student's perspective; admins review the listing.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub item_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Per-user record of an organization join request, listed on the profile.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(default)]
    pub id: String,
    pub organization_id: String,
    pub member_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Credential record keyed by email. Never exposed over the API.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Validation runs before any network call; a failure means the operation
/// was never attempted.
pub fn require_non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_as_lowercase_tags() {
        assert_eq!(
            serde_json::to_string(&Role::Superadmin).unwrap(),
            "\"superadmin\""
        );
        assert_eq!(
            serde_json::from_str::<ApplicationStatus>("\"pending\"").unwrap(),
            ApplicationStatus::Pending
        );
    }

    #[test]
    fn regular_members_cannot_administer() {
        assert!(Role::Superadmin.can_administer());
        assert!(Role::Admin.can_administer());
        assert!(!Role::Regular.can_administer());
    }

    #[test]
    fn empty_names_fail_validation() {
        assert!(require_non_empty("name", "").is_err());
        assert!(require_non_empty("name", "   ").is_err());
        assert!(require_non_empty("name", "Branham").is_ok());
    }
}
