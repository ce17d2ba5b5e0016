//! # Membership & Approval
//!
//! The approval workflow per (organization, user) pair.
//!
//! Organization: pending -> approved | denied (terminal), site owner only.
//! Member: pending -> approved | denied; a denied user may reapply, which
//! overwrites the membership document and returns the pair to pending.
//!
//! Coupling rule: approving an organization also approves its founding
//! superadmin's membership. The two writes are independent network calls
//! with no transaction around them. A failure between them leaves the
//! organization approved and the founder pending; that state is surfaced,
//! not rolled back, and re-running the member step corrects it.
//!
//! Every privileged operation re-derives the caller's capability from the
//! store. Nothing here trusts a cached role.
use tracing::warn;

use crate::{
    error::AppError,
    models::{
        require_non_empty, Application, ApplicationStatus, ApprovalStatus, GeoPoint, Member,
        Organization, Role,
    },
    repo,
    store::Store,
};

pub struct NewOrganization {
    pub name: String,
    pub address: Option<String>,
    pub point: Option<GeoPoint>,
}

/// Register a new organization. The registrant becomes its founding
/// superadmin, pending alongside the organization itself until the site
/// owner rules on it. Returns the new organization id.
pub async fn register_organization(
    store: &dyn Store,
    user_id: &str,
    new_org: NewOrganization,
) -> Result<String, AppError> {
    require_non_empty("organization name", &new_org.name)?;

    let org = Organization {
        id: String::new(),
        name: new_org.name.trim().to_string(),
        address: new_org.address,
        point: new_org.point,
        approval_status: ApprovalStatus::Pending,
        applied_at: chrono::Utc::now(),
        created_at: chrono::Utc::now(),
    };

    let org_id = repo::add_organization(store, org).await?;

    repo::set_member(
        store,
        &org_id,
        user_id,
        Role::Superadmin,
        ApplicationStatus::Pending,
    )
    .await?;

    Ok(org_id)
}

/// Apply to join an existing, already-approved organization as admin or
/// regular. Overwrites any previous membership for the pair (a denied user
/// reapplying goes back to pending) and records the application on the
/// user's profile. Returns the member id.
pub async fn apply_to_organization(
    store: &dyn Store,
    user_id: &str,
    org_id: &str,
    requested_role: Role,
    message: Option<String>,
) -> Result<String, AppError> {
    if requested_role == Role::Superadmin {
        return Err(AppError::Validation(
            "superadmin is reserved for the organization's registrant".to_string(),
        ));
    }

    let org = repo::get_organization(store, org_id)
        .await?
        .ok_or(AppError::NotFound)?;

    if org.approval_status != ApprovalStatus::Approved {
        return Err(AppError::Validation(
            "organization is not accepting applications".to_string(),
        ));
    }

    repo::set_member(store, org_id, user_id, requested_role, ApplicationStatus::Pending).await?;

    repo::add_application(
        store,
        user_id,
        Application {
            id: String::new(),
            organization_id: org_id.to_string(),
            member_id: user_id.to_string(),
            message,
            created_at: chrono::Utc::now(),
        },
    )
    .await?;

    Ok(user_id.to_string())
}

/// Site owner approves an organization, then its founding member. Two
/// writes, no atomicity: if the member write fails the organization stays
/// approved and the error names the failed step.
pub async fn approve_organization(
    store: &dyn Store,
    acting_user_id: &str,
    org_id: &str,
) -> Result<(), AppError> {
    require_site_owner(store, acting_user_id).await?;

    repo::get_organization(store, org_id)
        .await?
        .ok_or(AppError::NotFound)?;

    repo::update_organization(
        store,
        org_id,
        &repo::OrganizationPatch {
            approval_status: Some(ApprovalStatus::Approved),
            ..Default::default()
        },
    )
    .await?;

    // From here on the organization is already approved, so any failure in
    // the member step is reported as a partial failure, not a rollback.
    let members = match repo::list_members(store, org_id).await {
        Ok(members) => members,
        Err(e) => {
            warn!("founder lookup for organization {org_id} failed: {e}");
            return Err(AppError::FounderApprovalFailed {
                org_id: org_id.to_string(),
                reason: e.to_string(),
            });
        }
    };

    let Some(founder) = members.into_iter().find(|m| m.role == Role::Superadmin) else {
        // Nothing left to couple; the organization alone was ruled on.
        return Ok(());
    };

    let member_step = repo::update_member(
        store,
        org_id,
        &founder.id,
        &repo::MemberPatch {
            application_status: Some(ApplicationStatus::Approved),
            ..Default::default()
        },
    )
    .await;

    if let Err(e) = member_step {
        warn!("founder approval for organization {org_id} failed: {e}");
        return Err(AppError::FounderApprovalFailed {
            org_id: org_id.to_string(),
            reason: e.to_string(),
        });
    }

    Ok(())
}

/// Terminal denial. The founding member is left as-is.
pub async fn deny_organization(
    store: &dyn Store,
    acting_user_id: &str,
    org_id: &str,
) -> Result<(), AppError> {
    require_site_owner(store, acting_user_id).await?;

    repo::get_organization(store, org_id)
        .await?
        .ok_or(AppError::NotFound)?;

    repo::update_organization(
        store,
        org_id,
        &repo::OrganizationPatch {
            approval_status: Some(ApprovalStatus::Denied),
            ..Default::default()
        },
    )
    .await
}

pub async fn approve_member(
    store: &dyn Store,
    acting_user_id: &str,
    org_id: &str,
    member_id: &str,
) -> Result<(), AppError> {
    set_member_status(store, acting_user_id, org_id, member_id, ApplicationStatus::Approved).await
}

pub async fn deny_member(
    store: &dyn Store,
    acting_user_id: &str,
    org_id: &str,
    member_id: &str,
) -> Result<(), AppError> {
    set_member_status(store, acting_user_id, org_id, member_id, ApplicationStatus::Denied).await
}

async fn set_member_status(
    store: &dyn Store,
    acting_user_id: &str,
    org_id: &str,
    member_id: &str,
    status: ApplicationStatus,
) -> Result<(), AppError> {
    require_administrator(store, acting_user_id, org_id).await?;

    repo::update_member(
        store,
        org_id,
        member_id,
        &repo::MemberPatch {
            application_status: Some(status),
            ..Default::default()
        },
    )
    .await
}

/// All (organization id, membership) pairs for a user. Scans every
/// organization and probes its members by key. O(organizations), fine at
/// this scale.
pub async fn resolve_user_organizations(
    store: &dyn Store,
    user_id: &str,
) -> Result<Vec<(String, Member)>, AppError> {
    let org_docs = store.list(repo::ORGANIZATIONS).await?;
    let mut results = Vec::new();

    for doc in org_docs {
        let Some(org_id) = doc.get("id").and_then(|v| v.as_str()) else {
            continue;
        };

        if let Some(member) = repo::get_member(store, org_id, user_id).await? {
            results.push((org_id.to_string(), member));
        }
    }

    Ok(results)
}

/// A user administers an organization iff their membership is approved and
/// their role is admin or superadmin. Recomputed on every privileged call.
pub async fn can_administer(
    store: &dyn Store,
    user_id: &str,
    org_id: &str,
) -> Result<bool, AppError> {
    Ok(repo::get_member(store, org_id, user_id)
        .await?
        .is_some_and(|member| {
            member.role.can_administer()
                && member.application_status == ApplicationStatus::Approved
        }))
}

/// Approved membership of any role: enough to read an organization's
/// catalog, not to change it.
pub async fn is_approved_member(
    store: &dyn Store,
    user_id: &str,
    org_id: &str,
) -> Result<bool, AppError> {
    Ok(repo::get_member(store, org_id, user_id)
        .await?
        .is_some_and(|member| member.application_status == ApplicationStatus::Approved))
}

pub async fn require_member(
    store: &dyn Store,
    user_id: &str,
    org_id: &str,
) -> Result<(), AppError> {
    if !is_approved_member(store, user_id, org_id).await? {
        return Err(AppError::Forbidden);
    }

    Ok(())
}

pub async fn require_administrator(
    store: &dyn Store,
    user_id: &str,
    org_id: &str,
) -> Result<(), AppError> {
    if !can_administer(store, user_id, org_id).await? {
        return Err(AppError::Forbidden);
    }

    Ok(())
}

pub async fn require_site_owner(store: &dyn Store, user_id: &str) -> Result<(), AppError> {
    if !repo::is_site_owner(store, user_id).await? {
        return Err(AppError::Forbidden);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{models::Item, store::MemoryStore};

    const OWNER: &str = "site-owner";

    async fn store_with_owner() -> MemoryStore {
        let store = MemoryStore::new();

        // Presence grants site-owner privilege; content is irrelevant.
        store
            .set(repo::APP_ADMINS, OWNER, json!({}))
            .await
            .unwrap();

        store
    }

    fn branham() -> NewOrganization {
        NewOrganization {
            name: "Branham".to_string(),
            address: Some("1775 Branham Ln".to_string()),
            point: None,
        }
    }

    #[tokio::test]
    async fn registration_creates_pending_org_and_founder() {
        let store = store_with_owner().await;

        let org_id = register_organization(&store, "alice", branham())
            .await
            .unwrap();

        let org = repo::get_organization(&store, &org_id).await.unwrap().unwrap();
        assert_eq!(org.approval_status, ApprovalStatus::Pending);

        let founder = repo::get_member(&store, &org_id, "alice").await.unwrap().unwrap();
        assert_eq!(founder.role, Role::Superadmin);
        assert_eq!(founder.application_status, ApplicationStatus::Pending);
    }

    #[tokio::test]
    async fn registration_rejects_empty_names_before_any_write() {
        let store = store_with_owner().await;

        let result = register_organization(
            &store,
            "alice",
            NewOrganization {
                name: "   ".to_string(),
                address: None,
                point: None,
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(store.list(repo::ORGANIZATIONS).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn approval_couples_org_and_founder() {
        let store = store_with_owner().await;
        let org_id = register_organization(&store, "alice", branham())
            .await
            .unwrap();

        approve_organization(&store, OWNER, &org_id).await.unwrap();

        let org = repo::get_organization(&store, &org_id).await.unwrap().unwrap();
        let founder = repo::get_member(&store, &org_id, "alice").await.unwrap().unwrap();
        assert_eq!(org.approval_status, ApprovalStatus::Approved);
        assert_eq!(founder.application_status, ApplicationStatus::Approved);
    }

    #[tokio::test]
    async fn partial_approval_is_visible_not_rolled_back() {
        let store = store_with_owner().await;
        let org_id = register_organization(&store, "alice", branham())
            .await
            .unwrap();

        store.fail_writes_to(&repo::members_of(&org_id));
        let result = approve_organization(&store, OWNER, &org_id).await;

        assert!(matches!(
            result,
            Err(AppError::FounderApprovalFailed { .. })
        ));

        // First step applied, second did not: approved org, pending founder.
        let org = repo::get_organization(&store, &org_id).await.unwrap().unwrap();
        let founder = repo::get_member(&store, &org_id, "alice").await.unwrap().unwrap();
        assert_eq!(org.approval_status, ApprovalStatus::Approved);
        assert_eq!(founder.application_status, ApplicationStatus::Pending);

        // Re-running the member step corrects the inconsistency.
        store.clear_write_failures();
        approve_member(&store, "alice", &org_id, "alice").await.unwrap_err();
        approve_organization(&store, OWNER, &org_id).await.unwrap();
        let founder = repo::get_member(&store, &org_id, "alice").await.unwrap().unwrap();
        assert_eq!(founder.application_status, ApplicationStatus::Approved);
    }

    #[tokio::test]
    async fn only_the_site_owner_rules_on_organizations() {
        let store = store_with_owner().await;
        let org_id = register_organization(&store, "alice", branham())
            .await
            .unwrap();

        assert!(matches!(
            approve_organization(&store, "alice", &org_id).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            deny_organization(&store, "mallory", &org_id).await,
            Err(AppError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn denial_is_terminal_and_leaves_the_founder_pending() {
        let store = store_with_owner().await;
        let org_id = register_organization(&store, "alice", branham())
            .await
            .unwrap();

        deny_organization(&store, OWNER, &org_id).await.unwrap();

        let org = repo::get_organization(&store, &org_id).await.unwrap().unwrap();
        let founder = repo::get_member(&store, &org_id, "alice").await.unwrap().unwrap();
        assert_eq!(org.approval_status, ApprovalStatus::Denied);
        assert_eq!(founder.application_status, ApplicationStatus::Pending);

        // A denied organization accepts no applications.
        assert!(matches!(
            apply_to_organization(&store, "bob", &org_id, Role::Regular, None).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn applying_twice_keeps_one_membership_per_pair() {
        let store = store_with_owner().await;
        let org_id = register_organization(&store, "alice", branham())
            .await
            .unwrap();
        approve_organization(&store, OWNER, &org_id).await.unwrap();

        apply_to_organization(&store, "bob", &org_id, Role::Regular, None)
            .await
            .unwrap();
        apply_to_organization(&store, "bob", &org_id, Role::Admin, None)
            .await
            .unwrap();

        let members = repo::list_members(&store, &org_id).await.unwrap();
        assert_eq!(members.len(), 2); // founder + bob

        let bob = repo::get_member(&store, &org_id, "bob").await.unwrap().unwrap();
        assert_eq!(bob.role, Role::Admin);
        assert_eq!(bob.application_status, ApplicationStatus::Pending);
    }

    #[tokio::test]
    async fn denied_members_reapply_by_overwrite() {
        let store = store_with_owner().await;
        let org_id = register_organization(&store, "alice", branham())
            .await
            .unwrap();
        approve_organization(&store, OWNER, &org_id).await.unwrap();

        apply_to_organization(&store, "bob", &org_id, Role::Regular, None)
            .await
            .unwrap();
        deny_member(&store, "alice", &org_id, "bob").await.unwrap();

        apply_to_organization(&store, "bob", &org_id, Role::Regular, None)
            .await
            .unwrap();

        let bob = repo::get_member(&store, &org_id, "bob").await.unwrap().unwrap();
        assert_eq!(bob.application_status, ApplicationStatus::Pending);
        assert_eq!(repo::list_members(&store, &org_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn applications_require_an_approved_organization() {
        let store = store_with_owner().await;
        let org_id = register_organization(&store, "alice", branham())
            .await
            .unwrap();

        assert!(matches!(
            apply_to_organization(&store, "bob", &org_id, Role::Regular, None).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            apply_to_organization(&store, "bob", "no-such-org", Role::Regular, None).await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(
            apply_to_organization(&store, "bob", &org_id, Role::Superadmin, None).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn pending_admins_cannot_administer() {
        let store = store_with_owner().await;
        let org_id = register_organization(&store, "alice", branham())
            .await
            .unwrap();
        approve_organization(&store, OWNER, &org_id).await.unwrap();

        apply_to_organization(&store, "carol", &org_id, Role::Admin, None)
            .await
            .unwrap();
        apply_to_organization(&store, "bob", &org_id, Role::Regular, None)
            .await
            .unwrap();

        // Carol's admin application is still pending, so she may not rule.
        assert!(matches!(
            approve_member(&store, "carol", &org_id, "bob").await,
            Err(AppError::Forbidden)
        ));

        approve_member(&store, "alice", &org_id, "carol").await.unwrap();
        approve_member(&store, "carol", &org_id, "bob").await.unwrap();

        let bob = repo::get_member(&store, &org_id, "bob").await.unwrap().unwrap();
        assert_eq!(bob.application_status, ApplicationStatus::Approved);
    }

    #[tokio::test]
    async fn end_to_end_registration_to_item_listing() {
        let store = store_with_owner().await;

        // A registers Branham: org pending, A superadmin/pending.
        let org_id = register_organization(&store, "user-a", branham())
            .await
            .unwrap();

        // Site owner approves.
        approve_organization(&store, OWNER, &org_id).await.unwrap();

        let orgs = resolve_user_organizations(&store, "user-a").await.unwrap();
        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs[0].0, org_id);
        assert_eq!(orgs[0].1.role, Role::Superadmin);
        assert_eq!(orgs[0].1.application_status, ApplicationStatus::Approved);

        // B applies as regular, A approves.
        apply_to_organization(&store, "user-b", &org_id, Role::Regular, None)
            .await
            .unwrap();
        approve_member(&store, "user-a", &org_id, "user-b").await.unwrap();

        let orgs = resolve_user_organizations(&store, "user-b").await.unwrap();
        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs[0].1.role, Role::Regular);
        assert_eq!(orgs[0].1.application_status, ApplicationStatus::Approved);

        // B can now list the organization's items.
        repo::add_item(
            &store,
            &org_id,
            Item {
                id: String::new(),
                name: "Red Water Bottle".to_string(),
                description: None,
                location_id: "loc-1".to_string(),
                image_url: None,
                hide_question: None,
                hide_answer: None,
                found_at: chrono::Utc::now(),
            },
        )
        .await
        .unwrap();

        let items = repo::list_items(&store, &org_id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Red Water Bottle");
    }
}
