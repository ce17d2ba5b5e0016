//! # Repositories
//!
//! Thin validated accessors over the document store, one group per entity
//! kind. Creation timestamps are stamped here from server time; whatever
//! the caller put in those fields is ignored. Updates are partial merges.
//! Deletes are unconditional and perform no referential-integrity checks.
//!
//! Scoped entities (Location, Item, Member, Request) are always addressed
//! through their organization id; there is no global listing across
//! organizations except by iterating known organization ids.
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::AppError,
    models::{
        Account, Application, ApplicationStatus, ApprovalStatus, Claim, GeoPoint, Item, Location,
        Member, Organization, Request, Role, User,
    },
    store::Store,
};

pub const ORGANIZATIONS: &str = "Organizations";
pub const USERS: &str = "Users";
pub const CLAIMS: &str = "Claims";
pub const APP_ADMINS: &str = "AppAdmins";
pub const ACCOUNTS: &str = "Accounts";

pub fn locations_of(org_id: &str) -> String {
    format!("{ORGANIZATIONS}/{org_id}/Locations")
}

pub fn items_of(org_id: &str) -> String {
    format!("{ORGANIZATIONS}/{org_id}/Items")
}

pub fn members_of(org_id: &str) -> String {
    format!("{ORGANIZATIONS}/{org_id}/Members")
}

pub fn requests_of(org_id: &str) -> String {
    format!("{ORGANIZATIONS}/{org_id}/Requests")
}

pub fn applications_of(user_id: &str) -> String {
    format!("{USERS}/{user_id}/Applications")
}

fn encode<T: Serialize>(entity: &T) -> Result<Value, AppError> {
    serde_json::to_value(entity).map_err(|e| AppError::Store(e.to_string()))
}

fn decode<T: DeserializeOwned>(doc: Value) -> Result<T, AppError> {
    serde_json::from_value(doc).map_err(|e| AppError::Store(e.to_string()))
}

fn decode_all<T: DeserializeOwned>(docs: Vec<Value>) -> Result<Vec<T>, AppError> {
    docs.into_iter().map(decode).collect()
}

// --- Organizations ---

pub async fn get_organization(
    store: &dyn Store,
    org_id: &str,
) -> Result<Option<Organization>, AppError> {
    store
        .get(ORGANIZATIONS, org_id)
        .await?
        .map(decode)
        .transpose()
}

/// Only approved organizations, for the public "find your organization"
/// listing. Anything without an explicit approved status stays hidden.
pub async fn list_approved_organizations(
    store: &dyn Store,
) -> Result<Vec<Organization>, AppError> {
    let orgs: Vec<Organization> = decode_all(store.list(ORGANIZATIONS).await?)?;

    Ok(orgs
        .into_iter()
        .filter(|org| org.approval_status == ApprovalStatus::Approved)
        .collect())
}

/// For the site owner: organizations awaiting approval.
pub async fn pending_organizations(store: &dyn Store) -> Result<Vec<Organization>, AppError> {
    let orgs: Vec<Organization> = decode_all(store.list(ORGANIZATIONS).await?)?;

    Ok(orgs
        .into_iter()
        .filter(|org| org.approval_status == ApprovalStatus::Pending)
        .collect())
}

pub async fn add_organization(
    store: &dyn Store,
    mut org: Organization,
) -> Result<String, AppError> {
    let now = Utc::now();
    org.created_at = now;
    org.applied_at = now;

    Ok(store.add(ORGANIZATIONS, encode(&org)?).await?)
}

#[derive(Serialize, Deserialize, Default, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_status: Option<ApprovalStatus>,
}

pub async fn update_organization(
    store: &dyn Store,
    org_id: &str,
    patch: &OrganizationPatch,
) -> Result<(), AppError> {
    store
        .update(ORGANIZATIONS, org_id, encode(patch)?)
        .await
        .map_err(Into::into)
}

/// Presence-only allow-list: a document keyed by the user id grants
/// site-owner privilege, content irrelevant.
pub async fn is_site_owner(store: &dyn Store, user_id: &str) -> Result<bool, AppError> {
    Ok(store.get(APP_ADMINS, user_id).await?.is_some())
}

// --- Locations ---

pub async fn list_locations(store: &dyn Store, org_id: &str) -> Result<Vec<Location>, AppError> {
    decode_all(store.list(&locations_of(org_id)).await?)
}

pub async fn get_location(
    store: &dyn Store,
    org_id: &str,
    location_id: &str,
) -> Result<Option<Location>, AppError> {
    store
        .get(&locations_of(org_id), location_id)
        .await?
        .map(decode)
        .transpose()
}

pub async fn add_location(
    store: &dyn Store,
    org_id: &str,
    location: &Location,
) -> Result<String, AppError> {
    Ok(store.add(&locations_of(org_id), encode(location)?).await?)
}

#[derive(Serialize, Deserialize, Default, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LocationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point: Option<GeoPoint>,
}

pub async fn update_location(
    store: &dyn Store,
    org_id: &str,
    location_id: &str,
    patch: &LocationPatch,
) -> Result<(), AppError> {
    store
        .update(&locations_of(org_id), location_id, encode(patch)?)
        .await
        .map_err(Into::into)
}

pub async fn delete_location(
    store: &dyn Store,
    org_id: &str,
    location_id: &str,
) -> Result<(), AppError> {
    store
        .delete(&locations_of(org_id), location_id)
        .await
        .map_err(Into::into)
}

// --- Items ---

pub async fn list_items(store: &dyn Store, org_id: &str) -> Result<Vec<Item>, AppError> {
    decode_all(store.list(&items_of(org_id)).await?)
}

pub async fn get_item(
    store: &dyn Store,
    org_id: &str,
    item_id: &str,
) -> Result<Option<Item>, AppError> {
    store
        .get(&items_of(org_id), item_id)
        .await?
        .map(decode)
        .transpose()
}

pub async fn add_item(store: &dyn Store, org_id: &str, mut item: Item) -> Result<String, AppError> {
    item.found_at = Utc::now();

    Ok(store.add(&items_of(org_id), encode(&item)?).await?)
}

#[derive(Serialize, Deserialize, Default, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide_question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide_answer: Option<String>,
}

pub async fn update_item(
    store: &dyn Store,
    org_id: &str,
    item_id: &str,
    patch: &ItemPatch,
) -> Result<(), AppError> {
    store
        .update(&items_of(org_id), item_id, encode(patch)?)
        .await
        .map_err(Into::into)
}

pub async fn delete_item(store: &dyn Store, org_id: &str, item_id: &str) -> Result<(), AppError> {
    store
        .delete(&items_of(org_id), item_id)
        .await
        .map_err(Into::into)
}

// --- Members ---

pub async fn list_members(store: &dyn Store, org_id: &str) -> Result<Vec<Member>, AppError> {
    decode_all(store.list(&members_of(org_id)).await?)
}

/// Document key is the user id, so the lookup is a single get rather than
/// an equality-filtered scan.
pub async fn get_member(
    store: &dyn Store,
    org_id: &str,
    user_id: &str,
) -> Result<Option<Member>, AppError> {
    store
        .get(&members_of(org_id), user_id)
        .await?
        .map(decode)
        .transpose()
}

/// Upsert keyed by user id. A re-application overwrites the previous
/// membership document instead of creating a second one.
pub async fn set_member(
    store: &dyn Store,
    org_id: &str,
    user_id: &str,
    role: Role,
    status: ApplicationStatus,
) -> Result<(), AppError> {
    let member = Member {
        id: user_id.to_string(),
        user_id: user_id.to_string(),
        role,
        application_status: status,
        created_at: Utc::now(),
    };

    store
        .set(&members_of(org_id), user_id, encode(&member)?)
        .await
        .map_err(Into::into)
}

#[derive(Serialize, Deserialize, Default, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MemberPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_status: Option<ApplicationStatus>,
}

pub async fn update_member(
    store: &dyn Store,
    org_id: &str,
    member_id: &str,
    patch: &MemberPatch,
) -> Result<(), AppError> {
    store
        .update(&members_of(org_id), member_id, encode(patch)?)
        .await
        .map_err(Into::into)
}

// --- Requests (missing-item reports) ---

pub async fn list_requests(store: &dyn Store, org_id: &str) -> Result<Vec<Request>, AppError> {
    decode_all(store.list(&requests_of(org_id)).await?)
}

pub async fn add_request(
    store: &dyn Store,
    org_id: &str,
    mut request: Request,
) -> Result<String, AppError> {
    request.created_at = Utc::now();

    Ok(store.add(&requests_of(org_id), encode(&request)?).await?)
}

// --- Users ---

pub async fn get_user(store: &dyn Store, user_id: &str) -> Result<Option<User>, AppError> {
    store.get(USERS, user_id).await?.map(decode).transpose()
}

/// Upsert the profile. Existing profiles keep their creation time; the
/// display name and email follow the identity provider on every sign-in.
pub async fn create_or_update_user(
    store: &dyn Store,
    user_id: &str,
    email: &str,
    display_name: Option<&str>,
) -> Result<(), AppError> {
    if store.get(USERS, user_id).await?.is_some() {
        let patch = serde_json::json!({
            "email": email,
            "displayName": display_name,
        });

        return store.update(USERS, user_id, patch).await.map_err(Into::into);
    }

    let user = User {
        id: user_id.to_string(),
        display_name: display_name.map(str::to_string),
        email: email.to_string(),
        created_at: Utc::now(),
    };

    store
        .set(USERS, user_id, encode(&user)?)
        .await
        .map_err(Into::into)
}

// --- Claims ---

pub async fn get_claim(store: &dyn Store, claim_id: &str) -> Result<Option<Claim>, AppError> {
    store.get(CLAIMS, claim_id).await?.map(decode).transpose()
}

pub async fn list_claims(store: &dyn Store) -> Result<Vec<Claim>, AppError> {
    decode_all(store.list(CLAIMS).await?)
}

pub async fn claims_by_item(store: &dyn Store, item_id: &str) -> Result<Vec<Claim>, AppError> {
    let claims = list_claims(store).await?;

    Ok(claims
        .into_iter()
        .filter(|claim| claim.item_id == item_id)
        .collect())
}

pub async fn claims_by_user(store: &dyn Store, user_id: &str) -> Result<Vec<Claim>, AppError> {
    let claims = list_claims(store).await?;

    Ok(claims
        .into_iter()
        .filter(|claim| claim.user_id == user_id)
        .collect())
}

pub async fn add_claim(store: &dyn Store, mut claim: Claim) -> Result<String, AppError> {
    claim.created_at = Utc::now();

    Ok(store.add(CLAIMS, encode(&claim)?).await?)
}

#[derive(Serialize, Deserialize, Default, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ClaimPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

pub async fn update_claim(
    store: &dyn Store,
    claim_id: &str,
    patch: &ClaimPatch,
) -> Result<(), AppError> {
    store
        .update(CLAIMS, claim_id, encode(patch)?)
        .await
        .map_err(Into::into)
}

// --- Applications ---

pub async fn user_applications(
    store: &dyn Store,
    user_id: &str,
) -> Result<Vec<Application>, AppError> {
    decode_all(store.list(&applications_of(user_id)).await?)
}

pub async fn add_application(
    store: &dyn Store,
    user_id: &str,
    mut application: Application,
) -> Result<String, AppError> {
    application.created_at = Utc::now();

    Ok(store
        .add(&applications_of(user_id), encode(&application)?)
        .await?)
}

// --- Accounts (auth adapter) ---

pub async fn get_account(store: &dyn Store, email: &str) -> Result<Option<Account>, AppError> {
    store.get(ACCOUNTS, email).await?.map(decode).transpose()
}

pub async fn set_account(
    store: &dyn Store,
    email: &str,
    account: &Account,
) -> Result<(), AppError> {
    store
        .set(ACCOUNTS, email, encode(account)?)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::store::MemoryStore;

    fn sample_item(location_id: &str) -> Item {
        Item {
            id: String::new(),
            name: "Red Water Bottle".to_string(),
            description: Some("Standard red plastic bottle with a white lid.".to_string()),
            location_id: location_id.to_string(),
            image_url: None,
            hide_question: None,
            hide_answer: None,
            found_at: Utc.timestamp_opt(0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn add_item_stamps_server_time() {
        let store = MemoryStore::new();

        let before = Utc::now();
        let id = add_item(&store, "org-1", sample_item("loc-1")).await.unwrap();
        let item = get_item(&store, "org-1", &id).await.unwrap().unwrap();

        // Caller-supplied epoch timestamp was ignored.
        assert!(item.found_at >= before);
        assert_eq!(item.id, id);
    }

    #[tokio::test]
    async fn deleting_a_location_leaves_dangling_item_references() {
        let store = MemoryStore::new();

        let location = Location {
            id: String::new(),
            name: "Gym".to_string(),
            description: None,
            point: None,
        };
        let location_id = add_location(&store, "org-1", &location).await.unwrap();
        let item_id = add_item(&store, "org-1", sample_item(&location_id))
            .await
            .unwrap();

        delete_location(&store, "org-1", &location_id).await.unwrap();

        // The item survives; its reference now resolves to nothing.
        let item = get_item(&store, "org-1", &item_id).await.unwrap().unwrap();
        assert_eq!(item.location_id, location_id);
        assert!(get_location(&store, "org-1", &location_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn set_member_overwrites_the_pair() {
        let store = MemoryStore::new();

        set_member(&store, "org-1", "user-1", Role::Admin, ApplicationStatus::Pending)
            .await
            .unwrap();
        set_member(&store, "org-1", "user-1", Role::Regular, ApplicationStatus::Pending)
            .await
            .unwrap();

        let members = list_members(&store, "org-1").await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].role, Role::Regular);
    }

    #[tokio::test]
    async fn user_upsert_keeps_creation_time() {
        let store = MemoryStore::new();

        create_or_update_user(&store, "user-1", "a@branham.edu", Some("A"))
            .await
            .unwrap();
        let first = get_user(&store, "user-1").await.unwrap().unwrap();

        create_or_update_user(&store, "user-1", "a@branham.edu", Some("Alice"))
            .await
            .unwrap();
        let second = get_user(&store, "user-1").await.unwrap().unwrap();

        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.display_name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn claims_filter_by_item_and_user() {
        let store = MemoryStore::new();

        let claim = Claim {
            id: String::new(),
            organization_id: "org-1".to_string(),
            item_id: "item-1".to_string(),
            user_id: "user-1".to_string(),
            evidence: Some("It has my name on the lid".to_string()),
            answer: None,
            created_at: Utc::now(),
        };
        add_claim(&store, claim.clone()).await.unwrap();
        add_claim(
            &store,
            Claim {
                user_id: "user-2".to_string(),
                ..claim
            },
        )
        .await
        .unwrap();

        assert_eq!(claims_by_item(&store, "item-1").await.unwrap().len(), 2);
        assert_eq!(claims_by_user(&store, "user-2").await.unwrap().len(), 1);
        assert!(claims_by_user(&store, "user-3").await.unwrap().is_empty());
    }
}
