//! # Routes
//!
//! Thin handlers: decode the payload, resolve the caller, re-check their
//! capability against the store, call the repository, answer JSON. All
//! authorization happens here on the server for every request; the client
//! is never trusted with a cached role.
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{self, AuthUser},
    error::AppError,
    membership::{self, NewOrganization},
    models::{ApplicationStatus, Claim, GeoPoint, Item, Location, Member, Request, Role},
    repo,
    search::{self, Searchable},
    state::AppState,
};

const UNKNOWN_LOCATION: &str = "Unknown location";

// --- Auth ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsPayload {
    email: String,
    password: String,
    display_name: Option<String>,
}

pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CredentialsPayload>,
) -> Result<impl IntoResponse, AppError> {
    let session = auth::sign_up(
        state.store.as_ref(),
        &state.config.jwt_secret,
        &payload.email,
        &payload.password,
        payload.display_name.as_deref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn signin_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CredentialsPayload>,
) -> Result<impl IntoResponse, AppError> {
    let session = auth::sign_in(
        state.store.as_ref(),
        &state.config.jwt_secret,
        &payload.email,
        &payload.password,
        payload.display_name.as_deref(),
    )
    .await?;

    Ok(Json(session))
}

// --- Organizations ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedResponse {
    id: String,
}

/// Public "find your organization" listing: approved organizations only.
pub async fn list_organizations_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let orgs = repo::list_approved_organizations(state.store.as_ref()).await?;

    Ok(Json(orgs))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOrganizationPayload {
    name: String,
    address: Option<String>,
    point: Option<GeoPoint>,
}

pub async fn register_organization_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<RegisterOrganizationPayload>,
) -> Result<impl IntoResponse, AppError> {
    let org_id = membership::register_organization(
        state.store.as_ref(),
        &user.id,
        NewOrganization {
            name: payload.name,
            address: payload.address,
            point: payload.point,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(CreatedResponse { id: org_id })))
}

pub async fn pending_organizations_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    membership::require_site_owner(state.store.as_ref(), &user.id).await?;

    let orgs = repo::pending_organizations(state.store.as_ref()).await?;

    Ok(Json(orgs))
}

pub async fn approve_organization_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(org_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    membership::approve_organization(state.store.as_ref(), &user.id, &org_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn deny_organization_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(org_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    membership::deny_organization(state.store.as_ref(), &user.id, &org_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// --- Applications & members ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPayload {
    role: Role,
    message: Option<String>,
}

pub async fn apply_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(org_id): Path<String>,
    Json(payload): Json<ApplyPayload>,
) -> Result<impl IntoResponse, AppError> {
    let member_id = membership::apply_to_organization(
        state.store.as_ref(),
        &user.id,
        &org_id,
        payload.role,
        payload.message,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(CreatedResponse { id: member_id })))
}

pub async fn list_members_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(org_id): Path<String>,
) -> Result<Json<Vec<Member>>, AppError> {
    membership::require_administrator(state.store.as_ref(), &user.id, &org_id).await?;

    let members = repo::list_members(state.store.as_ref(), &org_id).await?;

    Ok(Json(members))
}

pub async fn approve_member_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((org_id, member_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    membership::approve_member(state.store.as_ref(), &user.id, &org_id, &member_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn deny_member_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((org_id, member_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    membership::deny_member(state.store.as_ref(), &user.id, &org_id, &member_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// --- Locations ---

pub async fn list_locations_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(org_id): Path<String>,
) -> Result<Json<Vec<Location>>, AppError> {
    membership::require_member(state.store.as_ref(), &user.id, &org_id).await?;

    let locations = repo::list_locations(state.store.as_ref(), &org_id).await?;

    Ok(Json(locations))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLocationPayload {
    name: String,
    description: Option<String>,
    point: Option<GeoPoint>,
}

pub async fn add_location_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(org_id): Path<String>,
    Json(payload): Json<NewLocationPayload>,
) -> Result<impl IntoResponse, AppError> {
    membership::require_administrator(state.store.as_ref(), &user.id, &org_id).await?;
    crate::models::require_non_empty("location name", &payload.name)?;

    let location = Location {
        id: String::new(),
        name: payload.name,
        description: payload.description,
        point: payload.point,
    };
    let id = repo::add_location(state.store.as_ref(), &org_id, &location).await?;

    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

pub async fn update_location_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((org_id, location_id)): Path<(String, String)>,
    Json(patch): Json<repo::LocationPatch>,
) -> Result<impl IntoResponse, AppError> {
    membership::require_administrator(state.store.as_ref(), &user.id, &org_id).await?;

    repo::update_location(state.store.as_ref(), &org_id, &location_id, &patch).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_location_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((org_id, location_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    membership::require_administrator(state.store.as_ref(), &user.id, &org_id).await?;

    // No cascade: items referencing this location keep a dangling id and
    // readers fall back to a placeholder name.
    repo::delete_location(state.store.as_ref(), &org_id, &location_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// --- Items ---

pub async fn list_items_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(org_id): Path<String>,
) -> Result<Json<Vec<Item>>, AppError> {
    membership::require_member(state.store.as_ref(), &user.id, &org_id).await?;

    let items = repo::list_items(state.store.as_ref(), &org_id).await?;

    Ok(Json(items))
}

pub async fn get_item_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((org_id, item_id)): Path<(String, String)>,
) -> Result<Json<Item>, AppError> {
    membership::require_member(state.store.as_ref(), &user.id, &org_id).await?;

    let item = repo::get_item(state.store.as_ref(), &org_id, &item_id)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(item))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItemPayload {
    name: String,
    description: Option<String>,
    location_id: String,
    image_url: Option<String>,
    hide_question: Option<String>,
    hide_answer: Option<String>,
}

pub async fn add_item_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(org_id): Path<String>,
    Json(payload): Json<NewItemPayload>,
) -> Result<impl IntoResponse, AppError> {
    membership::require_administrator(state.store.as_ref(), &user.id, &org_id).await?;
    crate::models::require_non_empty("item name", &payload.name)?;
    crate::models::require_non_empty("location", &payload.location_id)?;

    // The location must resolve within this same organization.
    repo::get_location(state.store.as_ref(), &org_id, &payload.location_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let item = Item {
        id: String::new(),
        name: payload.name,
        description: payload.description,
        location_id: payload.location_id,
        image_url: payload.image_url,
        hide_question: payload.hide_question,
        hide_answer: payload.hide_answer,
        found_at: chrono::Utc::now(),
    };
    let id = repo::add_item(state.store.as_ref(), &org_id, item).await?;

    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

pub async fn update_item_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((org_id, item_id)): Path<(String, String)>,
    Json(patch): Json<repo::ItemPatch>,
) -> Result<impl IntoResponse, AppError> {
    membership::require_administrator(state.store.as_ref(), &user.id, &org_id).await?;

    repo::update_item(state.store.as_ref(), &org_id, &item_id, &patch).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_item_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((org_id, item_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    membership::require_administrator(state.store.as_ref(), &user.id, &org_id).await?;

    repo::delete_item(state.store.as_ref(), &org_id, &item_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// --- Search ---

#[derive(Deserialize)]
pub struct SearchParams {
    q: Option<String>,
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DisplayItem {
    pub id: String,
    pub name: String,
    pub location: String,
    pub date: String,
    pub description: String,
    pub organization_id: String,
}

impl Searchable for DisplayItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn location(&self) -> &str {
        &self.location
    }
}

/// Aggregate items across every organization the caller is an approved
/// member of, resolve location names, then fuzzy-rank against `q`.
/// Re-runs the full ranking per request; candidate sets are small.
pub async fn search_items_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<DisplayItem>>, AppError> {
    let store = state.store.as_ref();
    let memberships = membership::resolve_user_organizations(store, &user.id).await?;

    let mut candidates = Vec::new();
    for (org_id, member) in memberships {
        if member.application_status != ApplicationStatus::Approved {
            continue;
        }

        for item in repo::list_items(store, &org_id).await? {
            // A failed or dangling location lookup degrades to a
            // placeholder instead of failing the whole page.
            let location = match repo::get_location(store, &org_id, &item.location_id).await {
                Ok(Some(location)) => location.name,
                _ => UNKNOWN_LOCATION.to_string(),
            };

            candidates.push(DisplayItem {
                id: item.id,
                name: item.name,
                location,
                date: item.found_at.format("%Y-%m-%d").to_string(),
                description: item.description.unwrap_or_default(),
                organization_id: org_id.clone(),
            });
        }
    }

    let query = params.q.unwrap_or_default();

    Ok(Json(search::rank(&candidates, &query)))
}

// --- Requests (missing-item reports) ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequestPayload {
    item_name: String,
    last_seen_location: Option<String>,
    description: Option<String>,
}

pub async fn add_request_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(org_id): Path<String>,
    Json(payload): Json<NewRequestPayload>,
) -> Result<impl IntoResponse, AppError> {
    crate::models::require_non_empty("item name", &payload.item_name)?;

    repo::get_organization(state.store.as_ref(), &org_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let request = Request {
        id: String::new(),
        user_id: user.id,
        item_name: payload.item_name,
        last_seen_location: payload.last_seen_location,
        description: payload.description,
        created_at: chrono::Utc::now(),
    };
    let id = repo::add_request(state.store.as_ref(), &org_id, request).await?;

    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

pub async fn list_requests_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(org_id): Path<String>,
) -> Result<Json<Vec<Request>>, AppError> {
    membership::require_administrator(state.store.as_ref(), &user.id, &org_id).await?;

    let requests = repo::list_requests(state.store.as_ref(), &org_id).await?;

    Ok(Json(requests))
}

// --- Claims ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClaimPayload {
    organization_id: String,
    item_id: String,
    evidence: Option<String>,
}

pub async fn add_claim_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<NewClaimPayload>,
) -> Result<impl IntoResponse, AppError> {
    // The claimed item must exist at claim time; it may dangle later if
    // an admin deletes it.
    repo::get_item(state.store.as_ref(), &payload.organization_id, &payload.item_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let claim = Claim {
        id: String::new(),
        organization_id: payload.organization_id,
        item_id: payload.item_id,
        user_id: user.id,
        evidence: payload.evidence,
        answer: None,
        created_at: chrono::Utc::now(),
    };
    let id = repo::add_claim(state.store.as_ref(), claim).await?;

    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimParams {
    item_id: Option<String>,
    user_id: Option<String>,
}

pub async fn list_claims_handler(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(params): Query<ClaimParams>,
) -> Result<Json<Vec<Claim>>, AppError> {
    let store = state.store.as_ref();

    let claims = match (params.item_id, params.user_id) {
        (Some(item_id), _) => repo::claims_by_item(store, &item_id).await?,
        (None, Some(user_id)) => repo::claims_by_user(store, &user_id).await?,
        (None, None) => repo::list_claims(store).await?,
    };

    Ok(Json(claims))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerClaimPayload {
    answer: String,
}

/// Only an admin of the claimed item's organization may answer.
pub async fn answer_claim_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(claim_id): Path<String>,
    Json(payload): Json<AnswerClaimPayload>,
) -> Result<impl IntoResponse, AppError> {
    let store = state.store.as_ref();

    let claim = repo::get_claim(store, &claim_id)
        .await?
        .ok_or(AppError::NotFound)?;

    membership::require_administrator(store, &user.id, &claim.organization_id).await?;

    repo::update_claim(
        store,
        &claim_id,
        &repo::ClaimPatch {
            answer: Some(payload.answer),
        },
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

// --- Profile ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOrganization {
    pub organization_id: String,
    pub member: Member,
}

pub async fn my_organizations_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<UserOrganization>>, AppError> {
    let memberships = membership::resolve_user_organizations(state.store.as_ref(), &user.id).await?;

    Ok(Json(
        memberships
            .into_iter()
            .map(|(organization_id, member)| UserOrganization {
                organization_id,
                member,
            })
            .collect(),
    ))
}

pub async fn my_applications_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let applications = repo::user_applications(state.store.as_ref(), &user.id).await?;

    Ok(Json(applications))
}
