//! Documentation of a campus lost-and-found platform.
//!
//! Students report or search for lost items, organization admins catalog
//! found items and campus locations, and a site-wide owner role vets new
//! organizations before they appear publicly.
//!
//!
//!
//! # General Infrastructure
//! - One Rust backend in front of a Redis instance acting as the document store
//! - Documents are JSON blobs in one Redis hash per collection, field = document id
//! - Every privileged call re-derives the caller's role from the store; nothing
//!   trusts a client-side cache
//! - Search is recomputed in-process per request over the caller's items; no
//!   search engine, no index to keep in sync
//!
//!
//!
//! # Approval Flow
//!
//! - A user registers an organization and becomes its superadmin, both pending
//! - The site owner (presence in the AppAdmins allow-list) approves or denies
//! - Approval flips the organization and its founder in two independent writes;
//!   a failure in between is surfaced to the caller, never hidden
//! - Further users apply to approved organizations and are ruled on by that
//!   organization's own admins
//!
//!
//!
//! # Notes
//!
//! ## Redis as a document store
//! The dataset is small (tens to low hundreds of items per organization), so
//! a hash per collection gives O(1) document lookups and one HGETALL per
//! listing without running a second database. There are no cross-document
//! transactions; multi-write operations can land partially and the error
//! taxonomy makes that state visible instead of pretending otherwise.
use std::time::Duration;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{get, patch, post},
    Router,
};

use signal::{
    ctrl_c,
    unix::{signal, SignalKind},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod membership;
pub mod models;
pub mod repo;
pub mod routes;
pub mod search;
pub mod state;
pub mod store;
pub mod utils;

use routes::{
    add_claim_handler, add_item_handler, add_location_handler, add_request_handler,
    answer_claim_handler, apply_handler, approve_member_handler, approve_organization_handler,
    delete_item_handler, delete_location_handler, deny_member_handler, deny_organization_handler,
    get_item_handler, list_claims_handler, list_items_handler, list_locations_handler,
    list_members_handler, list_organizations_handler, list_requests_handler,
    my_applications_handler, my_organizations_handler, pending_organizations_handler,
    register_organization_handler, search_items_handler, signin_handler, signup_handler,
    update_item_handler, update_location_handler,
};
use state::AppState;

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await;

    info!("Starting server...");

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    let app = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/signin", post(signin_handler))
        .route(
            "/organizations",
            get(list_organizations_handler).post(register_organization_handler),
        )
        .route("/organizations/pending", get(pending_organizations_handler))
        .route(
            "/organizations/{org_id}/approve",
            post(approve_organization_handler),
        )
        .route(
            "/organizations/{org_id}/deny",
            post(deny_organization_handler),
        )
        .route("/organizations/{org_id}/applications", post(apply_handler))
        .route(
            "/organizations/{org_id}/members",
            get(list_members_handler),
        )
        .route(
            "/organizations/{org_id}/members/{member_id}/approve",
            post(approve_member_handler),
        )
        .route(
            "/organizations/{org_id}/members/{member_id}/deny",
            post(deny_member_handler),
        )
        .route(
            "/organizations/{org_id}/locations",
            get(list_locations_handler).post(add_location_handler),
        )
        .route(
            "/organizations/{org_id}/locations/{location_id}",
            patch(update_location_handler).delete(delete_location_handler),
        )
        .route(
            "/organizations/{org_id}/items",
            get(list_items_handler).post(add_item_handler),
        )
        .route(
            "/organizations/{org_id}/items/{item_id}",
            get(get_item_handler)
                .patch(update_item_handler)
                .delete(delete_item_handler),
        )
        .route(
            "/organizations/{org_id}/requests",
            get(list_requests_handler).post(add_request_handler),
        )
        .route("/items", get(search_items_handler))
        .route(
            "/claims",
            get(list_claims_handler).post(add_claim_handler),
        )
        .route("/claims/{claim_id}", patch(answer_claim_handler))
        .route("/me/organizations", get(my_organizations_handler))
        .route("/me/applications", get(my_applications_handler))
        .layer(cors)
        .with_state(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
