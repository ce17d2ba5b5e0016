//! # Identity
//!
//! Email/password identity adapter. Credentials live in the `Accounts`
//! collection keyed by normalized email (bcrypt hashes only); sessions are
//! stateless HS256 bearer tokens, so signing out is token disposal on the
//! client. The profile in `Users` is upserted on every successful sign-in.
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::AppError,
    models::Account,
    repo,
    state::AppState,
    store::{new_document_id, Store},
};

const TOKEN_TTL_SECS: usize = 60 * 60 * 24;

#[derive(Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub exp: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user_id: String,
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::InternalError(Box::new(e)))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    bcrypt::verify(password, hash).map_err(|e| AppError::InternalError(Box::new(e)))
}

pub fn create_token(user_id: &str, secret: &str) -> Result<String, AppError> {
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalError(Box::new(e)))?
        .as_secs() as usize
        + TOKEN_TTL_SECS;

    let claims = TokenClaims {
        sub: user_id.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalError(Box::new(e)))
}

pub fn validate_token(token: &str, secret: &str) -> Result<TokenClaims, AppError> {
    decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthenticated)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn sign_up(
    store: &dyn Store,
    secret: &str,
    email: &str,
    password: &str,
    display_name: Option<&str>,
) -> Result<Session, AppError> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "email and password are required".to_string(),
        ));
    }

    if repo::get_account(store, &email).await?.is_some() {
        return Err(AppError::Validation(
            "an account already exists for this email".to_string(),
        ));
    }

    let user_id = new_document_id();
    let account = Account {
        id: email.clone(),
        user_id: user_id.clone(),
        password_hash: hash_password(password)?,
        created_at: Utc::now(),
    };
    repo::set_account(store, &email, &account).await?;

    repo::create_or_update_user(store, &user_id, &email, display_name).await?;

    Ok(Session {
        token: create_token(&user_id, secret)?,
        user_id,
    })
}

pub async fn sign_in(
    store: &dyn Store,
    secret: &str,
    email: &str,
    password: &str,
    display_name: Option<&str>,
) -> Result<Session, AppError> {
    let email = normalize_email(email);

    let account = repo::get_account(store, &email)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    if !verify_password(password, &account.password_hash)? {
        return Err(AppError::Unauthenticated);
    }

    // Profile follows the identity provider on every sign-in.
    repo::create_or_update_user(store, &account.user_id, &email, display_name).await?;

    Ok(Session {
        token: create_token(&account.user_id, secret)?,
        user_id: account.user_id,
    })
}

/// The authenticated caller, resolved per request from the bearer token
/// and the `Users` collection.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthenticated)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthenticated)?;

        let claims = validate_token(token, &state.config.jwt_secret)?;

        let user = repo::get_user(state.store.as_ref(), &claims.sub)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        Ok(AuthUser {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const SECRET: &str = "test-secret";

    #[tokio::test]
    async fn sign_up_then_sign_in_round_trips() {
        let store = MemoryStore::new();

        let session = sign_up(&store, SECRET, "A@Branham.edu", "hunter2", Some("Alice"))
            .await
            .unwrap();

        let signin = sign_in(&store, SECRET, "a@branham.edu", "hunter2", Some("Alice"))
            .await
            .unwrap();
        assert_eq!(signin.user_id, session.user_id);

        let claims = validate_token(&signin.token, SECRET).unwrap();
        assert_eq!(claims.sub, session.user_id);

        let user = repo::get_user(&store, &session.user_id).await.unwrap().unwrap();
        assert_eq!(user.email, "a@branham.edu");
        assert_eq!(user.display_name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn wrong_password_is_unauthenticated() {
        let store = MemoryStore::new();
        sign_up(&store, SECRET, "a@branham.edu", "hunter2", None)
            .await
            .unwrap();

        assert!(matches!(
            sign_in(&store, SECRET, "a@branham.edu", "wrong", None).await,
            Err(AppError::Unauthenticated)
        ));
        assert!(matches!(
            sign_in(&store, SECRET, "nobody@branham.edu", "hunter2", None).await,
            Err(AppError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn duplicate_sign_up_is_rejected() {
        let store = MemoryStore::new();
        sign_up(&store, SECRET, "a@branham.edu", "hunter2", None)
            .await
            .unwrap();

        assert!(matches!(
            sign_up(&store, SECRET, "a@branham.edu", "other", None).await,
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let token = create_token("user-1", SECRET).unwrap();

        assert!(validate_token(&token, "other-secret").is_err());
        assert!(validate_token("not-a-token", SECRET).is_err());
    }
}
