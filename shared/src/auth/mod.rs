//! Authentication seam.
//!
//! The backend never checks passwords itself: an [`AuthProvider`] signs users
//! up and in and turns access tokens back into identities. Roles are not part
//! of the identity; they come from the stored profile.

pub mod cognito;
pub mod demo;

use async_trait::async_trait;
use chrono::Utc;
use grofvuil_atoms::users::{self, Role, User};
use grofvuil_atoms::{KvStore, ServiceError};
use lambda_http::http::HeaderMap;
use serde::Serialize;

pub use cognito::CognitoAuth;
pub use demo::DemoAuth;

/// Who a token belongs to, as the auth provider knows it
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User already exists")]
    UserExists,

    #[error("Unauthorized - invalid token")]
    InvalidToken,

    #[error("{0}")]
    InvalidInput(String),

    #[error("auth provider error: {0}")]
    Provider(String),
}

impl From<AuthError> for ServiceError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials | AuthError::InvalidToken => ServiceError::Unauthorized(e.to_string()),
            AuthError::UserExists => ServiceError::Conflict(e.to_string()),
            AuthError::InvalidInput(msg) => ServiceError::Validation(msg),
            AuthError::Provider(msg) => ServiceError::Internal(msg),
        }
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Register and confirm a new account
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<(Identity, Session), AuthError>;

    /// Identity behind an access token
    async fn resolve(&self, access_token: &str) -> Result<Identity, AuthError>;
}

/// Access token from `X-User-Token`, else from `Authorization: Bearer`
pub fn access_token(headers: &HeaderMap) -> Option<&str> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header("X-User-Token").or_else(|| {
        header("Authorization")
            .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    })
}

/// Resolve the calling user. `Ok(None)` without a token; an unknown token is a 401.
/// Users who exist at the provider but not in the store get a fresh `user` profile.
/// A store that cannot answer fails the request; no profile is created then.
pub async fn resolve_caller(
    auth: &dyn AuthProvider,
    store: &dyn KvStore,
    headers: &HeaderMap,
) -> Result<Option<User>, ServiceError> {
    let Some(token) = access_token(headers) else {
        return Ok(None);
    };

    let identity = auth.resolve(token).await?;
    let user = users::ensure_profile(store, &identity.user_id, &identity.email, None, Role::User, Utc::now()).await?;
    Ok(Some(user))
}
