use chrono::{DateTime, Utc};

use super::model::{Role, UpdateProfilePayload, User};
use crate::error::ServiceError;
use crate::store::KvStore;

pub const USER_PREFIX: &str = "user:";

pub fn user_key(user_id: &str) -> String {
    format!("{}{}", USER_PREFIX, user_id)
}

/// Get a profile; `None` when the auth provider knows the user but the store does not
pub async fn get_profile(store: &dyn KvStore, user_id: &str) -> Result<Option<User>, ServiceError> {
    match store.get(&user_key(user_id)).await? {
        Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
            ServiceError::Internal(format!("Stored profile for {} is malformed: {}", user_id, e))
        }),
        None => Ok(None),
    }
}

pub async fn save_profile(store: &dyn KvStore, user: &User) -> Result<(), ServiceError> {
    let value = serde_json::to_value(user)
        .map_err(|e| ServiceError::Internal(format!("Failed to encode profile: {}", e)))?;
    store.set(&user_key(&user.id), value).await?;
    Ok(())
}

/// Create user profile after signup (or first sign-in); returns the existing one when present.
/// Name falls back to the local part of the e-mail address.
pub async fn ensure_profile(
    store: &dyn KvStore,
    user_id: &str,
    email: &str,
    name: Option<&str>,
    role: Role,
    now: DateTime<Utc>,
) -> Result<User, ServiceError> {
    if let Some(existing) = get_profile(store, user_id).await? {
        return Ok(existing);
    }

    let name = match name.map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => email.split('@').next().unwrap_or("User").to_string(),
    };

    let user = User {
        id: user_id.to_string(),
        email: email.to_string(),
        name,
        role,
        avatar: None,
        neighborhood: None,
        created_at: now,
    };
    save_profile(store, &user).await?;
    tracing::info!("Created profile for {} ({:?})", user.id, user.role);
    Ok(user)
}

/// Update user profile; only the fields present in the payload change
pub async fn update_profile(
    store: &dyn KvStore,
    user_id: &str,
    payload: UpdateProfilePayload,
) -> Result<User, ServiceError> {
    let mut user = get_profile(store, user_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

    if let Some(name) = payload.name {
        if name.trim().is_empty() {
            return Err(ServiceError::Validation("Name cannot be empty".to_string()));
        }
        user.name = name.trim().to_string();
    }
    if let Some(avatar) = payload.avatar {
        user.avatar = Some(avatar);
    }
    if let Some(neighborhood) = payload.neighborhood {
        user.neighborhood = Some(neighborhood);
    }

    save_profile(store, &user).await?;
    Ok(user)
}
