use chrono::Utc;
use grofvuil_atoms::http::respond;
use grofvuil_atoms::users::{self, Role, UpdateProfilePayload, User};
use grofvuil_atoms::{KvStore, ServiceError};
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Deserialize;

use crate::auth::AuthProvider;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

fn check_credentials(email: &str, password: &str) -> Result<(), ServiceError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ServiceError::Validation("A valid email address is required".to_string()));
    }
    if password.is_empty() {
        return Err(ServiceError::Validation("Password is required".to_string()));
    }
    Ok(())
}

/// Register a citizen account. The role is always `user`, whatever the body says.
pub async fn signup(auth: &dyn AuthProvider, store: &dyn KvStore, body: &[u8]) -> Result<Response<Body>, Error> {
    let result = async {
        let req: SignupRequest = serde_json::from_slice(body)?;
        check_credentials(&req.email, &req.password)?;

        let identity = auth.sign_up(&req.email, &req.password).await?;
        let user = users::ensure_profile(
            store,
            &identity.user_id,
            &identity.email,
            req.name.as_deref(),
            Role::User,
            Utc::now(),
        )
        .await?;
        Ok::<_, ServiceError>(serde_json::json!({ "user": user }))
    }
    .await;

    respond(result, StatusCode::OK)
}

/// Sign in; answers the profile plus the session tokens
pub async fn signin(auth: &dyn AuthProvider, store: &dyn KvStore, body: &[u8]) -> Result<Response<Body>, Error> {
    let result = async {
        let req: SigninRequest = serde_json::from_slice(body)?;
        check_credentials(&req.email, &req.password)?;

        let (identity, session) = auth.sign_in(&req.email, &req.password).await?;
        let user = users::ensure_profile(store, &identity.user_id, &identity.email, None, Role::User, Utc::now())
            .await?;
        tracing::info!("{} signed in", user.id);
        Ok::<_, ServiceError>(serde_json::json!({ "user": user, "session": session }))
    }
    .await;

    respond(result, StatusCode::OK)
}

/// HTTP Handler: GET /auth/me
pub fn me(caller: Option<&User>) -> Result<Response<Body>, Error> {
    let result = caller
        .ok_or_else(|| ServiceError::Unauthorized("Unauthorized - no token".to_string()))
        .map(|user| serde_json::json!({ "user": user }));
    respond(result, StatusCode::OK)
}

/// HTTP Handler: PATCH /users/profile
pub async fn update_profile(store: &dyn KvStore, caller: Option<&User>, body: &[u8]) -> Result<Response<Body>, Error> {
    let result = async {
        let user = caller.ok_or_else(|| ServiceError::Unauthorized("Unauthorized - no token".to_string()))?;
        let payload: UpdateProfilePayload = serde_json::from_slice(body)?;
        let updated = users::update_profile(store, &user.id, payload).await?;
        Ok::<_, ServiceError>(serde_json::json!({ "user": updated }))
    }
    .await;

    respond(result, StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::DemoAuth;
    use grofvuil_atoms::store::MemoryKvStore;

    fn json(resp: &Response<Body>) -> serde_json::Value {
        serde_json::from_slice(resp.body()).unwrap()
    }

    #[tokio::test]
    async fn signup_ignores_requested_role() {
        let store = MemoryKvStore::new();
        let auth = DemoAuth::new();
        let body = br#"{"email":"piet@example.nl","password":"geheim123","name":"Piet","role":"admin"}"#;

        let resp = signup(&auth, &store, body).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let user = &json(&resp)["user"];
        assert_eq!(user["role"], "user");
        assert_eq!(user["name"], "Piet");

        let again = signup(&auth, &store, body).await.unwrap();
        assert_eq!(again.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn signin_returns_profile_and_session() {
        let store = MemoryKvStore::new();
        let auth = DemoAuth::with_demo_accounts();
        auth.seed_profiles(&store).await.unwrap();

        let resp = signin(&auth, &store, br#"{"email":"admin@grofvuil.nl","password":"admin123"}"#)
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json(&resp);
        assert_eq!(body["user"]["role"], "admin");
        assert!(body["session"]["accessToken"].as_str().unwrap().starts_with("local-token-"));

        let wrong = signin(&auth, &store, br#"{"email":"admin@grofvuil.nl","password":"nope"}"#)
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let malformed = signin(&auth, &store, b"{").await.unwrap();
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn profile_updates_need_a_caller() {
        let store = MemoryKvStore::new();
        let resp = update_profile(&store, None, br#"{"name":"x"}"#).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(me(None).unwrap().status(), StatusCode::UNAUTHORIZED);
    }
}
