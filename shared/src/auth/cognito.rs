use async_trait::async_trait;
use aws_sdk_cognitoidentityprovider::{
    operation::{get_user::GetUserError, initiate_auth::InitiateAuthError, sign_up::SignUpError},
    types::{AttributeType, AuthFlowType},
    Client as CognitoClient,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{AuthError, AuthProvider, Identity, Session};
use crate::config::CognitoConfig;

type HmacSha256 = Hmac<Sha256>;

/// `SECRET_HASH` for app clients with a secret: base64(HMAC-SHA256(secret, username + client id))
pub fn secret_hash(username: &str, client_id: &str, client_secret: &str) -> Result<String, AuthError> {
    let mut mac = HmacSha256::new_from_slice(client_secret.as_bytes())
        .map_err(|e| AuthError::Provider(format!("Invalid client secret: {}", e)))?;
    mac.update(username.as_bytes());
    mac.update(client_id.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

pub struct CognitoAuth {
    client: CognitoClient,
    config: CognitoConfig,
}

impl CognitoAuth {
    pub fn new(client: CognitoClient, config: CognitoConfig) -> Self {
        Self { client, config }
    }

    fn hash_for(&self, username: &str) -> Result<Option<String>, AuthError> {
        self.config
            .client_secret
            .as_deref()
            .map(|secret| secret_hash(username, &self.config.client_id, secret))
            .transpose()
    }
}

#[async_trait]
impl AuthProvider for CognitoAuth {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = email.trim().to_lowercase();
        let email_attr = AttributeType::builder()
            .name("email")
            .value(&email)
            .build()
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        let output = self
            .client
            .sign_up()
            .client_id(&self.config.client_id)
            .username(&email)
            .password(password)
            .user_attributes(email_attr)
            .set_secret_hash(self.hash_for(&email)?)
            .send()
            .await
            .map_err(|e| match e.into_service_error() {
                SignUpError::UsernameExistsException(_) => AuthError::UserExists,
                SignUpError::InvalidPasswordException(e) => {
                    AuthError::InvalidInput(e.message().unwrap_or("Invalid password").to_string())
                }
                SignUpError::InvalidParameterException(e) => {
                    AuthError::InvalidInput(e.message().unwrap_or("Invalid parameter").to_string())
                }
                other => AuthError::Provider(other.to_string()),
            })?;

        let user_id = output.user_sub().to_string();

        // No e-mail server is configured: confirm right away
        self.client
            .admin_confirm_sign_up()
            .user_pool_id(&self.config.user_pool_id)
            .username(&email)
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("Failed to confirm {}: {}", email, e.into_service_error())))?;

        tracing::info!("Signed up and confirmed {} ({})", email, user_id);
        Ok(Identity { user_id, email })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<(Identity, Session), AuthError> {
        let email = email.trim().to_lowercase();

        let mut request = self
            .client
            .initiate_auth()
            .client_id(&self.config.client_id)
            .auth_flow(AuthFlowType::UserPasswordAuth)
            .auth_parameters("USERNAME", &email)
            .auth_parameters("PASSWORD", password);
        if let Some(hash) = self.hash_for(&email)? {
            request = request.auth_parameters("SECRET_HASH", hash);
        }

        let output = request.send().await.map_err(|e| match e.into_service_error() {
            InitiateAuthError::NotAuthorizedException(_)
            | InitiateAuthError::UserNotFoundException(_)
            | InitiateAuthError::UserNotConfirmedException(_) => AuthError::InvalidCredentials,
            other => AuthError::Provider(other.to_string()),
        })?;

        let result = output
            .authentication_result()
            .ok_or_else(|| AuthError::Provider("Sign-in requires an additional challenge".to_string()))?;
        let access_token = result
            .access_token()
            .ok_or_else(|| AuthError::Provider("No access token in auth result".to_string()))?
            .to_string();

        let session = Session {
            access_token,
            refresh_token: result.refresh_token().map(str::to_string),
        };
        let identity = self.resolve(&session.access_token).await?;
        Ok((identity, session))
    }

    async fn resolve(&self, access_token: &str) -> Result<Identity, AuthError> {
        let output = self
            .client
            .get_user()
            .access_token(access_token)
            .send()
            .await
            .map_err(|e| match e.into_service_error() {
                GetUserError::NotAuthorizedException(_) | GetUserError::UserNotFoundException(_) => {
                    AuthError::InvalidToken
                }
                other => AuthError::Provider(other.to_string()),
            })?;

        let attribute = |name: &str| {
            output
                .user_attributes()
                .iter()
                .find(|a| a.name() == name)
                .and_then(|a| a.value())
                .map(str::to_string)
        };

        let user_id = attribute("sub").unwrap_or_else(|| output.username().to_string());
        let email = attribute("email").unwrap_or_else(|| output.username().to_string());
        Ok(Identity { user_id, email })
    }
}
