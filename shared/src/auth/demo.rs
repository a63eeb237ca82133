use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use grofvuil_atoms::users::{self, Role};
use grofvuil_atoms::{KvStore, ServiceError};
use tokio::sync::RwLock;

use super::{AuthError, AuthProvider, Identity, Session};

pub const DEMO_TOKEN_PREFIX: &str = "local-token-";

/// Built-in accounts: (id, email, password, name, role)
pub const DEMO_ACCOUNTS: [(&str, &str, &str, &str, Role); 3] = [
    ("demo-admin", "admin@grofvuil.nl", "admin123", "Admin Gebruiker", Role::Admin),
    ("demo-worker", "werknemer@grofvuil.nl", "werk123", "Werknemer Jan", Role::Worker),
    ("demo-user", "user@example.nl", "user123", "Normale Gebruiker", Role::User),
];

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone)]
struct Account {
    user_id: String,
    password: String,
}

/// In-process provider for local runs and tests. Accounts live for the life of the process;
/// signing in again replaces the account's previous token.
#[derive(Default)]
pub struct DemoAuth {
    accounts: RwLock<HashMap<String, Account>>,
    tokens: RwLock<HashMap<String, Identity>>,
}

impl DemoAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_demo_accounts() -> Self {
        let accounts = DEMO_ACCOUNTS
            .iter()
            .map(|(id, email, password, _, _)| {
                (
                    email.to_string(),
                    Account {
                        user_id: id.to_string(),
                        password: password.to_string(),
                    },
                )
            })
            .collect();

        Self {
            accounts: RwLock::new(accounts),
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Store a profile for each built-in account so their roles resolve
    pub async fn seed_profiles(&self, store: &dyn KvStore) -> Result<(), ServiceError> {
        for (id, email, _, name, role) in DEMO_ACCOUNTS {
            users::ensure_profile(store, id, email, Some(name), role, Utc::now()).await?;
        }
        tracing::info!("Seeded {} demo profiles", DEMO_ACCOUNTS.len());
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl AuthProvider for DemoAuth {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidInput(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let email = normalize_email(email);
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&email) {
            return Err(AuthError::UserExists);
        }

        let user_id = uuid::Uuid::new_v4().to_string();
        accounts.insert(
            email.clone(),
            Account {
                user_id: user_id.clone(),
                password: password.to_string(),
            },
        );
        Ok(Identity { user_id, email })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<(Identity, Session), AuthError> {
        let email = normalize_email(email);
        let account = self
            .accounts
            .read()
            .await
            .get(&email)
            .filter(|a| a.password == password)
            .cloned()
            .ok_or(AuthError::InvalidCredentials)?;

        let identity = Identity {
            user_id: account.user_id,
            email,
        };
        let token = format!("{}{}", DEMO_TOKEN_PREFIX, uuid::Uuid::new_v4().simple());
        let mut tokens = self.tokens.write().await;
        // One live session per account
        tokens.retain(|_, owner| owner.user_id != identity.user_id);
        tokens.insert(token.clone(), identity.clone());
        drop(tokens);

        Ok((
            identity,
            Session {
                access_token: token,
                refresh_token: None,
            },
        ))
    }

    async fn resolve(&self, access_token: &str) -> Result<Identity, AuthError> {
        self.tokens
            .read()
            .await
            .get(access_token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}
