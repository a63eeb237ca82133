pub mod account;
pub mod auth;
pub mod config;

use std::sync::Arc;

use auth::{AuthProvider, CognitoAuth, DemoAuth};
use config::{AuthMode, Config, StoreMode};
use grofvuil_atoms::store::{DynamoKvStore, FallbackKvStore, MemoryKvStore};
use grofvuil_atoms::SharedStore;
use lambda_http::Error;

/// Everything a request handler needs; built once per cold start
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub auth: Arc<dyn AuthProvider>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: SharedStore, auth: Arc<dyn AuthProvider>, config: Config) -> Self {
        Self {
            store,
            auth,
            config: Arc::new(config),
        }
    }

    pub async fn from_env() -> Result<Self, Error> {
        let config = Config::from_env()?;
        Self::from_config(config).await
    }

    pub async fn from_config(config: Config) -> Result<Self, Error> {
        let needs_aws = config.store_mode == StoreMode::Dynamo || config.auth_mode == AuthMode::Cognito;
        let sdk_config = if needs_aws {
            Some(aws_config::load_from_env().await)
        } else {
            None
        };

        let primary: SharedStore = match (&sdk_config, config.store_mode) {
            (Some(sdk), StoreMode::Dynamo) => Arc::new(DynamoKvStore::new(
                aws_sdk_dynamodb::Client::new(sdk),
                config.table_name.clone(),
            )),
            _ => Arc::new(MemoryKvStore::new()),
        };

        let store: SharedStore = if config.local_fallback {
            tracing::info!("Local fallback store enabled");
            Arc::new(FallbackKvStore::new(primary, Arc::new(MemoryKvStore::new())))
        } else {
            primary
        };

        let auth: Arc<dyn AuthProvider> = match (&sdk_config, &config.cognito) {
            (Some(sdk), Some(cognito)) if config.auth_mode == AuthMode::Cognito => Arc::new(CognitoAuth::new(
                aws_sdk_cognitoidentityprovider::Client::new(sdk),
                cognito.clone(),
            )),
            _ => {
                let demo = DemoAuth::with_demo_accounts();
                demo.seed_profiles(store.as_ref()).await?;
                Arc::new(demo)
            }
        };

        Ok(Self::new(store, auth, config))
    }
}
