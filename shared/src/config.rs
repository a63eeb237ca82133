use std::{env, fmt::Display, str::FromStr};

use chrono::Duration;
use tracing::info;
use triage_block::SubmissionPolicy;

/// One year
const MAX_SPAM_WINDOW_HOURS: i64 = 24 * 365;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} is required when {context}")]
    Missing { key: &'static str, context: &'static str },

    #[error("invalid {key} value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Cognito,
    Demo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Dynamo,
    Memory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CognitoConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub user_pool_id: String,
}

/// Runtime configuration, read once at cold start
#[derive(Debug, Clone)]
pub struct Config {
    pub table_name: String,
    /// Mount point of every route, without trailing slash
    pub api_prefix: String,
    pub auth_mode: AuthMode,
    pub cognito: Option<CognitoConfig>,
    pub store_mode: StoreMode,
    pub local_fallback: bool,
    pub cors_origin: String,
    pub submission: SubmissionPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup; `from_env` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let auth_mode = match get("AUTH_MODE").as_deref() {
            None | Some("cognito") => AuthMode::Cognito,
            Some("demo") => AuthMode::Demo,
            Some(other) => return Err(invalid("AUTH_MODE", other, "expected cognito or demo")),
        };

        let store_mode = match get("STORE_MODE").as_deref() {
            None | Some("dynamo") => StoreMode::Dynamo,
            Some("memory") => StoreMode::Memory,
            Some(other) => return Err(invalid("STORE_MODE", other, "expected dynamo or memory")),
        };

        let cognito = match auth_mode {
            AuthMode::Cognito => Some(CognitoConfig {
                client_id: require(&get, "COGNITO_CLIENT_ID")?,
                client_secret: get("COGNITO_CLIENT_SECRET"),
                user_pool_id: require(&get, "COGNITO_USER_POOL_ID")?,
            }),
            AuthMode::Demo => None,
        };

        let mut api_prefix = get("API_PREFIX").unwrap_or_else(|| "/make-server".to_string());
        while api_prefix.ends_with('/') {
            api_prefix.pop();
        }
        if !api_prefix.is_empty() && !api_prefix.starts_with('/') {
            api_prefix.insert(0, '/');
        }

        let spam_radius_m: f64 = parse_or(&get, "SPAM_RADIUS_METERS", 10.0)?;
        if !spam_radius_m.is_finite() || spam_radius_m < 0.0 {
            return Err(invalid(
                "SPAM_RADIUS_METERS",
                &spam_radius_m.to_string(),
                "must be a finite, non-negative number",
            ));
        }
        let spam_window_hours: i64 = parse_or(&get, "SPAM_WINDOW_HOURS", 24)?;
        if !(1..=MAX_SPAM_WINDOW_HOURS).contains(&spam_window_hours) {
            return Err(invalid(
                "SPAM_WINDOW_HOURS",
                &spam_window_hours.to_string(),
                format!("must be between 1 and {}", MAX_SPAM_WINDOW_HOURS),
            ));
        }

        let submission = SubmissionPolicy {
            spam_radius_m,
            spam_window: Duration::hours(spam_window_hours),
            max_reports_per_hour: parse_or(&get, "MAX_REPORTS_PER_HOUR", 5)?,
            max_photo_bytes: parse_or(&get, "MAX_PHOTO_BYTES", 350_000)?,
        };

        let config = Self {
            table_name: get("TABLE_NAME").unwrap_or_else(|| "grofvuil".to_string()),
            api_prefix,
            auth_mode,
            cognito,
            store_mode,
            local_fallback: parse_or(&get, "LOCAL_FALLBACK", false)?,
            cors_origin: get("CORS_ORIGIN").unwrap_or_else(|| "*".to_string()),
            submission,
        };

        info!(
            "Config loaded: auth={:?} store={:?} fallback={} prefix={}",
            config.auth_mode, config.store_mode, config.local_fallback, config.api_prefix
        );
        Ok(config)
    }
}

fn invalid(key: &'static str, value: &str, reason: impl Display) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn require<G>(get: &G, key: &'static str) -> Result<String, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    get(key).ok_or(ConfigError::Missing {
        key,
        context: "AUTH_MODE is cognito",
    })
}

fn parse_or<G, T>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|e| invalid(key, &raw, e)),
        None => Ok(default),
    }
}
