mod http_handler;

use std::sync::Arc;

use grofvuil_shared::AppState;
use lambda_http::{run, service_fn, Error, Request};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Local runs only; Lambda injects its environment directly
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(false)
                .without_time()
                .with_ansi(false),
        )
        .init();

    let state = Arc::new(AppState::from_env().await?);
    tracing::info!("API Lambda ready (prefix {})", state.config.api_prefix);

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move { http_handler::function_handler(event, state).await }
    }))
    .await
}
