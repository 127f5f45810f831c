//! Curator - release parsing, quality scoring and naming templates
//!
//! Serves the template authoring and regex self-test API used by
//! configuration tooling.

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use curator::AppState;
use curator::api;
use curator::config::{Config, ConfigStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "curator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!("Starting Curator");

    let store = ConfigStore::open(&config.profiles_path, config.default_profile.clone())
        .with_context(|| format!("Failed to load {}", config.profiles_path.display()))?;
    let snapshot = store.snapshot();
    tracing::info!(
        profiles = snapshot.profile_count(),
        default_profile = ?snapshot.default_profile(),
        "Profile document loaded"
    );

    let addr = config.bind_address();
    let state = AppState::new(config, store);
    let app = api::app(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
