use anyhow::Context;
use tracing_subscriber::EnvFilter;

use cinerank::{
    api::{create_router, AppState},
    config::Config,
    services::RecommendationEngine,
    store::{load_catalog, load_ratings},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;

    // Serve even without artifacts so /health can report the missing models
    let state = match load_engine(&config) {
        Ok(engine) => AppState::with_engine(engine),
        Err(e) => {
            tracing::warn!(error = %e, "Models not loaded, run the train binary first");
            AppState::new()
        }
    };

    let app = create_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!(address = %address, "Server running");
    axum::serve(listener, app).await?;

    Ok(())
}

fn load_engine(config: &Config) -> anyhow::Result<RecommendationEngine> {
    let ratings = load_ratings(&config.ratings_path)?;
    let catalog = load_catalog(&config.movies_path)?;
    let engine = RecommendationEngine::load(catalog, ratings, &config.artifact_paths())?;
    Ok(engine)
}
