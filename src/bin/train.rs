//! Fits the collaborative and content models on the full dataset and writes
//! the three artifacts into the models directory.

use std::time::Instant;

use tracing_subscriber::EnvFilter;

use cinerank::{
    config::Config,
    services::RecommendationEngine,
    store::{load_catalog, load_ratings},
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    let start = Instant::now();

    let ratings = load_ratings(&config.ratings_path)?;
    let catalog = load_catalog(&config.movies_path)?;

    let engine = RecommendationEngine::train(
        catalog,
        ratings,
        config.latent_config()?,
        config.content_config()?,
        config.fusion_config()?,
    )?;

    let paths = config.artifact_paths();
    engine.save(&paths)?;

    tracing::info!(
        models_dir = %config.models_dir.display(),
        elapsed_ms = start.elapsed().as_millis(),
        "Training complete"
    );
    Ok(())
}
