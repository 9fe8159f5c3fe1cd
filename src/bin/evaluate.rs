//! Offline comparison of the three models on a per-user holdout split.

use tracing_subscriber::EnvFilter;

use cinerank::{
    config::Config,
    models::ModelKind,
    services::{
        evaluation::{
            best_by_metric, evaluate_model, summarize, train_test_split_by_user, EvaluationRun,
        },
        RecommendationEngine,
    },
    store::{load_catalog, load_ratings},
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    let evaluation = config.evaluation_config()?;

    let ratings = load_ratings(&config.ratings_path)?;
    let catalog = load_catalog(&config.movies_path)?;

    let (train, test) =
        train_test_split_by_user(&ratings, evaluation.test_size, evaluation.seed)?;

    // Models only ever see the training side
    let engine = RecommendationEngine::train(
        catalog,
        train,
        config.latent_config()?,
        config.content_config()?,
        config.fusion_config()?,
    )?;

    let runs: Vec<EvaluationRun> = ModelKind::ALL
        .iter()
        .map(|&kind| {
            evaluate_model(
                engine.model(kind),
                engine.ratings(),
                &test,
                engine.catalog(),
                &evaluation,
            )
        })
        .collect();

    let summary = summarize(runs.iter().flat_map(|run| run.records()));
    for row in &summary {
        tracing::info!(
            model = %row.model_name,
            k = row.k,
            precision = %format!("{:.4}", row.precision),
            recall = %format!("{:.4}", row.recall),
            ndcg = %format!("{:.4}", row.ndcg),
            users = row.users,
            "Evaluation summary"
        );
    }

    for best in best_by_metric(&summary) {
        tracing::info!(
            k = best.k,
            metric = %best.metric,
            model = %best.model_name,
            value = %format!("{:.4}", best.value),
            "Best model"
        );
    }

    Ok(())
}
