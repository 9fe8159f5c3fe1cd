use serde::Deserialize;
use std::path::PathBuf;

use crate::{
    error::AppResult,
    services::{evaluation::EvaluationConfig, ContentConfig, FusionConfig, LatentConfig},
    store::ArtifactPaths,
};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Cleaned ratings CSV (user_id, item_id, rating)
    #[serde(default = "default_ratings_path")]
    pub ratings_path: PathBuf,

    /// Cleaned movies CSV (item_id, title, genres)
    #[serde(default = "default_movies_path")]
    pub movies_path: PathBuf,

    /// Directory holding the trained artifacts
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_latent_factors")]
    pub latent_factors: usize,

    #[serde(default = "default_latent_epochs")]
    pub latent_epochs: usize,

    #[serde(default = "default_latent_learning_rate")]
    pub latent_learning_rate: f64,

    #[serde(default = "default_latent_regularization")]
    pub latent_regularization: f64,

    /// Seed for factor initialization, the SGD shuffle and the evaluation split
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,

    /// Ratings at or above this value count as liked by the content model
    #[serde(default = "default_min_rating")]
    pub content_min_rating: f64,

    #[serde(default = "default_token_pattern")]
    pub content_token_pattern: String,

    /// Weight of the collaborative list in rank fusion
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f64,

    #[serde(default = "default_eval_test_size")]
    pub eval_test_size: f64,

    /// Comma separated cutoffs, e.g. `EVAL_K_VALUES=5,10,20`
    #[serde(default = "default_eval_k_values")]
    pub eval_k_values: Vec<usize>,

    #[serde(default = "default_eval_sample_users")]
    pub eval_sample_users: usize,

    #[serde(default = "default_min_rating")]
    pub eval_min_rating: f64,
}

fn default_ratings_path() -> PathBuf {
    PathBuf::from("data/processed/ratings_clean.csv")
}

fn default_movies_path() -> PathBuf {
    PathBuf::from("data/processed/movies_clean.csv")
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_latent_factors() -> usize {
    LatentConfig::default().n_factors
}

fn default_latent_epochs() -> usize {
    LatentConfig::default().n_epochs
}

fn default_latent_learning_rate() -> f64 {
    LatentConfig::default().learning_rate
}

fn default_latent_regularization() -> f64 {
    LatentConfig::default().regularization
}

fn default_random_seed() -> u64 {
    42
}

fn default_min_rating() -> f64 {
    4.0
}

fn default_token_pattern() -> String {
    ContentConfig::default().token_pattern
}

fn default_hybrid_alpha() -> f64 {
    FusionConfig::default().alpha()
}

fn default_eval_test_size() -> f64 {
    0.2
}

fn default_eval_k_values() -> Vec<usize> {
    vec![5, 10, 20]
}

fn default_eval_sample_users() -> usize {
    100
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths::in_dir(&self.models_dir)
    }

    pub fn latent_config(&self) -> AppResult<LatentConfig> {
        let config = LatentConfig {
            n_factors: self.latent_factors,
            n_epochs: self.latent_epochs,
            learning_rate: self.latent_learning_rate,
            regularization: self.latent_regularization,
            seed: self.random_seed,
            ..LatentConfig::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn content_config(&self) -> AppResult<ContentConfig> {
        let config = ContentConfig {
            min_rating: self.content_min_rating,
            token_pattern: self.content_token_pattern.clone(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn fusion_config(&self) -> AppResult<FusionConfig> {
        FusionConfig::new(self.hybrid_alpha)
    }

    pub fn evaluation_config(&self) -> AppResult<EvaluationConfig> {
        let config = EvaluationConfig {
            test_size: self.eval_test_size,
            seed: self.random_seed,
            k_values: self.eval_k_values.clone(),
            sample_users: self.eval_sample_users,
            min_rating: self.eval_min_rating,
            ..EvaluationConfig::default()
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()));
        envy::from_iter::<_, Config>(vars).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]);

        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert_eq!(config.artifact_paths(), ArtifactPaths::in_dir("models"));
        assert_eq!(config.latent_config().unwrap(), LatentConfig::default());
        assert_eq!(config.content_config().unwrap(), ContentConfig::default());
        assert_eq!(config.fusion_config().unwrap(), FusionConfig::default());
        assert_eq!(
            config.evaluation_config().unwrap(),
            EvaluationConfig::default()
        );
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("PORT", "9000"),
            ("LATENT_FACTORS", "16"),
            ("RANDOM_SEED", "7"),
            ("HYBRID_ALPHA", "0.5"),
            ("EVAL_K_VALUES", "1,3"),
        ]);

        assert_eq!(config.port, 9000);
        let latent = config.latent_config().unwrap();
        assert_eq!(latent.n_factors, 16);
        assert_eq!(latent.seed, 7);
        assert_eq!(config.fusion_config().unwrap().beta(), 0.5);

        let evaluation = config.evaluation_config().unwrap();
        assert_eq!(evaluation.k_values, vec![1, 3]);
        assert_eq!(evaluation.seed, 7);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let config = from_pairs(&[("HYBRID_ALPHA", "1.2"), ("LATENT_FACTORS", "0")]);
        assert!(matches!(
            config.fusion_config(),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            config.latent_config(),
            Err(AppError::InvalidInput(_))
        ));

        let config = from_pairs(&[("CONTENT_TOKEN_PATTERN", "[unclosed")]);
        assert!(config.content_config().is_err());
    }
}
