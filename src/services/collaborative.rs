//! Latent-factor collaborative filtering.
//!
//! Biased matrix factorization trained with stochastic gradient descent:
//! a rating is estimated as `mu + b_u + b_i + p_u . q_i`. Training is fully
//! deterministic for a given seed and input order.

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::Path,
    time::Instant,
};

use crate::{
    error::{AppError, AppResult},
    models::{rated_items, top_n, Catalog, ItemId, Rating, ScoredItem, UserId},
    services::Recommender,
    store::{load_artifact, save_artifact},
};

const MODEL_NAME: &str = "collaborative";

/// Hyperparameters of the latent-factor model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatentConfig {
    /// Dimensionality of user and item factor vectors
    pub n_factors: usize,
    /// Number of passes over the ratings
    pub n_epochs: usize,
    pub learning_rate: f64,
    /// L2 penalty applied to biases and factors
    pub regularization: f64,
    /// Seeds both factor initialization and the per-epoch shuffle
    pub seed: u64,
    /// Factors start uniformly in `[-init_scale, init_scale)`
    pub init_scale: f64,
}

impl Default for LatentConfig {
    fn default() -> Self {
        Self {
            n_factors: 100,
            n_epochs: 20,
            learning_rate: 0.005,
            regularization: 0.02,
            seed: 42,
            init_scale: 0.1,
        }
    }
}

impl LatentConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.n_factors == 0 {
            return Err(AppError::InvalidInput(
                "n_factors must be at least 1".to_string(),
            ));
        }
        if self.n_epochs == 0 {
            return Err(AppError::InvalidInput(
                "n_epochs must be at least 1".to_string(),
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(AppError::InvalidInput(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.regularization.is_finite() && self.regularization >= 0.0) {
            return Err(AppError::InvalidInput(format!(
                "regularization must be non-negative, got {}",
                self.regularization
            )));
        }
        if !(self.init_scale.is_finite() && self.init_scale > 0.0) {
            return Err(AppError::InvalidInput(format!(
                "init_scale must be positive, got {}",
                self.init_scale
            )));
        }
        Ok(())
    }
}

/// Learned parameters of a trained latent-factor model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatentModelState {
    pub global_mean: f64,
    pub user_bias: BTreeMap<UserId, f64>,
    pub item_bias: BTreeMap<ItemId, f64>,
    pub user_factors: BTreeMap<UserId, Vec<f64>>,
    pub item_factors: BTreeMap<ItemId, Vec<f64>>,
}

impl LatentModelState {
    /// Raw rating estimate; unseen users or items contribute nothing for their side
    pub fn estimate(&self, user_id: UserId, item_id: ItemId) -> f64 {
        let mut estimate = self.global_mean;

        if let Some(bias) = self.user_bias.get(&user_id) {
            estimate += bias;
        }
        if let Some(bias) = self.item_bias.get(&item_id) {
            estimate += bias;
        }
        if let (Some(p), Some(q)) = (
            self.user_factors.get(&user_id),
            self.item_factors.get(&item_id),
        ) {
            estimate += dot(p, q);
        }

        estimate
    }
}

/// Persisted form: hyperparameters and learned state travel together
#[derive(Debug, Serialize, Deserialize)]
struct LatentArtifact {
    config: LatentConfig,
    state: LatentModelState,
}

/// Latent-factor (SVD-style) collaborative model
#[derive(Debug, Clone)]
pub struct LatentFactorModel {
    config: LatentConfig,
    state: Option<LatentModelState>,
}

impl LatentFactorModel {
    /// Creates an untrained model
    pub fn new(config: LatentConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: None,
        })
    }

    /// Creates a trained model from previously learned state
    pub fn from_state(config: LatentConfig, state: LatentModelState) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: Some(state),
        })
    }

    pub fn config(&self) -> &LatentConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> AppResult<&LatentModelState> {
        self.state.as_ref().ok_or(AppError::NotTrained(MODEL_NAME))
    }

    /// Learns biases and factors from the ratings, replacing any previous state
    pub fn fit(&mut self, ratings: &[Rating]) -> AppResult<()> {
        if ratings.is_empty() {
            return Err(AppError::InvalidInput(
                "Cannot fit the collaborative model on an empty ratings table".to_string(),
            ));
        }

        let start = Instant::now();
        let cfg = &self.config;
        let k = cfg.n_factors;

        // 1. Index users and items in order of first appearance
        let mut users = IdIndex::default();
        let mut items = IdIndex::default();
        let samples: Vec<(usize, usize, f64)> = ratings
            .iter()
            .map(|r| (users.insert(r.user_id), items.insert(r.item_id), r.rating))
            .collect();

        tracing::info!(
            ratings = samples.len(),
            users = users.len(),
            items = items.len(),
            n_factors = k,
            n_epochs = cfg.n_epochs,
            "Training collaborative model"
        );

        // 2. Initialize parameters
        let global_mean = samples.iter().map(|s| s.2).sum::<f64>() / samples.len() as f64;
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let mut user_factors = random_factors(users.len(), k, cfg.init_scale, &mut rng);
        let mut item_factors = random_factors(items.len(), k, cfg.init_scale, &mut rng);
        let mut user_bias = vec![0.0; users.len()];
        let mut item_bias = vec![0.0; items.len()];

        // 3. SGD epochs over a seeded shuffle of the ratings
        let lr = cfg.learning_rate;
        let reg = cfg.regularization;
        let mut order: Vec<usize> = (0..samples.len()).collect();

        for epoch in 0..cfg.n_epochs {
            order.shuffle(&mut rng);
            let mut squared_error = 0.0;

            for &idx in &order {
                let (u, i, rating) = samples[idx];
                let p = &mut user_factors[u];
                let q = &mut item_factors[i];

                let err =
                    rating - (global_mean + user_bias[u] + item_bias[i] + dot(&p[..], &q[..]));
                squared_error += err * err;

                user_bias[u] += lr * (err - reg * user_bias[u]);
                item_bias[i] += lr * (err - reg * item_bias[i]);

                for f in 0..k {
                    let puf = p[f];
                    let qif = q[f];
                    p[f] += lr * (err * qif - reg * puf);
                    q[f] += lr * (err * puf - reg * qif);
                }
            }

            let rmse = (squared_error / samples.len() as f64).sqrt();
            if !rmse.is_finite() {
                return Err(AppError::Diverged(format!(
                    "non-finite error after epoch {} with learning_rate {}",
                    epoch + 1,
                    lr
                )));
            }
            tracing::debug!(epoch = epoch + 1, rmse, "Collaborative epoch finished");
        }

        if !(all_finite(&user_bias)
            && all_finite(&item_bias)
            && user_factors.iter().all(|p| all_finite(p))
            && item_factors.iter().all(|q| all_finite(q)))
        {
            return Err(AppError::Diverged(
                "non-finite biases or factors after the last epoch".to_string(),
            ));
        }

        // 4. Publish the new state as a whole
        self.state = Some(LatentModelState {
            global_mean,
            user_bias: users.zip(user_bias),
            item_bias: items.zip(item_bias),
            user_factors: users.zip(user_factors),
            item_factors: items.zip(item_factors),
        });

        tracing::info!(
            global_mean,
            elapsed_ms = start.elapsed().as_millis(),
            "Collaborative model trained"
        );
        Ok(())
    }

    /// Raw rating estimate for a (user, item) pair, not clamped to the rating scale
    pub fn predict(&self, user_id: UserId, item_id: ItemId) -> AppResult<f64> {
        Ok(self.state()?.estimate(user_id, item_id))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> AppResult<()> {
        let artifact = LatentArtifact {
            config: self.config.clone(),
            state: self.state()?.clone(),
        };
        save_artifact(path, &artifact)
    }

    /// Loads a trained model saved with [`LatentFactorModel::save`]
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let artifact: LatentArtifact = load_artifact(path)?;
        Self::from_state(artifact.config, artifact.state)
    }
}

impl Recommender for LatentFactorModel {
    fn name(&self) -> &'static str {
        MODEL_NAME
    }

    fn recommend_scored(
        &self,
        user_id: UserId,
        ratings: &[Rating],
        catalog: &Catalog,
        n: usize,
    ) -> AppResult<Vec<ScoredItem>> {
        let state = self.state()?;
        let seen = rated_items(ratings, user_id);
        let mut emitted = HashSet::with_capacity(catalog.len());

        let scored: Vec<ScoredItem> = catalog
            .item_ids()
            .filter(|item_id| !seen.contains(item_id) && emitted.insert(*item_id))
            .map(|item_id| ScoredItem::new(item_id, state.estimate(user_id, item_id)))
            .collect();

        Ok(top_n(scored, n))
    }
}

/// Dense position index over ids, in order of first insertion
#[derive(Default)]
struct IdIndex {
    ids: Vec<u32>,
    positions: HashMap<u32, usize>,
}

impl IdIndex {
    fn insert(&mut self, id: u32) -> usize {
        let next = self.ids.len();
        let position = *self.positions.entry(id).or_insert(next);
        if position == next {
            self.ids.push(id);
        }
        position
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn zip<T>(&self, values: Vec<T>) -> BTreeMap<u32, T> {
        self.ids.iter().copied().zip(values).collect()
    }
}

fn random_factors(rows: usize, k: usize, scale: f64, rng: &mut StdRng) -> Vec<Vec<f64>> {
    (0..rows)
        .map(|_| (0..k).map(|_| rng.gen_range(-scale..scale)).collect())
        .collect()
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
