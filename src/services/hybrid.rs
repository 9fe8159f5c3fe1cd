//! Rank fusion of the collaborative and content models.
//!
//! Predicted ratings and accumulated similarities are not on comparable
//! scales, so the combiner scores items by their position in each model's
//! candidate list instead of by raw score.

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, sync::Arc};

use crate::{
    error::{AppError, AppResult},
    models::{top_n, Catalog, ItemId, Rating, ScoredItem, UserId},
    services::{ContentModel, LatentFactorModel, Recommender},
    store::{load_artifact, save_artifact},
};

/// Number of candidates requested from each sub-model, independent of `n`
///
/// Requests for more than this many items are capped by the candidate pool.
pub const OVERSAMPLE_WIDTH: usize = 50;

pub const DEFAULT_ALPHA: f64 = 0.7;

/// Fusion weights: `alpha` for the collaborative list, `beta = 1 - alpha` for content
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    alpha: f64,
    beta: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            beta: 1.0 - DEFAULT_ALPHA,
        }
    }
}

impl FusionConfig {
    pub fn new(alpha: f64) -> AppResult<Self> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(AppError::InvalidInput(format!(
                "alpha must be within [0, 1], got {}",
                alpha
            )));
        }
        Ok(Self {
            alpha,
            beta: 1.0 - alpha,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }
}

/// Hybrid recommender combining two trained sub-models
#[derive(Debug, Clone)]
pub struct FusionModel {
    collaborative: Arc<LatentFactorModel>,
    content: Arc<ContentModel>,
    config: FusionConfig,
}

impl FusionModel {
    /// Creates the combiner; both sub-models must already be trained
    pub fn new(
        collaborative: Arc<LatentFactorModel>,
        content: Arc<ContentModel>,
        config: FusionConfig,
    ) -> AppResult<Self> {
        if !collaborative.is_trained() {
            return Err(AppError::NotTrained(collaborative.name()));
        }
        if !content.is_trained() {
            return Err(AppError::NotTrained(content.name()));
        }

        Ok(Self {
            collaborative,
            content,
            config,
        })
    }

    pub fn config(&self) -> FusionConfig {
        self.config
    }

    /// Persists the fusion weights only; sub-models are saved separately
    pub fn save(&self, path: impl AsRef<Path>) -> AppResult<()> {
        save_artifact(path, &self.config)
    }

    /// Restores saved weights around already-trained sub-models
    pub fn load(
        path: impl AsRef<Path>,
        collaborative: Arc<LatentFactorModel>,
        content: Arc<ContentModel>,
    ) -> AppResult<Self> {
        let saved: FusionConfig = load_artifact(path)?;
        let config = FusionConfig::new(saved.alpha)?;
        Self::new(collaborative, content, config)
    }
}

impl Recommender for FusionModel {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    /// Weighted rank fusion over the two top-[`OVERSAMPLE_WIDTH`] candidate lists
    ///
    /// The item at position `i` of a list earns `weight * (OVERSAMPLE_WIDTH - i)`.
    /// Contributions from both lists are summed; ties keep first-seen order,
    /// collaborative list first.
    fn recommend_scored(
        &self,
        user_id: UserId,
        ratings: &[Rating],
        catalog: &Catalog,
        n: usize,
    ) -> AppResult<Vec<ScoredItem>> {
        if n > OVERSAMPLE_WIDTH {
            tracing::warn!(
                requested = n,
                width = OVERSAMPLE_WIDTH,
                "Hybrid request exceeds candidate pool width"
            );
        }

        let collaborative = self
            .collaborative
            .recommend(user_id, ratings, catalog, OVERSAMPLE_WIDTH)?;
        let content = self
            .content
            .recommend(user_id, ratings, catalog, OVERSAMPLE_WIDTH)?;

        let mut scored: Vec<ScoredItem> = Vec::new();
        let mut slots: HashMap<ItemId, usize> = HashMap::new();

        for (list, weight) in [
            (&collaborative, self.config.alpha),
            (&content, self.config.beta),
        ] {
            for (rank, &item_id) in list.iter().enumerate() {
                let contribution = weight * (OVERSAMPLE_WIDTH - rank) as f64;
                match slots.get(&item_id) {
                    Some(&slot) => scored[slot].score += contribution,
                    None => {
                        slots.insert(item_id, scored.len());
                        scored.push(ScoredItem::new(item_id, contribution));
                    }
                }
            }
        }

        tracing::debug!(
            user_id,
            collaborative = collaborative.len(),
            content = content.len(),
            fused = scored.len(),
            "Fused candidate lists"
        );

        Ok(top_n(scored, n))
    }
}
