use crate::{
    error::AppResult,
    models::{Catalog, ItemId, Rating, ScoredItem, UserId},
};

pub mod collaborative;
pub mod content;
pub mod engine;
pub mod evaluation;
pub mod hybrid;
pub mod metrics;

pub use collaborative::{LatentConfig, LatentFactorModel, LatentModelState};
pub use content::{ContentConfig, ContentModel};
pub use engine::RecommendationEngine;
pub use hybrid::{FusionConfig, FusionModel};

/// Trait for ranking models
///
/// Every model answers the same question: given the interaction history and
/// the catalog, which unseen items should this user see first. Implementations
/// must be read-only once trained so one instance can serve many callers.
pub trait Recommender: Send + Sync {
    /// Model name used in logs and evaluation reports
    fn name(&self) -> &'static str;

    /// Top `n` items for the user, best first, with the model's own scores
    fn recommend_scored(
        &self,
        user_id: UserId,
        ratings: &[Rating],
        catalog: &Catalog,
        n: usize,
    ) -> AppResult<Vec<ScoredItem>>;

    /// Top `n` item ids for the user, best first
    fn recommend(
        &self,
        user_id: UserId,
        ratings: &[Rating],
        catalog: &Catalog,
        n: usize,
    ) -> AppResult<Vec<ItemId>> {
        Ok(self
            .recommend_scored(user_id, ratings, catalog, n)?
            .into_iter()
            .map(|scored| scored.item_id)
            .collect())
    }
}
