use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{Catalog, ItemId, ModelKind, Rating, ScoredItem, UserId},
    services::{
        ContentConfig, ContentModel, FusionConfig, FusionModel, LatentConfig, LatentFactorModel,
        Recommender,
    },
    store::ArtifactPaths,
};

/// Serving boundary over the catalog, the interaction history and the trained models
///
/// The engine is immutable once built. Reloading means building a new engine
/// and swapping the shared handle.
#[derive(Debug)]
pub struct RecommendationEngine {
    catalog: Catalog,
    ratings: Vec<Rating>,
    collaborative: Arc<LatentFactorModel>,
    content: Arc<ContentModel>,
    hybrid: FusionModel,
}

impl RecommendationEngine {
    /// Assembles an engine from already-trained models
    pub fn new(
        catalog: Catalog,
        ratings: Vec<Rating>,
        collaborative: Arc<LatentFactorModel>,
        content: Arc<ContentModel>,
        fusion: FusionConfig,
    ) -> AppResult<Self> {
        let hybrid = FusionModel::new(collaborative.clone(), content.clone(), fusion)?;
        Ok(Self {
            catalog,
            ratings,
            collaborative,
            content,
            hybrid,
        })
    }

    /// Fits the latent and content models on the given data
    pub fn train(
        catalog: Catalog,
        ratings: Vec<Rating>,
        latent: LatentConfig,
        content: ContentConfig,
        fusion: FusionConfig,
    ) -> AppResult<Self> {
        let mut collaborative = LatentFactorModel::new(latent)?;
        collaborative.fit(&ratings)?;

        let mut content_model = ContentModel::new(content)?;
        content_model.fit(&catalog)?;

        Self::new(
            catalog,
            ratings,
            Arc::new(collaborative),
            Arc::new(content_model),
            fusion,
        )
    }

    /// Restores the three models from their artifacts
    pub fn load(catalog: Catalog, ratings: Vec<Rating>, paths: &ArtifactPaths) -> AppResult<Self> {
        let collaborative = Arc::new(LatentFactorModel::load(&paths.latent)?);
        let content = Arc::new(ContentModel::load(&paths.content)?);
        let hybrid = FusionModel::load(&paths.fusion, collaborative.clone(), content.clone())?;

        tracing::info!(
            items = catalog.len(),
            ratings = ratings.len(),
            alpha = hybrid.config().alpha(),
            "Recommendation engine loaded"
        );

        Ok(Self {
            catalog,
            ratings,
            collaborative,
            content,
            hybrid,
        })
    }

    pub fn save(&self, paths: &ArtifactPaths) -> AppResult<()> {
        self.collaborative.save(&paths.latent)?;
        self.content.save(&paths.content)?;
        self.hybrid.save(&paths.fusion)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn ratings(&self) -> &[Rating] {
        &self.ratings
    }

    pub fn model(&self, kind: ModelKind) -> &dyn Recommender {
        match kind {
            ModelKind::Collaborative => self.collaborative.as_ref(),
            ModelKind::Content => self.content.as_ref(),
            ModelKind::Hybrid => &self.hybrid,
        }
    }

    /// Top `n` unseen items for the user from the selected model
    pub fn recommend(
        &self,
        kind: ModelKind,
        user_id: UserId,
        n: usize,
    ) -> AppResult<Vec<ScoredItem>> {
        let recommendations =
            self.model(kind)
                .recommend_scored(user_id, &self.ratings, &self.catalog, n)?;

        tracing::debug!(
            model = %kind,
            user_id,
            returned = recommendations.len(),
            "Recommendations generated"
        );
        Ok(recommendations)
    }

    /// Top `n` items most similar to `item_id` by content
    pub fn similar_items(&self, item_id: ItemId, n: usize) -> AppResult<Vec<ItemId>> {
        self.content.get_similar_items(item_id, &self.catalog, n)
    }
}
