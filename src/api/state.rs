use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    services::RecommendationEngine,
};

/// Shared application state
///
/// Holds the current engine behind a lock so a freshly trained engine can be
/// swapped in while requests keep reading the previous one.
#[derive(Clone, Default)]
pub struct AppState {
    pub inner: Arc<RwLock<Option<Arc<RecommendationEngine>>>>,
}

impl AppState {
    /// State with no models loaded; recommendation endpoints fail until one is installed
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(engine: RecommendationEngine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(Arc::new(engine)))),
        }
    }

    /// Current engine, or `NotTrained` when nothing has been loaded
    pub async fn engine(&self) -> AppResult<Arc<RecommendationEngine>> {
        self.inner
            .read()
            .await
            .clone()
            .ok_or(AppError::NotTrained("recommendation engine"))
    }

    /// Whether an engine is installed
    pub async fn models_loaded(&self) -> bool {
        self.inner.read().await.is_some()
    }

    /// Installs a new engine; in-flight requests finish on the old one
    pub async fn replace(&self, engine: RecommendationEngine) {
        *self.inner.write().await = Some(Arc::new(engine));
        tracing::info!("Recommendation engine replaced");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_state_has_no_engine() {
        let state = AppState::new();
        assert!(!state.models_loaded().await);
        assert!(matches!(
            state.engine().await,
            Err(AppError::NotTrained(_))
        ));
    }
}
