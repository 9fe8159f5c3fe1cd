use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::{ItemId, ModelKind, UserId},
};

use super::AppState;

/// Largest list a single request may ask for
pub const MAX_RESULTS: usize = 50;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    pub user_id: i64,
    pub n: i64,
    #[serde(default = "default_model_type")]
    pub model_type: String,
}

fn default_model_type() -> String {
    ModelKind::Hybrid.to_string()
}

#[derive(Debug, Deserialize)]
pub struct SimilarItemsRequest {
    pub item_id: i64,
    #[serde(default = "default_similar_n")]
    pub n: i64,
}

fn default_similar_n() -> i64 {
    10
}

#[derive(Debug, Serialize)]
pub struct MovieResponse {
    pub item_id: ItemId,
    pub title: String,
    pub score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub user_id: UserId,
    pub model_type: ModelKind,
    pub recommendations: Vec<MovieResponse>,
}

#[derive(Debug, Serialize)]
pub struct SimilarItemsResponse {
    pub item_id: ItemId,
    pub similar: Vec<MovieResponse>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub models_loaded: bool,
}

// Validation

fn positive_id(value: i64, field: &str) -> AppResult<u32> {
    u32::try_from(value)
        .ok()
        .filter(|&id| id >= 1)
        .ok_or_else(|| AppError::InvalidInput(format!("{} must be a positive integer", field)))
}

fn result_count(value: i64) -> AppResult<usize> {
    usize::try_from(value)
        .ok()
        .filter(|n| (1..=MAX_RESULTS).contains(n))
        .ok_or_else(|| {
            AppError::InvalidInput(format!("n must be between 1 and {}", MAX_RESULTS))
        })
}

// Handlers

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let models_loaded = state.models_loaded().await;
    let message = if models_loaded {
        "Recommendation service is running"
    } else {
        "Recommendation service is running without trained models"
    };

    Json(HealthResponse {
        status: "healthy",
        message,
        models_loaded,
    })
}

/// Top-n recommendations for a user from the selected model
pub async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<RecommendationResponse>> {
    let user_id = positive_id(request.user_id, "user_id")?;
    let n = result_count(request.n)?;
    let model_type: ModelKind = request.model_type.parse()?;

    let engine = state.engine().await?;
    let recommendations = engine
        .recommend(model_type, user_id, n)?
        .into_iter()
        .map(|scored| MovieResponse {
            item_id: scored.item_id,
            title: engine
                .catalog()
                .title(scored.item_id)
                .unwrap_or_default()
                .to_string(),
            score: Some(scored.score),
        })
        .collect();

    Ok(Json(RecommendationResponse {
        user_id,
        model_type,
        recommendations,
    }))
}

/// Items most similar to a given item by content
pub async fn similar_items(
    State(state): State<AppState>,
    Json(request): Json<SimilarItemsRequest>,
) -> AppResult<Json<SimilarItemsResponse>> {
    let item_id = positive_id(request.item_id, "item_id")?;
    let n = result_count(request.n)?;

    let engine = state.engine().await?;
    let similar = engine
        .similar_items(item_id, n)?
        .into_iter()
        .map(|id| MovieResponse {
            item_id: id,
            title: engine.catalog().title(id).unwrap_or_default().to_string(),
            score: None,
        })
        .collect();

    Ok(Json(SimilarItemsResponse { item_id, similar }))
}
