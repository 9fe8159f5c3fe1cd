use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use crate::error::AppError;

pub mod catalog;
pub mod rating;

pub use catalog::{Catalog, Item};
pub use rating::{rated_items, user_ratings, Rating};

/// Identifier of a user in the interaction history
pub type UserId = u32;

/// Identifier of a catalog item (movie)
pub type ItemId = u32;

/// Which ranking model answers a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Collaborative,
    Content,
    Hybrid,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::Collaborative,
        ModelKind::Content,
        ModelKind::Hybrid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Collaborative => "collaborative",
            ModelKind::Content => "content",
            ModelKind::Hybrid => "hybrid",
        }
    }
}

impl Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "collaborative" => Ok(ModelKind::Collaborative),
            "content" => Ok(ModelKind::Content),
            "hybrid" => Ok(ModelKind::Hybrid),
            other => Err(AppError::InvalidInput(format!(
                "Unknown model type '{}', expected collaborative, content or hybrid",
                other
            ))),
        }
    }
}

/// A ranked item together with the score the producing model assigned it
///
/// Scores are only comparable within one model's output: a predicted rating,
/// an accumulated similarity and a fused rank score live on different scales.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item_id: ItemId,
    pub score: f64,
}

impl ScoredItem {
    pub fn new(item_id: ItemId, score: f64) -> Self {
        Self { item_id, score }
    }
}

/// Sorts scored items by descending score and keeps the first `n`
///
/// The sort is stable, so equal scores keep the order in which the items were
/// pushed. Every model relies on this for reproducible tie-breaking.
pub fn top_n(mut scored: Vec<ScoredItem>, n: usize) -> Vec<ScoredItem> {
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(n);
    scored
}
