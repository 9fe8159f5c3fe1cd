use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ItemId;

/// Represents a movie in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub item_id: ItemId,
    pub title: String,
    /// Raw genre text, pipe separated in the MovieLens export (e.g. "Action|Sci-Fi")
    ///
    /// Kept verbatim; the content model's token pattern decides how it splits.
    #[serde(default, alias = "genre_text")]
    pub genres: Option<String>,
}

impl Item {
    pub fn new(item_id: ItemId, title: impl Into<String>, genres: impl Into<String>) -> Self {
        Self {
            item_id,
            title: title.into(),
            genres: Some(genres.into()),
        }
    }
}

/// Ordered, immutable view of the item catalog
///
/// Iteration order is load order and is the tie-breaking order for ranking.
/// A repeated item id keeps its first position.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<Item>,
    positions: HashMap<ItemId, usize>,
}

impl Catalog {
    pub fn new(items: Vec<Item>) -> Self {
        let mut positions = HashMap::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            positions.entry(item.item_id).or_insert(position);
        }

        Self { items, positions }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item_ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.items.iter().map(|item| item.item_id)
    }

    pub fn get(&self, item_id: ItemId) -> Option<&Item> {
        self.positions.get(&item_id).map(|&pos| &self.items[pos])
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.positions.contains_key(&item_id)
    }

    pub fn title(&self, item_id: ItemId) -> Option<&str> {
        self.get(item_id).map(|item| item.title.as_str())
    }

    /// Whether any item carries genre text
    pub fn has_genres(&self) -> bool {
        self.items.iter().any(|item| item.genres.is_some())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<Item> for Catalog {
    fn from_iter<T: IntoIterator<Item = Item>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
