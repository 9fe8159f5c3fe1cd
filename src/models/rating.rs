use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{ItemId, UserId};

/// One observed rating of an item by a user, on the 1-5 scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub item_id: ItemId,
    #[serde(alias = "ratings")]
    pub rating: f64,
}

impl Rating {
    pub fn new(user_id: UserId, item_id: ItemId, rating: f64) -> Self {
        Self {
            user_id,
            item_id,
            rating,
        }
    }
}

/// Iterates the ratings of a single user, in history order
pub fn user_ratings(ratings: &[Rating], user_id: UserId) -> impl Iterator<Item = &Rating> {
    ratings.iter().filter(move |r| r.user_id == user_id)
}

/// Items the user has rated at any score
pub fn rated_items(ratings: &[Rating], user_id: UserId) -> HashSet<ItemId> {
    user_ratings(ratings, user_id).map(|r| r.item_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rated_items_only_for_user() {
        let ratings = vec![
            Rating::new(1, 10, 5.0),
            Rating::new(2, 20, 3.0),
            Rating::new(1, 30, 1.0),
        ];

        let seen = rated_items(&ratings, 1);
        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&10));
        assert!(seen.contains(&30));
        assert!(rated_items(&ratings, 3).is_empty());
    }

    #[test]
    fn test_rating_accepts_plural_column() {
        let rating: Rating =
            serde_json::from_str(r#"{"user_id": 1, "item_id": 2, "ratings": 4.0}"#).unwrap();
        assert_eq!(rating, Rating::new(1, 2, 4.0));
    }
}
