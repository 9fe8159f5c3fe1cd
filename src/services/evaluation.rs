//! Offline evaluation harness.
//!
//! Splits the rating history per user, asks a model for recommendations for
//! a bounded sample of users and scores the lists against each user's
//! held-out relevant items.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt::Display,
    time::Instant,
};

use crate::{
    error::{AppError, AppResult},
    models::{user_ratings, Catalog, ItemId, Rating, UserId},
    services::{
        metrics::{ndcg_at_k, precision_at_k, recall_at_k},
        Recommender,
    },
};

/// Evaluation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Fraction of each user's ratings held out for testing
    pub test_size: f64,
    /// Seed of the per-user shuffle
    pub seed: u64,
    /// Metric cutoffs
    pub k_values: Vec<usize>,
    /// Maximum number of users evaluated per model
    pub sample_users: usize,
    /// Held-out ratings at or above this value are relevant
    pub min_rating: f64,
    /// Length of the list requested from the model for each user
    pub recommendations_per_user: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
            k_values: vec![5, 10, 20],
            sample_users: 100,
            min_rating: 4.0,
            recommendations_per_user: 20,
        }
    }
}

impl EvaluationConfig {
    pub fn validate(&self) -> AppResult<()> {
        if !(0.0..=1.0).contains(&self.test_size) {
            return Err(AppError::InvalidInput(format!(
                "test_size must be within [0, 1], got {}",
                self.test_size
            )));
        }
        if self.k_values.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one k value is required".to_string(),
            ));
        }
        if self.recommendations_per_user == 0 {
            return Err(AppError::InvalidInput(
                "recommendations_per_user must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Splits every user's ratings into train and test sides
///
/// Each user's ratings are shuffled with a generator seeded by `seed`, then the
/// first `max(1, floor(count * test_size))` go to the test side. Every rating
/// lands on exactly one side and every user contributes at least one test item.
pub fn train_test_split_by_user(
    ratings: &[Rating],
    test_size: f64,
    seed: u64,
) -> AppResult<(Vec<Rating>, Vec<Rating>)> {
    if !(0.0..=1.0).contains(&test_size) {
        return Err(AppError::InvalidInput(format!(
            "test_size must be within [0, 1], got {}",
            test_size
        )));
    }

    let mut by_user: Vec<(UserId, Vec<Rating>)> = Vec::new();
    let mut slots: HashMap<UserId, usize> = HashMap::new();
    for rating in ratings {
        let slot = *slots.entry(rating.user_id).or_insert_with(|| {
            by_user.push((rating.user_id, Vec::new()));
            by_user.len() - 1
        });
        by_user[slot].1.push(*rating);
    }

    let mut train = Vec::with_capacity(ratings.len());
    let mut test = Vec::new();

    for (_, mut history) in by_user {
        let mut rng = StdRng::seed_from_u64(seed);
        history.shuffle(&mut rng);

        let n_test = ((history.len() as f64 * test_size).floor() as usize).max(1);
        let (held_out, kept) = history.split_at(n_test.min(history.len()));
        test.extend_from_slice(held_out);
        train.extend_from_slice(kept);
    }

    tracing::info!(
        users = slots.len(),
        train = train.len(),
        test = test.len(),
        "Per-user split created"
    );
    Ok((train, test))
}

/// Items the user rated at or above `min_rating` in the held-out split
pub fn relevant_items(user_id: UserId, test: &[Rating], min_rating: f64) -> Vec<ItemId> {
    user_ratings(test, user_id)
        .filter(|r| r.rating >= min_rating)
        .map(|r| r.item_id)
        .collect()
}

/// Metrics of one model for one user at one cutoff
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRecord {
    pub model_name: String,
    pub user_id: UserId,
    pub k: usize,
    pub precision: f64,
    pub recall: f64,
    pub ndcg: f64,
}

/// Why a sampled user contributed no records
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoRelevantItems,
    RecommendationFailed(String),
}

/// Result of evaluating a single user
#[derive(Debug, Clone, PartialEq)]
pub enum UserOutcome {
    Evaluated(Vec<EvaluationRecord>),
    Skipped(SkipReason),
}

/// All per-user outcomes of one model
#[derive(Debug, Clone)]
pub struct EvaluationRun {
    pub model_name: String,
    pub outcomes: Vec<(UserId, UserOutcome)>,
}

impl EvaluationRun {
    pub fn records(&self) -> impl Iterator<Item = &EvaluationRecord> {
        self.outcomes.iter().flat_map(|(_, outcome)| match outcome {
            UserOutcome::Evaluated(records) => records.as_slice(),
            UserOutcome::Skipped(_) => &[][..],
        })
    }

    pub fn evaluated_users(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, UserOutcome::Evaluated(_)))
            .count()
    }

    pub fn failed_users(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| {
                matches!(
                    outcome,
                    UserOutcome::Skipped(SkipReason::RecommendationFailed(_))
                )
            })
            .count()
    }
}

/// Evaluates one user: relevant set, one recommendation list, all cutoffs
///
/// A model error is absorbed into [`SkipReason::RecommendationFailed`] so one
/// pathological user cannot abort a whole run.
pub fn evaluate_user(
    model: &dyn Recommender,
    user_id: UserId,
    train: &[Rating],
    test: &[Rating],
    catalog: &Catalog,
    config: &EvaluationConfig,
) -> UserOutcome {
    let relevant = relevant_items(user_id, test, config.min_rating);
    if relevant.is_empty() {
        return UserOutcome::Skipped(SkipReason::NoRelevantItems);
    }

    let recommended =
        match model.recommend(user_id, train, catalog, config.recommendations_per_user) {
            Ok(recommended) => recommended,
            Err(e) => {
                tracing::warn!(
                    model = model.name(),
                    user_id,
                    error = %e,
                    "Recommendation failed, skipping user"
                );
                return UserOutcome::Skipped(SkipReason::RecommendationFailed(e.to_string()));
            }
        };

    let records = config
        .k_values
        .iter()
        .map(|&k| EvaluationRecord {
            model_name: model.name().to_string(),
            user_id,
            k,
            precision: precision_at_k(&recommended, &relevant, k),
            recall: recall_at_k(&recommended, &relevant, k),
            ndcg: ndcg_at_k(&recommended, &relevant, k),
        })
        .collect();

    UserOutcome::Evaluated(records)
}

/// Evaluates a model over the first `sample_users` distinct users of the training side
pub fn evaluate_model(
    model: &dyn Recommender,
    train: &[Rating],
    test: &[Rating],
    catalog: &Catalog,
    config: &EvaluationConfig,
) -> EvaluationRun {
    let start = Instant::now();
    let mut seen = HashSet::new();
    let users: Vec<UserId> = train
        .iter()
        .map(|r| r.user_id)
        .filter(|user_id| seen.insert(*user_id))
        .take(config.sample_users)
        .collect();

    tracing::info!(model = model.name(), users = users.len(), "Evaluating model");

    let mut outcomes = Vec::with_capacity(users.len());
    for (i, &user_id) in users.iter().enumerate() {
        if (i + 1) % 25 == 0 {
            tracing::debug!(model = model.name(), done = i + 1, total = users.len(), "Progress");
        }
        let outcome = evaluate_user(model, user_id, train, test, catalog, config);
        outcomes.push((user_id, outcome));
    }

    let run = EvaluationRun {
        model_name: model.name().to_string(),
        outcomes,
    };

    tracing::info!(
        model = %run.model_name,
        evaluated = run.evaluated_users(),
        failed = run.failed_users(),
        elapsed_ms = start.elapsed().as_millis(),
        "Model evaluated"
    );
    run
}

/// Mean metrics of one model at one cutoff
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub model_name: String,
    pub k: usize,
    pub precision: f64,
    pub recall: f64,
    pub ndcg: f64,
    /// Number of users the means are taken over
    pub users: usize,
}

/// Aggregates records into per-(model, k) means, ordered by model name then k
pub fn summarize<'a>(records: impl IntoIterator<Item = &'a EvaluationRecord>) -> Vec<MetricSummary> {
    let mut groups: BTreeMap<(String, usize), (f64, f64, f64, usize)> = BTreeMap::new();

    for record in records {
        let entry = groups
            .entry((record.model_name.clone(), record.k))
            .or_insert((0.0, 0.0, 0.0, 0));
        entry.0 += record.precision;
        entry.1 += record.recall;
        entry.2 += record.ndcg;
        entry.3 += 1;
    }

    groups
        .into_iter()
        .map(|((model_name, k), (precision, recall, ndcg, users))| {
            let count = users as f64;
            MetricSummary {
                model_name,
                k,
                precision: precision / count,
                recall: recall / count,
                ndcg: ndcg / count,
                users,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Precision,
    Recall,
    Ndcg,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Precision, Metric::Recall, Metric::Ndcg];

    pub fn value(&self, summary: &MetricSummary) -> f64 {
        match self {
            Metric::Precision => summary.precision,
            Metric::Recall => summary.recall,
            Metric::Ndcg => summary.ndcg,
        }
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Precision => write!(f, "precision"),
            Metric::Recall => write!(f, "recall"),
            Metric::Ndcg => write!(f, "ndcg"),
        }
    }
}

/// Best model for one metric at one cutoff
#[derive(Debug, Clone, PartialEq)]
pub struct BestModel {
    pub k: usize,
    pub metric: Metric,
    pub model_name: String,
    pub value: f64,
}

/// Picks the best model per (k, metric); on equal values the first summary wins
pub fn best_by_metric(summaries: &[MetricSummary]) -> Vec<BestModel> {
    let ks: Vec<usize> = summaries
        .iter()
        .map(|s| s.k)
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut best = Vec::new();
    for k in ks {
        for metric in Metric::ALL {
            let winner = summaries
                .iter()
                .filter(|s| s.k == k)
                .fold(None::<&MetricSummary>, |current, candidate| match current {
                    Some(c) if metric.value(c) >= metric.value(candidate) => Some(c),
                    _ => Some(candidate),
                });

            if let Some(winner) = winner {
                best.push(BestModel {
                    k,
                    metric,
                    model_name: winner.model_name.clone(),
                    value: metric.value(winner),
                });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{Item, ScoredItem},
        services::{LatentConfig, LatentFactorModel},
    };
    use mockall::mock;

    mock! {
        pub Ranker {}

        impl Recommender for Ranker {
            fn name(&self) -> &'static str;
            fn recommend_scored(
                &self,
                user_id: UserId,
                ratings: &[Rating],
                catalog: &Catalog,
                n: usize,
            ) -> AppResult<Vec<ScoredItem>>;
            fn recommend(
                &self,
                user_id: UserId,
                ratings: &[Rating],
                catalog: &Catalog,
                n: usize,
            ) -> AppResult<Vec<ItemId>>;
        }
    }

    fn history() -> Vec<Rating> {
        let mut ratings = Vec::new();
        for user_id in 1..=4u32 {
            for item_id in 1..=(user_id * 3) {
                let rating = if (item_id + user_id) % 2 == 0 { 5.0 } else { 2.0 };
                ratings.push(Rating::new(user_id, item_id, rating));
            }
        }
        ratings
    }

    fn count_for(ratings: &[Rating], user_id: UserId) -> usize {
        ratings.iter().filter(|r| r.user_id == user_id).count()
    }

    #[test]
    fn test_split_preserves_every_rating() {
        let ratings = history();
        let (train, test) = train_test_split_by_user(&ratings, 0.2, 42).unwrap();

        assert_eq!(train.len() + test.len(), ratings.len());
        for user_id in 1..=4 {
            let total = count_for(&ratings, user_id);
            let held_out = count_for(&test, user_id);
            assert_eq!(count_for(&train, user_id) + held_out, total);
            assert!(held_out >= 1);
            assert_eq!(held_out, ((total as f64 * 0.2).floor() as usize).max(1));
        }

        let mut rejoined: Vec<(UserId, ItemId)> = train
            .iter()
            .chain(test.iter())
            .map(|r| (r.user_id, r.item_id))
            .collect();
        let mut original: Vec<(UserId, ItemId)> =
            ratings.iter().map(|r| (r.user_id, r.item_id)).collect();
        rejoined.sort();
        original.sort();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn test_split_single_rating_goes_to_test() {
        let ratings = vec![Rating::new(7, 1, 4.0)];
        let (train, test) = train_test_split_by_user(&ratings, 0.2, 42).unwrap();

        assert!(train.is_empty());
        assert_eq!(test, ratings);
    }

    #[test]
    fn test_split_is_deterministic() {
        let ratings = history();
        let first = train_test_split_by_user(&ratings, 0.3, 11).unwrap();
        let second = train_test_split_by_user(&ratings, 0.3, 11).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_split_rejects_bad_test_size() {
        assert!(matches!(
            train_test_split_by_user(&history(), 1.5, 42),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_relevant_items() {
        let test = vec![Rating::new(1, 10, 5.0), Rating::new(1, 20, 3.0)];
        assert_eq!(relevant_items(1, &test, 4.0), vec![10]);
        assert!(relevant_items(2, &test, 4.0).is_empty());
    }

    #[test]
    fn test_evaluate_model_distinguishes_skips() {
        let train = vec![
            Rating::new(1, 1, 5.0),
            Rating::new(2, 1, 5.0),
            Rating::new(3, 1, 5.0),
        ];
        let test = vec![
            Rating::new(1, 10, 5.0),
            Rating::new(1, 20, 4.0),
            Rating::new(2, 10, 5.0),
            Rating::new(3, 30, 1.0),
        ];

        let mut ranker = MockRanker::new();
        ranker.expect_name().return_const("mock");
        ranker
            .expect_recommend()
            .times(2)
            .returning(|user_id, _, _, n| {
                assert_eq!(n, 20);
                if user_id == 2 {
                    Err(AppError::Internal("model exploded".to_string()))
                } else {
                    Ok(vec![10, 30, 40, 20])
                }
            });

        let config = EvaluationConfig {
            k_values: vec![1, 2, 4],
            ..EvaluationConfig::default()
        };
        let catalog = Catalog::new(vec![Item::new(1, "One", "Drama")]);
        let run = evaluate_model(&ranker, &train, &test, &catalog, &config);

        assert_eq!(run.model_name, "mock");
        assert_eq!(run.outcomes.len(), 3);
        assert_eq!(run.evaluated_users(), 1);
        assert_eq!(run.failed_users(), 1);
        assert!(matches!(
            &run.outcomes[1],
            (2, UserOutcome::Skipped(SkipReason::RecommendationFailed(msg))) if msg.contains("exploded")
        ));
        assert_eq!(
            run.outcomes[2],
            (3, UserOutcome::Skipped(SkipReason::NoRelevantItems))
        );

        let records: Vec<&EvaluationRecord> = run.records().collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].k, 1);
        assert_eq!(records[0].precision, 1.0);
        assert_eq!(records[0].recall, 0.5);
        assert_eq!(records[1].precision, 0.5);
        assert_eq!(records[2].precision, 0.5);
        assert_eq!(records[2].recall, 1.0);
        assert!(records.iter().all(|r| r.user_id == 1 && r.model_name == "mock"));
    }

    #[test]
    fn test_evaluate_model_samples_users_in_order() {
        let ratings = history();
        let (train, test) = train_test_split_by_user(&ratings, 0.5, 42).unwrap();

        let mut ranker = MockRanker::new();
        ranker.expect_name().return_const("mock");
        ranker
            .expect_recommend()
            .returning(|_, _, _, _| Ok(vec![1, 2, 3]));

        let config = EvaluationConfig {
            sample_users: 2,
            ..EvaluationConfig::default()
        };
        let run = evaluate_model(&ranker, &train, &test, &Catalog::default(), &config);

        let users: Vec<UserId> = run.outcomes.iter().map(|(user_id, _)| *user_id).collect();
        assert_eq!(users, vec![1, 2]);
    }

    #[test]
    fn test_summarize_means_per_model_and_k() {
        let record = |model: &str, user_id, k, precision, recall, ndcg| EvaluationRecord {
            model_name: model.to_string(),
            user_id,
            k,
            precision,
            recall,
            ndcg,
        };
        let records = vec![
            record("hybrid", 1, 5, 0.2, 0.5, 0.4),
            record("hybrid", 2, 5, 0.4, 1.0, 0.6),
            record("content", 1, 5, 0.0, 0.0, 0.0),
            record("hybrid", 1, 10, 0.1, 0.5, 0.3),
        ];

        let summary = summarize(&records);
        assert_eq!(summary.len(), 3);
        assert_eq!((summary[0].model_name.as_str(), summary[0].k), ("content", 5));
        assert_eq!((summary[1].model_name.as_str(), summary[1].k), ("hybrid", 5));
        assert_eq!((summary[2].model_name.as_str(), summary[2].k), ("hybrid", 10));

        let hybrid = &summary[1];
        assert_eq!(hybrid.users, 2);
        assert!((hybrid.precision - 0.3).abs() < 1e-12);
        assert!((hybrid.recall - 0.75).abs() < 1e-12);
        assert!((hybrid.ndcg - 0.5).abs() < 1e-12);

        let best = best_by_metric(&summary);
        assert_eq!(best.len(), 6);
        let ndcg_at_5 = best
            .iter()
            .find(|b| b.k == 5 && b.metric == Metric::Ndcg)
            .unwrap();
        assert_eq!(ndcg_at_5.model_name, "hybrid");
        assert!((ndcg_at_5.value - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_trained_latent_model() {
        let ratings = history();
        let (train, test) = train_test_split_by_user(&ratings, 0.25, 42).unwrap();
        let catalog: Catalog = (1..=12)
            .map(|id| Item::new(id, format!("Movie {}", id), "Drama"))
            .collect();

        let mut model = LatentFactorModel::new(LatentConfig {
            n_factors: 4,
            n_epochs: 10,
            ..LatentConfig::default()
        })
        .unwrap();
        model.fit(&train).unwrap();

        let config = EvaluationConfig::default();
        let run = evaluate_model(&model, &train, &test, &catalog, &config);
        assert_eq!(run.model_name, "collaborative");
        assert_eq!(run.failed_users(), 0);

        for record in run.records() {
            for value in [record.precision, record.recall, record.ndcg] {
                assert!((0.0..=1.0).contains(&value));
            }
        }
        let summary = summarize(run.records());
        assert!(summary.iter().all(|s| s.users == run.evaluated_users()));
    }
}
