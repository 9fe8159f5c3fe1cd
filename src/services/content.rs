//! Content-based recommendation from item metadata.
//!
//! Each item's genre text is turned into a TF-IDF vector (smoothed idf,
//! raw term counts, L2-normalized rows) and the full item x item cosine
//! similarity matrix is precomputed at fit time.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    path::Path,
    time::Instant,
};

use crate::{
    error::{AppError, AppResult},
    models::{top_n, user_ratings, Catalog, ItemId, Rating, ScoredItem, UserId},
    services::Recommender,
    store::{load_artifact, save_artifact},
};

const MODEL_NAME: &str = "content";

/// Configuration of the content model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Ratings at or above this value mark an item as liked
    pub min_rating: f64,
    /// Regex matched against the lowercased genre text to extract terms
    pub token_pattern: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            min_rating: 4.0,
            token_pattern: r"[A-Za-z-]+".to_string(),
        }
    }
}

impl ContentConfig {
    pub fn validate(&self) -> AppResult<()> {
        self.compile_pattern().map(|_| ())
    }

    fn compile_pattern(&self) -> AppResult<Regex> {
        if !self.min_rating.is_finite() {
            return Err(AppError::InvalidInput(format!(
                "min_rating must be finite, got {}",
                self.min_rating
            )));
        }
        Regex::new(&self.token_pattern).map_err(|e| {
            AppError::InvalidInput(format!(
                "Invalid token pattern '{}': {}",
                self.token_pattern, e
            ))
        })
    }
}

/// Learned TF-IDF weighting: vocabulary and smoothed inverse document frequencies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermWeights {
    pub vocabulary: BTreeMap<String, usize>,
    pub idf: Vec<f64>,
}

impl TermWeights {
    /// Learns the vocabulary (sorted) and `idf(t) = ln((1 + n) / (1 + df(t))) + 1`
    fn fit(documents: &[Vec<String>]) -> Self {
        let terms: BTreeSet<&str> = documents.iter().flatten().map(String::as_str).collect();
        let vocabulary: BTreeMap<String, usize> = terms
            .into_iter()
            .enumerate()
            .map(|(index, term)| (term.to_string(), index))
            .collect();

        let mut document_frequency = vec![0usize; vocabulary.len()];
        for document in documents {
            let distinct: BTreeSet<usize> = document.iter().map(|t| vocabulary[t]).collect();
            for index in distinct {
                document_frequency[index] += 1;
            }
        }

        let n = documents.len() as f64;
        let idf = document_frequency
            .into_iter()
            .map(|df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        Self { vocabulary, idf }
    }

    /// Sparse L2-normalized TF-IDF vector, sorted by term index
    ///
    /// Out-of-vocabulary terms are dropped; a document without known terms
    /// maps to the empty vector.
    fn vectorize(&self, terms: &[String]) -> Vec<(usize, f64)> {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in terms {
            if let Some(&index) = self.vocabulary.get(term) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut weights: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(index, tf)| (index, tf * self.idf[index]))
            .collect();

        let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut weights {
                *w /= norm;
            }
        }
        weights
    }
}

/// Dense symmetric item x item similarity matrix with its position index
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    item_ids: Vec<ItemId>,
    positions: HashMap<ItemId, usize>,
    values: Vec<f64>,
}

impl SimilarityMatrix {
    fn from_parts(item_ids: Vec<ItemId>, values: Vec<f64>) -> AppResult<Self> {
        let n = item_ids.len();
        if values.len() != n * n {
            return Err(AppError::InvalidInput(format!(
                "Similarity matrix has {} values for {} items",
                values.len(),
                n
            )));
        }

        let positions = item_ids
            .iter()
            .enumerate()
            .map(|(position, &item_id)| (item_id, position))
            .collect();

        Ok(Self {
            item_ids,
            positions,
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.item_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_ids.is_empty()
    }

    pub fn position(&self, item_id: ItemId) -> Option<usize> {
        self.positions.get(&item_id).copied()
    }

    pub fn item_at(&self, position: usize) -> ItemId {
        self.item_ids[position]
    }

    pub fn row(&self, position: usize) -> &[f64] {
        let n = self.len();
        &self.values[position * n..(position + 1) * n]
    }

    pub fn similarity(&self, a: ItemId, b: ItemId) -> Option<f64> {
        Some(self.row(self.position(a)?)[self.position(b)?])
    }
}

#[derive(Debug, Clone)]
struct ContentState {
    weights: TermWeights,
    matrix: SimilarityMatrix,
}

/// Persisted form: term weighting, matrix and liked threshold as one unit
#[derive(Debug, Serialize, Deserialize)]
struct ContentArtifact {
    config: ContentConfig,
    weights: TermWeights,
    item_ids: Vec<ItemId>,
    similarities: Vec<f64>,
}

/// TF-IDF + cosine similarity content model
#[derive(Debug, Clone)]
pub struct ContentModel {
    config: ContentConfig,
    pattern: Regex,
    state: Option<ContentState>,
}

impl ContentModel {
    /// Creates an untrained model
    pub fn new(config: ContentConfig) -> AppResult<Self> {
        let pattern = config.compile_pattern()?;
        Ok(Self {
            config,
            pattern,
            state: None,
        })
    }

    pub fn config(&self) -> &ContentConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.state.is_some()
    }

    pub fn term_weights(&self) -> AppResult<&TermWeights> {
        Ok(&self.state()?.weights)
    }

    pub fn similarity_matrix(&self) -> AppResult<&SimilarityMatrix> {
        Ok(&self.state()?.matrix)
    }

    fn state(&self) -> AppResult<&ContentState> {
        self.state.as_ref().ok_or(AppError::NotTrained(MODEL_NAME))
    }

    /// Builds TF-IDF vectors from the catalog's genre text and the similarity matrix
    pub fn fit(&mut self, catalog: &Catalog) -> AppResult<()> {
        if !catalog.has_genres() {
            return Err(AppError::Schema(
                "Catalog must contain a 'genres' text column".to_string(),
            ));
        }

        let start = Instant::now();

        // 1. One document per distinct item, in catalog order
        let mut seen = HashSet::with_capacity(catalog.len());
        let items: Vec<_> = catalog
            .items()
            .iter()
            .filter(|item| seen.insert(item.item_id))
            .collect();
        let documents: Vec<Vec<String>> = items
            .iter()
            .map(|item| self.tokenize(item.genres.as_deref().unwrap_or_default()))
            .collect();

        // 2. TF-IDF weighting
        let weights = TermWeights::fit(&documents);
        let vectors: Vec<Vec<(usize, f64)>> = documents
            .iter()
            .map(|terms| weights.vectorize(terms))
            .collect();

        // 3. Cosine similarity; rows are unit length so it reduces to a dot product
        let n = vectors.len();
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            values[i * n + i] = 1.0;
            for j in (i + 1)..n {
                let similarity = sparse_dot(&vectors[i], &vectors[j]).clamp(-1.0, 1.0);
                values[i * n + j] = similarity;
                values[j * n + i] = similarity;
            }
        }

        let item_ids = items.iter().map(|item| item.item_id).collect();
        let matrix = SimilarityMatrix::from_parts(item_ids, values)?;

        tracing::info!(
            items = n,
            vocabulary = weights.vocabulary.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Content model trained"
        );

        self.state = Some(ContentState { weights, matrix });
        Ok(())
    }

    /// Items most similar to `item_id`, best first, with their similarity
    pub fn similar_items_scored(
        &self,
        item_id: ItemId,
        catalog: &Catalog,
        n: usize,
    ) -> AppResult<Vec<ScoredItem>> {
        let matrix = &self.state()?.matrix;
        if !catalog.contains(item_id) {
            return Err(AppError::UnknownItem(item_id));
        }
        let position = matrix
            .position(item_id)
            .ok_or(AppError::UnknownItem(item_id))?;

        let scored: Vec<ScoredItem> = matrix
            .row(position)
            .iter()
            .enumerate()
            .filter(|&(other, _)| other != position)
            .map(|(other, &similarity)| ScoredItem::new(matrix.item_at(other), similarity))
            .filter(|scored| catalog.contains(scored.item_id))
            .collect();

        Ok(top_n(scored, n))
    }

    /// Items most similar to `item_id`, best first, excluding the item itself
    pub fn get_similar_items(
        &self,
        item_id: ItemId,
        catalog: &Catalog,
        n: usize,
    ) -> AppResult<Vec<ItemId>> {
        Ok(self
            .similar_items_scored(item_id, catalog, n)?
            .into_iter()
            .map(|scored| scored.item_id)
            .collect())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> AppResult<()> {
        let state = self.state()?;
        let artifact = ContentArtifact {
            config: self.config.clone(),
            weights: state.weights.clone(),
            item_ids: state.matrix.item_ids.clone(),
            similarities: state.matrix.values.clone(),
        };
        save_artifact(path, &artifact)
    }

    /// Loads a trained model saved with [`ContentModel::save`]
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let artifact: ContentArtifact = load_artifact(path)?;
        let matrix = SimilarityMatrix::from_parts(artifact.item_ids, artifact.similarities)?;

        let mut model = Self::new(artifact.config)?;
        model.state = Some(ContentState {
            weights: artifact.weights,
            matrix,
        });
        Ok(model)
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.pattern
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

impl Recommender for ContentModel {
    fn name(&self) -> &'static str {
        MODEL_NAME
    }

    /// Accumulates the similarity rows of every liked item
    ///
    /// Scores are raw sums of cosine similarities and can exceed 1 when
    /// several liked items point at the same candidate.
    fn recommend_scored(
        &self,
        user_id: UserId,
        ratings: &[Rating],
        catalog: &Catalog,
        n: usize,
    ) -> AppResult<Vec<ScoredItem>> {
        let matrix = &self.state()?.matrix;

        let history: Vec<&Rating> = user_ratings(ratings, user_id).collect();
        let seen: HashSet<ItemId> = history.iter().map(|r| r.item_id).collect();
        let liked: Vec<ItemId> = history
            .iter()
            .filter(|r| r.rating >= self.config.min_rating)
            .map(|r| r.item_id)
            .collect();

        if liked.is_empty() {
            tracing::debug!(user_id, "No liked items, nothing to propagate");
            return Ok(Vec::new());
        }

        let mut scored: Vec<ScoredItem> = Vec::new();
        let mut slots: HashMap<ItemId, usize> = HashMap::new();

        for liked_id in liked {
            let Some(position) = matrix.position(liked_id) else {
                continue;
            };

            for (other, &similarity) in matrix.row(position).iter().enumerate() {
                let candidate = matrix.item_at(other);
                if seen.contains(&candidate) || !catalog.contains(candidate) {
                    continue;
                }

                match slots.get(&candidate) {
                    Some(&slot) => scored[slot].score += similarity,
                    None => {
                        slots.insert(candidate, scored.len());
                        scored.push(ScoredItem::new(candidate, similarity));
                    }
                }
            }
        }

        Ok(top_n(scored, n))
    }
}

fn sparse_dot(a: &[(usize, f64)], b: &[(usize, f64)]) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut sum = 0.0;

    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }

    sum
}
