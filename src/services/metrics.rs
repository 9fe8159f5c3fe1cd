//! Ranking metrics with binary relevance.
//!
//! All metrics take the ranked recommendations `R`, the relevant set `S`
//! and a cutoff `k`, and return a value in `[0, 1]`.

use std::{collections::HashSet, hash::Hash};

/// Number of relevant items among the first `k` recommendations
fn hits_at_k<T: Eq + Hash>(recommended: &[T], relevant: &HashSet<&T>, k: usize) -> usize {
    recommended
        .iter()
        .take(k)
        .filter(|item| relevant.contains(item))
        .count()
}

/// `|R[:k] ∩ S| / k`, or 0 when `k` is 0
pub fn precision_at_k<T: Eq + Hash>(recommended: &[T], relevant: &[T], k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let relevant: HashSet<&T> = relevant.iter().collect();
    hits_at_k(recommended, &relevant, k) as f64 / k as f64
}

/// `|R[:k] ∩ S| / |S|`, or 0 when `S` is empty
pub fn recall_at_k<T: Eq + Hash>(recommended: &[T], relevant: &[T], k: usize) -> f64 {
    let relevant: HashSet<&T> = relevant.iter().collect();
    if relevant.is_empty() {
        return 0.0;
    }
    hits_at_k(recommended, &relevant, k) as f64 / relevant.len() as f64
}

/// Normalized discounted cumulative gain at `k`
///
/// `DCG = sum 1 / log2(i + 2)` over positions `i < k` holding a relevant item;
/// the ideal ranking puts `min(|S|, k)` relevant items first.
pub fn ndcg_at_k<T: Eq + Hash>(recommended: &[T], relevant: &[T], k: usize) -> f64 {
    let relevant: HashSet<&T> = relevant.iter().collect();
    if relevant.is_empty() || k == 0 {
        return 0.0;
    }

    let dcg: f64 = recommended
        .iter()
        .take(k)
        .enumerate()
        .filter(|(_, item)| relevant.contains(item))
        .map(|(i, _)| discount(i))
        .sum();

    let idcg: f64 = (0..relevant.len().min(k)).map(discount).sum();
    if idcg == 0.0 {
        return 0.0;
    }

    dcg / idcg
}

fn discount(position: usize) -> f64 {
    1.0 / ((position + 2) as f64).log2()
}
