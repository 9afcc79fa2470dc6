//! Keyword-set similarity scoring.

use std::collections::HashSet;

use crate::types::{Keyword, Similarity};

/// Jaccard index over two keyword sets: |A ∩ B| / |A ∪ B|.
///
/// Defined as 0.0 whenever either set is empty, so callers never branch on
/// an empty union. Symmetric in its arguments.
pub fn jaccard(a: &HashSet<Keyword>, b: &HashSet<Keyword>) -> Similarity {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> HashSet<Keyword> {
        words.iter().map(|word| word.to_string()).collect()
    }

    #[test]
    fn empty_sets_score_zero() {
        let empty = set(&[]);
        let full = set(&["alpha", "beta"]);
        assert_eq!(jaccard(&empty, &full), 0.0);
        assert_eq!(jaccard(&full, &empty), 0.0);
        assert_eq!(jaccard(&empty, &empty), 0.0);
    }

    #[test]
    fn identical_sets_score_one() {
        let a = set(&["alpha", "beta", "gamma"]);
        assert_eq!(jaccard(&a, &a), 1.0);
    }

    #[test]
    fn scoring_is_symmetric() {
        let a = set(&["alpha", "beta", "gamma"]);
        let b = set(&["beta", "gamma", "delta"]);
        assert_eq!(jaccard(&a, &b), jaccard(&b, &a));
    }

    #[test]
    fn partial_overlap_scores_intersection_over_union() {
        // |{beta, gamma}| / |{alpha, beta, gamma, delta}| = 2/4
        let a = set(&["alpha", "beta", "gamma"]);
        let b = set(&["beta", "gamma", "delta"]);
        assert_eq!(jaccard(&a, &b), 0.5);

        let disjoint = set(&["epsilon"]);
        assert_eq!(jaccard(&a, &disjoint), 0.0);
    }
}
