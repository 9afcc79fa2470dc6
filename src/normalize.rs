//! Question normalization and keyword extraction.
//!
//! Two key tiers feed the join:
//! - `normalize_key` folds case, punctuation, and whitespace; it is the
//!   exact-match join key.
//! - `aggressive_key` additionally drops a leading interrogative word and a
//!   copula that follows it, so `"What is X?"` and `"X"` meet on one key.

use std::collections::HashSet;

use crate::constants::normalize::{COPULAS, INTERROGATIVES, STOP_WORDS};
use crate::types::{Keyword, QuestionKey};

/// Canonicalize a question into the exact-match join key.
///
/// Lowercases, folds ASCII punctuation into spaces, and collapses whitespace
/// runs. Total over any input; whitespace-only input yields an empty key.
/// Idempotent: applying it to its own output changes nothing.
pub fn normalize_key<T: AsRef<str>>(text: T) -> QuestionKey {
    let mut normalized = String::new();
    let mut seen_space = true;
    for ch in text.as_ref().chars() {
        if ch.is_whitespace() || ch.is_ascii_punctuation() {
            if !seen_space {
                normalized.push(' ');
                seen_space = true;
            }
        } else {
            for lower in ch.to_lowercase() {
                normalized.push(lower);
            }
            seen_space = false;
        }
    }
    normalized.trim_end().to_string()
}

/// Canonicalize a question into the aggressive second-tier key.
///
/// Starts from `normalize_key`, then strips one leading interrogative word
/// and one copula that directly follows it. Deterministic; not idempotent
/// for pathological inputs like an interrogative-only question.
pub fn aggressive_key<T: AsRef<str>>(text: T) -> QuestionKey {
    let key = normalize_key(text);
    let mut words = key.split_whitespace();
    let Some(first) = words.next() else {
        return key;
    };
    if !INTERROGATIVES.contains(&first) {
        return key;
    }
    let mut rest: Vec<&str> = words.collect();
    if let Some(second) = rest.first() {
        if COPULAS.contains(second) {
            rest.remove(0);
        }
    }
    rest.join(" ")
}

/// Extract the stop-word-filtered token set of a question.
///
/// Applies `normalize_key`, splits on whitespace, and drops fixed English
/// function words. Empty input yields an empty set.
pub fn extract_keywords<T: AsRef<str>>(text: T) -> HashSet<Keyword> {
    normalize_key(text)
        .split_whitespace()
        .filter(|word| !STOP_WORDS.contains(word))
        .map(str::to_string)
        .collect()
}
