//! In-memory question index built over one scan window of a record store.
//!
//! The index holds normalized keys and a small denormalized payload per
//! record. Full document bodies stay in the store and are re-read on demand,
//! which keeps a window's memory footprint proportional to question count
//! rather than document size.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde_json::Value;

use crate::config::DuplicateKeyPolicy;
use crate::normalize::{aggressive_key, extract_keywords, normalize_key};
use crate::similarity::jaccard;
use crate::types::{ByteOffset, Keyword, QuestionKey, Similarity};

/// Where a record lives inside its backing store.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordLocator {
    /// Byte offset into the decompressed stream of a line-oriented store.
    Offset(ByteOffset),
    /// Primary key for keyed backends.
    Key(String),
}

/// Denormalized entry kept per indexed record. Carries exactly the fields
/// needed to emit a merged record plus the locator for re-reading the rest.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexEntry {
    /// Locator for fetching the full record back out of the store.
    pub locator: RecordLocator,
    /// Original (unnormalized) question text.
    pub question: String,
    /// Document URL, denormalized at scan time.
    pub document_url: String,
    /// Example identifier, denormalized at scan time.
    pub example_id: Option<Value>,
}

/// A fuzzy lookup result: the store key that scored best, its entries, and
/// the achieved similarity.
#[derive(Debug)]
pub struct FuzzyHit<'a> {
    /// Normalized store-side key that matched.
    pub key: &'a str,
    /// Entries indexed under that key.
    pub entries: &'a [IndexEntry],
    /// Jaccard similarity between the query and store keyword sets.
    pub similarity: Similarity,
}

/// Question index over one scan window.
///
/// Keys preserve insertion order so that tie-breaks between equally similar
/// candidates resolve to the earliest indexed record.
pub struct QuestionIndex {
    entries: IndexMap<QuestionKey, Vec<IndexEntry>>,
    aggressive: HashMap<QuestionKey, QuestionKey>,
    keywords: HashMap<QuestionKey, HashSet<Keyword>>,
    postings: HashMap<Keyword, Vec<QuestionKey>>,
    policy: DuplicateKeyPolicy,
}

impl QuestionIndex {
    /// Create an empty index with the given duplicate-key policy.
    pub fn new(policy: DuplicateKeyPolicy) -> Self {
        Self {
            entries: IndexMap::new(),
            aggressive: HashMap::new(),
            keywords: HashMap::new(),
            postings: HashMap::new(),
            policy,
        }
    }

    /// Number of distinct normalized keys currently indexed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index one record. Returns `false` when the question normalizes to an
    /// empty key, in which case the record is not indexed.
    pub fn insert(&mut self, entry: IndexEntry) -> bool {
        let key = normalize_key(&entry.question);
        if key.is_empty() {
            return false;
        }
        match self.entries.entry(key.clone()) {
            indexmap::map::Entry::Occupied(mut slot) => match self.policy {
                DuplicateKeyPolicy::FirstWriteWins => {}
                DuplicateKeyPolicy::LastWriteWins => {
                    let existing = slot.get_mut();
                    existing.clear();
                    existing.push(entry);
                }
                DuplicateKeyPolicy::CollectAll => slot.get_mut().push(entry),
            },
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(vec![entry]);
                let words = extract_keywords(&key);
                for word in &words {
                    self.postings.entry(word.clone()).or_default().push(key.clone());
                }
                self.keywords.insert(key.clone(), words);
                let stripped = aggressive_key(&key);
                if !stripped.is_empty() {
                    self.aggressive.entry(stripped).or_insert_with(|| key.clone());
                }
            }
        }
        true
    }

    /// Exact lookup by normalized key.
    pub fn lookup_exact(&self, key: &str) -> Option<&[IndexEntry]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Lookup by aggressively normalized key. The store side maps each key's
    /// stripped form to the first key that produced it, so a query whose
    /// stripped form coincides with a store question still resolves.
    pub fn lookup_aggressive(&self, stripped: &str) -> Option<&[IndexEntry]> {
        if stripped.is_empty() {
            return None;
        }
        let canonical = self.aggressive.get(stripped)?;
        self.entries.get(canonical).map(Vec::as_slice)
    }

    /// Find the best fuzzy match for a query keyword set.
    ///
    /// Only keys sharing at least one keyword with the query are scored.
    /// Among candidates at or above `threshold`, the highest similarity wins;
    /// equal scores resolve to the earliest indexed key.
    pub fn best_fuzzy(
        &self,
        query_keywords: &HashSet<Keyword>,
        threshold: Similarity,
    ) -> Option<FuzzyHit<'_>> {
        if query_keywords.is_empty() {
            return None;
        }
        let mut candidates: HashSet<&QuestionKey> = HashSet::new();
        for word in query_keywords {
            if let Some(keys) = self.postings.get(word) {
                candidates.extend(keys.iter());
            }
        }
        let mut ranked: Vec<&QuestionKey> = candidates.into_iter().collect();
        ranked.sort_by_key(|key| self.entries.get_index_of(key.as_str()));

        let mut best: Option<(Similarity, &QuestionKey)> = None;
        for key in ranked {
            let Some(words) = self.keywords.get(key) else {
                continue;
            };
            let score = jaccard(query_keywords, words);
            if score < threshold {
                continue;
            }
            match best {
                Some((leader, _)) if score <= leader => {}
                _ => best = Some((score, key)),
            }
        }
        best.map(|(similarity, key)| FuzzyHit {
            key,
            entries: self.entries.get(key).map(Vec::as_slice).unwrap_or(&[]),
            similarity,
        })
    }
}
