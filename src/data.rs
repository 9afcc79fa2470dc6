use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::index::IndexEntry;
use crate::types::Similarity;

/// One record from the annotated store: the question used for joining plus
/// the document payload carried into merged output.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoreRecord {
    /// Question text the join key is derived from.
    #[serde(default)]
    pub question_text: String,
    /// Source document URL.
    #[serde(default)]
    pub document_url: String,
    /// Source document title.
    #[serde(default)]
    pub document_title: String,
    /// Upstream example identifier; kept as raw JSON so integer and string
    /// ids round-trip unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_id: Option<Value>,
    /// Annotation objects carried through verbatim.
    #[serde(default)]
    pub annotations: Vec<Value>,
    /// Long-answer candidate spans carried through verbatim.
    #[serde(default)]
    pub long_answer_candidates: Vec<Value>,
    /// Full document text.
    #[serde(default)]
    pub document_text: String,
}

/// One query-side record: the question/answer pair to reconcile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryRecord {
    /// Original question text, carried verbatim into output.
    pub question: String,
    /// Accepted answers, carried verbatim into output.
    #[serde(default)]
    pub answer: Vec<Value>,
}

/// A reconciled output record: query-side fields plus store-side payload.
///
/// `nq_similarity` and `nq_question` appear only on fuzzy matches.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MergedRecord {
    /// Query-side question, verbatim.
    pub question: String,
    /// Query-side answers, verbatim.
    #[serde(default)]
    pub answer: Vec<Value>,
    /// Document text from the fetched record.
    #[serde(default)]
    pub document_text: String,
    /// Document URL denormalized into the index at scan time.
    #[serde(default)]
    pub document_url: String,
    /// Annotations from the fetched record.
    #[serde(default)]
    pub annotations: Vec<Value>,
    /// Long-answer candidates from the fetched record.
    #[serde(default)]
    pub long_answer_candidates: Vec<Value>,
    /// Example identifier denormalized into the index at scan time.
    pub example_id: Option<Value>,
    /// Jaccard score of the fuzzy match; absent on the exact path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nq_similarity: Option<Similarity>,
    /// Store-side question the fuzzy path matched; absent on the exact path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nq_question: Option<String>,
}

impl MergedRecord {
    /// Combine a query with a fetched store record. The URL and example id
    /// come from the index entry, which denormalized them at scan time.
    pub fn merge(query: &QueryRecord, entry: &IndexEntry, record: StoreRecord) -> Self {
        Self {
            question: query.question.clone(),
            answer: query.answer.clone(),
            document_text: record.document_text,
            document_url: entry.document_url.clone(),
            annotations: record.annotations,
            long_answer_candidates: record.long_answer_candidates,
            example_id: entry.example_id.clone(),
            nq_similarity: None,
            nq_question: None,
        }
    }

    /// Attach fuzzy-path metadata: the achieved score and the store-side
    /// question it was scored against.
    pub fn with_fuzzy(mut self, similarity: Similarity, matched_question: impl Into<String>) -> Self {
        self.nq_similarity = Some(similarity);
        self.nq_question = Some(matched_question.into());
        self
    }
}

/// A query that could not be reconciled.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnmatchedRecord {
    /// Query-side question, verbatim.
    pub question: String,
    /// Query-side answers, verbatim.
    #[serde(default)]
    pub answer: Vec<Value>,
    /// Why the query failed to reconcile, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<UnmatchedReason>,
}

impl UnmatchedRecord {
    /// Build from a query with the given reason.
    pub fn with_reason(query: QueryRecord, reason: UnmatchedReason) -> Self {
        Self {
            question: query.question,
            answer: query.answer,
            error: Some(reason),
        }
    }
}

/// Reason code attached to unmatched output records.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedReason {
    /// No store entry reached the similarity threshold.
    NoMatch,
    /// An index entry matched but its record could not be re-read.
    FetchFailed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn store_record_tolerates_missing_fields() {
        let record: StoreRecord = serde_json::from_str(r#"{"question_text": "who?"}"#).unwrap();
        assert_eq!(record.question_text, "who?");
        assert_eq!(record.document_url, "");
        assert!(record.annotations.is_empty());
        assert!(record.example_id.is_none());
    }

    #[test]
    fn merged_record_serializes_expected_shape() {
        let query = QueryRecord {
            question: "Who wrote Hamlet?".to_string(),
            answer: vec![json!("Shakespeare")],
        };
        let entry = IndexEntry {
            locator: crate::index::RecordLocator::Offset(0),
            question: "who wrote hamlet".to_string(),
            document_url: "http://example.test/hamlet".to_string(),
            example_id: Some(json!(7)),
        };
        let record = StoreRecord {
            question_text: "who wrote hamlet".to_string(),
            document_text: "Hamlet is a tragedy.".to_string(),
            ..StoreRecord::default()
        };
        let merged = MergedRecord::merge(&query, &entry, record);
        let value = serde_json::to_value(&merged).unwrap();
        assert_eq!(value["question"], json!("Who wrote Hamlet?"));
        assert_eq!(value["document_url"], json!("http://example.test/hamlet"));
        assert_eq!(value["example_id"], json!(7));
        assert!(value.get("nq_similarity").is_none());
        assert!(value.get("nq_question").is_none());

        let fuzzy = serde_json::to_value(
            MergedRecord::merge(&query, &entry, StoreRecord::default())
                .with_fuzzy(0.75, "who wrote hamlet"),
        )
        .unwrap();
        assert_eq!(fuzzy["nq_similarity"], json!(0.75));
        assert_eq!(fuzzy["nq_question"], json!("who wrote hamlet"));
    }

    #[test]
    fn unmatched_reasons_use_snake_case_codes() {
        let unmatched = UnmatchedRecord::with_reason(
            QueryRecord {
                question: "q".to_string(),
                answer: Vec::new(),
            },
            UnmatchedReason::NoMatch,
        );
        let value = serde_json::to_value(&unmatched).unwrap();
        assert_eq!(value["error"], json!("no_match"));

        let fetch = serde_json::to_value(UnmatchedRecord::with_reason(
            QueryRecord {
                question: "q".to_string(),
                answer: Vec::new(),
            },
            UnmatchedReason::FetchFailed,
        ))
        .unwrap();
        assert_eq!(fetch["error"], json!("fetch_failed"));
    }
}
