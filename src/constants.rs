/// Constants used by question normalization and keyword extraction.
pub mod normalize {
    /// English function words excluded from keyword sets. Interrogatives
    /// count as function words: nearly every question contains one.
    pub const STOP_WORDS: &[&str] = &[
        "a", "an", "the", "is", "was", "were", "will", "be", "to", "of", "and", "in", "on", "at",
        "by", "for", "with", "about", "from", "did", "does", "do", "has", "have", "had", "what",
        "when", "where", "who", "why", "how", "which", "whose", "whom", "that",
    ];
    /// Leading interrogatives stripped by the aggressive key tier.
    pub const INTERROGATIVES: &[&str] = &[
        "what", "when", "where", "who", "why", "how", "which", "whose", "whom", "that",
    ];
    /// Copulas stripped when they lead after the interrogative is removed.
    pub const COPULAS: &[&str] = &["is", "was", "were"];
}

/// Constants used by the reconciliation engine and its defaults.
pub mod engine {
    /// Default number of store records indexed per chunk window.
    pub const DEFAULT_CHUNK_SIZE: usize = 10_000;
    /// Default number of output records buffered between flushes.
    pub const DEFAULT_BATCH_SIZE: usize = 1_000;
    /// Default acceptance threshold for fuzzy matches.
    pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;
    /// Store records between indexing progress log lines.
    pub const STORE_PROGRESS_EVERY: usize = 10_000;
    /// Query records between matching progress log lines.
    pub const QUERY_PROGRESS_EVERY: usize = 1_000;
    /// Log message used when malformed store lines are skipped.
    pub const SKIP_MALFORMED_MSG: &str = "skipping malformed store line";
    /// Log message used when malformed query lines are skipped.
    pub const SKIP_QUERY_MSG: &str = "skipping malformed query line";
}

/// Constants describing default file names and output naming.
pub mod layout {
    /// Default record store file name.
    pub const STORE_FILE: &str = "v1.0-simplified_simplified-nq-train.jsonl.gz";
    /// Default query file for the train split.
    pub const TRAIN_QUERY_FILE: &str = "NQ-open.train.jsonl";
    /// Default query file for the dev split.
    pub const DEV_QUERY_FILE: &str = "NQ-open.dev.jsonl";
    /// Suffix replacing `.jsonl` on a query file name for merged output.
    pub const MERGED_SUFFIX: &str = ".merged.jsonl";
    /// Unmatched output file for the train split.
    pub const TRAIN_UNMATCHED_FILE: &str = "unmatched_questions_train.jsonl";
    /// Unmatched output file for the dev split.
    pub const DEV_UNMATCHED_FILE: &str = "unmatched_questions_dev.jsonl";
    /// Default filename for the run report.
    pub const REPORT_FILE: &str = "processing_report.txt";
}

/// Constants used by the SQLite store backend.
pub mod sqlite {
    /// Table holding one row per normalized question key.
    pub const TABLE: &str = "question_data";
    /// Rows inserted per transaction while loading records.
    pub const INSERT_BATCH: usize = 1_000;
}

/// Constants used by the run report.
pub mod report {
    /// Fuzzy matches kept per dataset as report examples.
    pub const FUZZY_EXAMPLES_KEPT: usize = 5;
}
