/// Normalized question string used as the exact-match join key.
/// Example: `what is the capital of france`
pub type QuestionKey = String;
/// Single token retained after stop-word filtering.
/// Examples: `capital`, `france`
pub type Keyword = String;
/// Byte offset of a record within the decompressed store stream.
pub type ByteOffset = u64;
/// Jaccard similarity score in `[0.0, 1.0]`.
pub type Similarity = f64;
/// Logical dataset label used in statistics and report sections.
/// Examples: `train`, `dev`
pub type DatasetName = String;
