use thiserror::Error;

#[derive(Error, Debug)]
pub enum VizError {
    #[error("Dimension mismatch: expected {expected} dimensions, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid {what} shape {shape:?}: {reason}")]
    InvalidShape {
        what: &'static str,
        shape: Vec<usize>,
        reason: &'static str,
    },

    #[error("Ragged embedding rows: row {row} has {actual} values, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Embeddings must have at least one dimension")]
    EmptyEmbedding,

    #[error("Non-finite value in {what} at flat index {index}")]
    NonFinite { what: &'static str, index: usize },

    #[error("Similarity count mismatch: {candidates} candidates, {scores} scores")]
    ScoreCountMismatch { candidates: usize, scores: usize },

    #[error("Item count mismatch: {candidates} candidates, {items} item records")]
    ItemCountMismatch { candidates: usize, items: usize },

    #[error("Scalar expected, got {elements} elements")]
    InvalidScalar { elements: usize },

    #[error("Tensor error: {0}")]
    Tensor(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to open chart with {opener}: {message}")]
    Open { opener: String, message: String },
}
