//! Dataset file format
//!
//! ```json
//! {
//!   "query": [0.1, 0.9, 0.0],
//!   "items": [
//!     { "name": "Margherita", "price": 8.5, "embedding": [0.2, 0.8, 0.1] }
//!   ],
//!   "similarity": [0.97]
//! }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use menulens_core::MenuItem;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Dataset {
    pub query: Vec<f32>,
    pub items: Vec<DatasetItem>,
    #[serde(default)]
    pub similarity: Option<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct DatasetItem {
    pub embedding: Vec<f32>,
    #[serde(flatten)]
    pub item: MenuItem,
}

impl Dataset {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read dataset {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse dataset {}", path.display()))
    }

    /// Split into the embedding matrix rows and the item records.
    pub fn into_parts(self) -> (Vec<f32>, Vec<Vec<f32>>, Vec<MenuItem>, Option<Vec<f64>>) {
        let (embeddings, items) = self
            .items
            .into_iter()
            .map(|entry| (entry.embedding, entry.item))
            .unzip();
        (self.query, embeddings, items, self.similarity)
    }
}
