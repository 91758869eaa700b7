use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::VizError;

/// Environment variable prefix, e.g. `MENULENS__PROJECTION__N_NEIGHBORS=8`.
pub const ENV_PREFIX: &str = "MENULENS";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct VizConfig {
    pub projection: ProjectionConfig,
    pub render: RenderConfig,
}

/// Distance used to build the neighbour graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    Euclidean,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProjectionConfig {
    pub n_neighbors: usize,
    pub min_dist: f32,
    pub spread: f32,
    pub metric: Metric,
    pub random_state: u64,
    /// 0 selects the size-based default (500, or 200 above 10k points).
    pub n_epochs: usize,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            min_dist: 0.3,
            spread: 1.0,
            metric: Metric::Cosine,
            random_state: 42,
            n_epochs: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RenderConfig {
    pub title: String,
    pub height: u32,
    pub query_label: String,
    pub query_category: String,
    pub candidate_category: String,
    pub query_color: String,
    pub candidate_color: String,
    pub plotly_js_url: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            title: "🍕 Embedding projection (UMAP)".to_string(),
            height: 600,
            query_label: "user query".to_string(),
            query_category: "query".to_string(),
            candidate_category: "candidate".to_string(),
            query_color: "blue".to_string(),
            candidate_color: "red".to_string(),
            plotly_js_url: "https://cdn.plot.ly/plotly-2.35.2.min.js".to_string(),
        }
    }
}

impl VizConfig {
    /// Load from an optional TOML file, then apply `MENULENS__*` overrides.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        let s = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        s.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), VizError> {
        self.projection.validate()?;
        if self.render.height == 0 {
            return Err(VizError::InvalidConfig(
                "render.height must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl ProjectionConfig {
    pub fn validate(&self) -> Result<(), VizError> {
        if self.n_neighbors < 2 {
            return Err(VizError::InvalidConfig(format!(
                "projection.n_neighbors must be at least 2, got {}",
                self.n_neighbors
            )));
        }
        if !(self.spread > 0.0) {
            return Err(VizError::InvalidConfig(format!(
                "projection.spread must be positive, got {}",
                self.spread
            )));
        }
        if !(0.0..=self.spread).contains(&self.min_dist) {
            return Err(VizError::InvalidConfig(format!(
                "projection.min_dist must lie in [0, spread], got {}",
                self.min_dist
            )));
        }
        Ok(())
    }

    /// Number of optimization epochs for a dataset of `n_points`.
    pub fn epochs_for(&self, n_points: usize) -> usize {
        match self.n_epochs {
            0 if n_points <= 10_000 => 500,
            0 => 200,
            n => n,
        }
    }
}
