//! End-to-end pipeline: normalize → stack → project → annotate → render
//!
//! ```no_run
//! use menulens_core::{plot_umap, MenuItem, VizConfig};
//!
//! let query = vec![0.1f32, 0.9, 0.0];
//! let menu = vec![vec![0.2f32, 0.8, 0.1], vec![0.9, 0.0, 0.3]];
//! let items = vec![MenuItem::new("Margherita"), MenuItem::new("Tiramisu")];
//! let scores = [0.97f32, 0.12];
//!
//! let path = plot_umap(&query, &menu, &items, Some(&scores[..]), &VizConfig::default())?;
//! println!("chart written to {}", path.display());
//! # Ok::<(), menulens_core::VizError>(())
//! ```

use std::path::PathBuf;

use ndarray::{Array1, Array2};

use crate::annotate::annotate;
use crate::config::VizConfig;
use crate::error::VizError;
use crate::input::{
    normalize_candidates, normalize_query, scores_from_scalars, scores_from_tensor, stack,
    HostTensor, ScalarLike,
};
use crate::models::item::ItemName;
use crate::models::table::ProjectionTable;
use crate::projection::{DimensionReducer, Umap};
use crate::render::{build_figure, show, Figure};

/// Validated inputs for one plot: a query, its candidates and their records.
#[derive(Debug, Clone)]
pub struct EmbeddingPlot<'a, I> {
    query: Array1<f32>,
    candidates: Array2<f32>,
    items: &'a [I],
    scores: Option<Vec<f64>>,
}

impl<'a, I: ItemName> EmbeddingPlot<'a, I> {
    /// Normalize both embedding inputs and check they line up with `items`.
    pub fn new<Q, C>(query: &Q, candidates: &C, items: &'a [I]) -> Result<Self, VizError>
    where
        Q: HostTensor + ?Sized,
        C: HostTensor + ?Sized,
    {
        let query = normalize_query(query)?;
        let candidates = normalize_candidates(candidates)?;
        if candidates.nrows() > 0 && candidates.ncols() != query.len() {
            return Err(VizError::DimensionMismatch {
                expected: query.len(),
                actual: candidates.ncols(),
            });
        }
        if candidates.nrows() != items.len() {
            return Err(VizError::ItemCountMismatch {
                candidates: candidates.nrows(),
                items: items.len(),
            });
        }
        Ok(Self {
            query,
            candidates,
            items,
            scores: None,
        })
    }

    /// Attach one similarity score per candidate.
    pub fn with_scores<S: ScalarLike>(self, scores: &[S]) -> Result<Self, VizError> {
        self.with_plain_scores(scores_from_scalars(scores)?)
    }

    /// Attach similarity scores held in a single vector-shaped tensor.
    pub fn with_score_tensor<T: HostTensor + ?Sized>(self, scores: &T) -> Result<Self, VizError> {
        self.with_plain_scores(scores_from_tensor(scores)?)
    }

    fn with_plain_scores(mut self, scores: Vec<f64>) -> Result<Self, VizError> {
        if scores.len() != self.candidates.nrows() {
            return Err(VizError::ScoreCountMismatch {
                candidates: self.candidates.nrows(),
                scores: scores.len(),
            });
        }
        self.scores = Some(scores);
        Ok(self)
    }

    pub fn query(&self) -> &Array1<f32> {
        &self.query
    }

    pub fn candidates(&self) -> &Array2<f32> {
        &self.candidates
    }

    pub fn scores(&self) -> Option<&[f64]> {
        self.scores.as_deref()
    }

    /// Project with the given reducer and build the labelled table.
    pub fn table_with(
        &self,
        reducer: &dyn DimensionReducer,
        query_label: &str,
    ) -> Result<ProjectionTable, VizError> {
        let stacked = stack(&self.query, &self.candidates)?;
        tracing::debug!(
            reducer = reducer.name(),
            points = stacked.nrows(),
            dims = stacked.ncols(),
            "Projecting embeddings"
        );
        let coords = reducer.fit_transform(&stacked)?;
        annotate(&coords, self.items, self.scores.as_deref(), query_label)
    }

    /// Project with UMAP as configured and build the labelled table.
    pub fn table(&self, config: &VizConfig) -> Result<ProjectionTable, VizError> {
        config.validate()?;
        let umap = Umap::new(config.projection.clone())?;
        self.table_with(&umap, &config.render.query_label)
    }

    pub fn figure(&self, config: &VizConfig) -> Result<Figure, VizError> {
        Ok(build_figure(&self.table(config)?, &config.render))
    }

    /// Render and open the chart; returns where it was written.
    pub fn show(&self, config: &VizConfig) -> Result<PathBuf, VizError> {
        show(&self.figure(config)?)
    }
}

/// Steps 1–4 of the pipeline: the projected, labelled table.
pub fn project_and_annotate<Q, C, I, S>(
    query: &Q,
    candidates: &C,
    items: &[I],
    similarity_scores: Option<&[S]>,
    config: &VizConfig,
) -> Result<ProjectionTable, VizError>
where
    Q: HostTensor + ?Sized,
    C: HostTensor + ?Sized,
    I: ItemName,
    S: ScalarLike,
{
    let mut plot = EmbeddingPlot::new(query, candidates, items)?;
    if let Some(scores) = similarity_scores {
        plot = plot.with_scores(scores)?;
    }
    plot.table(config)
}

/// Project the query next to the menu embeddings and open the chart.
pub fn plot_umap<Q, C, I, S>(
    query: &Q,
    candidates: &C,
    items: &[I],
    similarity_scores: Option<&[S]>,
    config: &VizConfig,
) -> Result<PathBuf, VizError>
where
    Q: HostTensor + ?Sized,
    C: HostTensor + ?Sized,
    I: ItemName,
    S: ScalarLike,
{
    let table = project_and_annotate(query, candidates, items, similarity_scores, config)?;
    show(&build_figure(&table, &config.render))
}
