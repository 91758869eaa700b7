//! 2D projection of embedding matrices
//!
//! [`Umap`] is the default reducer: exact kNN graph → fuzzy simplicial set →
//! spectral (or random) start → SGD layout. Every random draw comes from one
//! `StdRng` seeded with `random_state`, so a given input and seed always
//! yield the same coordinates.

pub mod distance;
pub mod graph;
pub mod layout;
pub mod spectral;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::ProjectionConfig;
use crate::error::VizError;

/// Abstraction over dimensionality-reduction backends.
pub trait DimensionReducer {
    /// Fit on `data` (one row per point) and return one `[x, y]` row per point,
    /// in input order.
    fn fit_transform(&self, data: &Array2<f32>) -> Result<Array2<f32>, VizError>;

    /// Reducer name for logging.
    fn name(&self) -> &str;
}

/// Uniform Manifold Approximation and Projection into two dimensions.
#[derive(Debug, Clone)]
pub struct Umap {
    config: ProjectionConfig,
}

impl Umap {
    pub fn new(config: ProjectionConfig) -> Result<Self, VizError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Neighbourhood size actually used for `n_points` points.
    fn effective_neighbors(&self, n_points: usize) -> usize {
        if n_points > self.config.n_neighbors {
            return self.config.n_neighbors;
        }
        let clamped = (n_points - 1).max(2).min(n_points);
        tracing::warn!(
            n_neighbors = self.config.n_neighbors,
            points = n_points,
            using = clamped,
            "n_neighbors is not smaller than the number of points — clamping"
        );
        clamped
    }
}

impl DimensionReducer for Umap {
    fn fit_transform(&self, data: &Array2<f32>) -> Result<Array2<f32>, VizError> {
        let n_points = data.nrows();
        match n_points {
            0 => {
                return Err(VizError::InvalidShape {
                    what: "projection input",
                    shape: vec![0, data.ncols()],
                    reason: "no points to project",
                })
            }
            1 => return Ok(Array2::zeros((1, 2))),
            _ => {}
        }

        let k = self.effective_neighbors(n_points);
        let mut rng = StdRng::seed_from_u64(self.config.random_state);

        let knn = graph::nearest_neighbors(data, k, self.config.metric);
        let fuzzy = graph::fuzzy_simplicial_set(&knn, k);
        tracing::debug!(
            points = n_points,
            dims = data.ncols(),
            k,
            edges = fuzzy.edges.len(),
            "Built fuzzy neighbour graph"
        );

        let (a, b) = layout::find_ab_params(self.config.spread, self.config.min_dist);
        let mut coords = layout::initial_layout(&fuzzy, data, self.config.metric, &mut rng);
        let n_epochs = self.config.epochs_for(n_points);
        layout::optimize_layout(&mut coords, &fuzzy, a, b, n_epochs, &mut rng);
        tracing::debug!(a, b, n_epochs, "Optimized layout");

        Ok(Array2::from(coords))
    }

    fn name(&self) -> &str {
        "umap"
    }
}
