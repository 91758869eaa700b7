pub mod annotate;
pub mod config;
pub mod error;
pub mod input;
pub mod models;
pub mod plot;
pub mod projection;
pub mod render;
pub mod similarity;

pub use config::{Metric, ProjectionConfig, RenderConfig, VizConfig};
pub use error::VizError;
pub use input::{HostArray, HostTensor, ScalarLike};
pub use models::item::{ItemName, MenuItem};
pub use models::table::{Category, ProjectedPoint, ProjectionTable};
pub use plot::{plot_umap, project_and_annotate, EmbeddingPlot};
pub use projection::{DimensionReducer, Umap};
pub use render::{build_figure, show, write_html, Figure};
pub use similarity::cosine_scores;
