//! Pair projected coordinates with categories, scores and display labels

use ndarray::Array2;

use crate::error::VizError;
use crate::models::item::ItemName;
use crate::models::table::{Category, ProjectedPoint, ProjectionTable};

/// `"<name> (<score:.2>)"`, or the bare name without a score.
pub fn format_label(name: &str, similarity: Option<f64>) -> String {
    match similarity {
        Some(score) => format!("{} ({:.2})", name, score),
        None => name.to_string(),
    }
}

/// Build the table from `(N+1)×2` coordinates whose first row is the query.
///
/// `scores`, when given, must hold exactly one value per item.
pub fn annotate<I: ItemName>(
    coords: &Array2<f32>,
    items: &[I],
    scores: Option<&[f64]>,
    query_label: &str,
) -> Result<ProjectionTable, VizError> {
    if coords.ncols() != 2 {
        return Err(VizError::InvalidShape {
            what: "coordinates",
            shape: coords.shape().to_vec(),
            reason: "expected two columns",
        });
    }
    let n_candidates = coords.nrows().saturating_sub(1);
    if coords.nrows() == 0 || items.len() != n_candidates {
        return Err(VizError::ItemCountMismatch {
            candidates: n_candidates,
            items: items.len(),
        });
    }
    if let Some(scores) = scores {
        if scores.len() != n_candidates {
            return Err(VizError::ScoreCountMismatch {
                candidates: n_candidates,
                scores: scores.len(),
            });
        }
    }

    let mut rows = Vec::with_capacity(coords.nrows());
    rows.push(ProjectedPoint {
        x: coords[[0, 0]],
        y: coords[[0, 1]],
        category: Category::Query,
        similarity: None,
        label: query_label.to_string(),
    });

    for (i, item) in items.iter().enumerate() {
        let similarity = scores.map(|s| s[i]);
        rows.push(ProjectedPoint {
            x: coords[[i + 1, 0]],
            y: coords[[i + 1, 1]],
            category: Category::Candidate,
            similarity,
            label: format_label(item.item_name(), similarity),
        });
    }

    Ok(ProjectionTable { rows })
}
