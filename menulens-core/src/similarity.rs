use ndarray::{Array1, Array2};

use crate::error::VizError;

/// Cosine similarity of `query` to every row of `candidates`.
///
/// A zero vector on either side scores 0.
pub fn cosine_scores(query: &Array1<f32>, candidates: &Array2<f32>) -> Result<Vec<f64>, VizError> {
    if candidates.nrows() > 0 && candidates.ncols() != query.len() {
        return Err(VizError::DimensionMismatch {
            expected: query.len(),
            actual: candidates.ncols(),
        });
    }

    let query_norm = query.iter().map(|&v| v as f64 * v as f64).sum::<f64>().sqrt();
    Ok(candidates
        .rows()
        .into_iter()
        .map(|row| {
            let dot: f64 = row
                .iter()
                .zip(query.iter())
                .map(|(&a, &b)| a as f64 * b as f64)
                .sum();
            let row_norm = row.iter().map(|&v| v as f64 * v as f64).sum::<f64>().sqrt();
            if query_norm == 0.0 || row_norm == 0.0 {
                0.0
            } else {
                dot / (query_norm * row_norm)
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cosine_scores() {
        let query = array![1.0f32, 0.0];
        let candidates = array![[2.0f32, 0.0], [0.0, 3.0], [-1.0, 0.0], [0.0, 0.0]];

        let scores = cosine_scores(&query, &candidates).unwrap();

        assert_eq!(scores.len(), 4);
        assert!((scores[0] - 1.0).abs() < 1e-9);
        assert!(scores[1].abs() < 1e-9);
        assert!((scores[2] + 1.0).abs() < 1e-9);
        assert_eq!(scores[3], 0.0);
    }

    #[test]
    fn test_cosine_scores_dimension_mismatch() {
        let query = array![1.0f32, 0.0, 0.0];
        let candidates = array![[1.0f32, 0.0]];
        assert!(matches!(
            cosine_scores(&query, &candidates),
            Err(VizError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }
}
