//! Spectral initialization from the normalized graph Laplacian

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::Rng;

use crate::config::Metric;
use crate::projection::distance::distance;
use crate::projection::graph::FuzzyGraph;

/// Dense eigen-solve is cubic; larger graphs start from a random layout.
pub const SPECTRAL_MAX_POINTS: usize = 256;

const JACOBI_MAX_SWEEPS: usize = 100;
const JACOBI_TOLERANCE: f64 = 1e-22;

/// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
///
/// Returns eigenvalues in ascending order and the matching eigenvectors as
/// the columns of the second value.
pub fn symmetric_eigen(matrix: &Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = matrix.nrows();
    let mut a = matrix.clone();
    let mut v = Array2::<f64>::eye(n);

    for _ in 0..JACOBI_MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| (0..n).filter(move |&q| q != p).map(move |q| (p, q)))
            .map(|(p, q)| a[[p, q]] * a[[p, q]])
            .sum();
        if off < JACOBI_TOLERANCE {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq.abs() < f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let t = if theta == 0.0 { 1.0 } else { t };
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| a[[i, i]].total_cmp(&a[[j, j]]));

    let values = order.iter().map(|&i| a[[i, i]]).collect();
    let mut vectors = Array2::<f64>::zeros((n, n));
    for (dst, &src) in order.iter().enumerate() {
        vectors.column_mut(dst).assign(&v.column(src));
    }
    (values, vectors)
}

/// Laplacian-eigenmap layout in `dim` dimensions.
///
/// Returns `None` when the graph is too small, too large, or disconnected.
pub fn spectral_layout(graph: &FuzzyGraph, dim: usize) -> Option<Array2<f64>> {
    let n = graph.n_vertices;
    if n < dim + 2 || n > SPECTRAL_MAX_POINTS || !graph.is_connected() {
        return None;
    }

    let mut weights = Array2::<f64>::zeros((n, n));
    for &(i, j, w) in &graph.edges {
        weights[[i, j]] = w as f64;
    }
    let inv_sqrt_degree: Vec<f64> = weights
        .rows()
        .into_iter()
        .map(|row| {
            let degree: f64 = row.sum();
            if degree > 0.0 {
                1.0 / degree.sqrt()
            } else {
                0.0
            }
        })
        .collect();

    // L = I - D^-1/2 W D^-1/2
    let mut laplacian = Array2::<f64>::eye(n);
    for i in 0..n {
        for j in 0..n {
            laplacian[[i, j]] -= inv_sqrt_degree[i] * weights[[i, j]] * inv_sqrt_degree[j];
        }
    }

    let (_, vectors) = symmetric_eigen(&laplacian);
    // column 0 is the trivial eigenvector
    Some(vectors.slice(ndarray::s![.., 1..=dim]).to_owned())
}

/// Positions for each component's centre.
///
/// Up to `2·dim` components sit on the unit axes. Beyond that, the component
/// centroids in data space are embedded spectrally through a Gaussian
/// affinity `exp(-d²)` and scaled into the unit box.
fn component_centres(
    data: &Array2<f32>,
    metric: Metric,
    labels: &[usize],
    n_components: usize,
    dim: usize,
) -> Option<Array2<f64>> {
    if n_components <= 2 * dim {
        let mut centres = Array2::<f64>::zeros((n_components, dim));
        for c in 0..n_components {
            centres[[c, c % dim]] = if c < dim { 1.0 } else { -1.0 };
        }
        return Some(centres);
    }

    let mut centroids = Array2::<f32>::zeros((n_components, data.ncols()));
    let mut counts = vec![0usize; n_components];
    for (row, &label) in data.axis_iter(Axis(0)).zip(labels) {
        let mut centroid = centroids.row_mut(label);
        centroid += &row;
        counts[label] += 1;
    }
    for (mut centroid, &count) in centroids.axis_iter_mut(Axis(0)).zip(&counts) {
        centroid /= count.max(1) as f32;
    }

    let mut edges = Vec::new();
    for i in 0..n_components {
        for j in 0..n_components {
            if i == j {
                continue;
            }
            let d = distance(metric, centroids.row(i), centroids.row(j)) as f64;
            let affinity = (-(d * d)).exp() as f32;
            if affinity > 0.0 {
                edges.push((i, j, affinity));
            }
        }
    }
    let meta = FuzzyGraph {
        n_vertices: n_components,
        edges,
    };
    let centres = spectral_layout(&meta, dim)?;
    let max_abs = centres.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    Some(if max_abs > 0.0 { centres / max_abs } else { centres })
}

/// Laplacian-eigenmap layout for a graph with several components.
///
/// Each component is embedded on its own and placed around its centre,
/// sized to half the distance to the closest other centre. Components too
/// small for an eigenmap are scattered uniformly in that box. Returns `None`
/// for graphs past [`SPECTRAL_MAX_POINTS`] or when the centres themselves
/// cannot be embedded.
pub fn component_layout(
    graph: &FuzzyGraph,
    data: &Array2<f32>,
    metric: Metric,
    dim: usize,
    rng: &mut StdRng,
) -> Option<Array2<f64>> {
    if graph.n_vertices > SPECTRAL_MAX_POINTS {
        return None;
    }
    let (labels, n_components) = graph.components();
    let centres = component_centres(data, metric, &labels, n_components, dim)?;

    let mut result = Array2::<f64>::zeros((graph.n_vertices, dim));
    for c in 0..n_components {
        let centre: Array1<f64> = centres.row(c).to_owned();
        let nearest = (0..n_components)
            .filter(|&other| other != c)
            .map(|other| {
                let diff = &centres.row(other) - &centre;
                diff.dot(&diff).sqrt()
            })
            .filter(|&d| d > 0.0)
            .fold(f64::INFINITY, f64::min);
        let data_range = if nearest.is_finite() { nearest / 2.0 } else { 1.0 };

        let members: Vec<usize> = (0..graph.n_vertices).filter(|&v| labels[v] == c).collect();
        let embedded = if members.len() < 2 * dim {
            None
        } else {
            spectral_layout(&graph.subgraph(&members), dim)
        };

        match embedded {
            Some(local) => {
                let max_abs = local.iter().fold(0.0f64, |m, v| m.max(v.abs()));
                let expansion = if max_abs > 0.0 { data_range / max_abs } else { 1.0 };
                for (row, &v) in local.axis_iter(Axis(0)).zip(&members) {
                    let placed = &row * expansion + &centre;
                    result.row_mut(v).assign(&placed);
                }
            }
            None => {
                for &v in &members {
                    for d in 0..dim {
                        result[[v, d]] =
                            centre[d] + rng.random_range(-data_range..=data_range);
                    }
                }
            }
        }
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    #[test]
    fn test_eigen_diagonal_matrix() {
        let m = array![[3.0, 0.0], [0.0, 1.0]];
        let (values, vectors) = symmetric_eigen(&m);

        assert!((values[0] - 1.0).abs() < 1e-9);
        assert!((values[1] - 3.0).abs() < 1e-9);
        assert!((vectors[[1, 0]].abs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_eigen_reconstructs_matrix() {
        let m = array![[4.0, 1.0, 0.5], [1.0, 3.0, 0.2], [0.5, 0.2, 1.0]];
        let (values, vectors) = symmetric_eigen(&m);

        for (k, &lambda) in values.iter().enumerate() {
            let v = vectors.column(k);
            let mv = m.dot(&v);
            for i in 0..3 {
                assert!(
                    (mv[i] - lambda * v[i]).abs() < 1e-8,
                    "eigenpair {k} violates M v = λ v"
                );
            }
        }
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }

    fn ring(n: usize) -> FuzzyGraph {
        let mut edges = Vec::new();
        for i in 0..n {
            let j = (i + 1) % n;
            edges.push((i, j, 1.0));
            edges.push((j, i, 1.0));
        }
        edges.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        FuzzyGraph {
            n_vertices: n,
            edges,
        }
    }

    #[test]
    fn test_spectral_layout_of_ring_is_a_circle() {
        let layout = spectral_layout(&ring(8), 2).expect("connected ring");
        assert_eq!(layout.dim(), (8, 2));

        let radii: Vec<f64> = layout
            .rows()
            .into_iter()
            .map(|r| (r[0] * r[0] + r[1] * r[1]).sqrt())
            .collect();
        let mean = radii.iter().sum::<f64>() / radii.len() as f64;
        assert!(radii.iter().all(|r| (r - mean).abs() < 1e-4));
    }

    #[test]
    fn test_spectral_layout_rejects_tiny_and_disconnected() {
        assert!(spectral_layout(&ring(3), 2).is_none());

        let disconnected = FuzzyGraph {
            n_vertices: 4,
            edges: vec![(0, 1, 1.0), (1, 0, 1.0), (2, 3, 1.0), (3, 2, 1.0)],
        };
        assert!(spectral_layout(&disconnected, 2).is_none());
    }

    /// `groups` disjoint 4-cliques; group `g` sits around `(g, g)` in data space.
    fn separate_cliques(groups: usize) -> (FuzzyGraph, Array2<f32>) {
        let mut edges = Vec::new();
        for g in 0..groups {
            for i in 0..4 {
                for j in 0..4 {
                    if i != j {
                        edges.push((4 * g + i, 4 * g + j, 1.0));
                    }
                }
            }
        }
        let data = Array2::from_shape_fn((4 * groups, 2), |(v, d)| {
            (v / 4) as f32 + 0.01 * (v % 4 + d) as f32
        });
        (
            FuzzyGraph {
                n_vertices: 4 * groups,
                edges,
            },
            data,
        )
    }

    fn component_means(layout: &Array2<f64>, groups: usize) -> Vec<[f64; 2]> {
        (0..groups)
            .map(|g| {
                let rows = layout.slice(ndarray::s![4 * g..4 * g + 4, ..]);
                let mean = rows.mean_axis(Axis(0)).unwrap();
                [mean[0], mean[1]]
            })
            .collect()
    }

    #[test]
    fn test_component_layout_places_components_on_axes() {
        let (graph, data) = separate_cliques(2);
        let mut rng = StdRng::seed_from_u64(5);

        let layout = component_layout(&graph, &data, Metric::Euclidean, 2, &mut rng)
            .expect("two small components");
        assert_eq!(layout.dim(), (8, 2));

        let means = component_means(&layout, 2);
        assert!((means[0][0] - 1.0).abs() < 1e-6 && means[0][1].abs() < 1e-6);
        assert!(means[1][0].abs() < 1e-6 && (means[1][1] - 1.0).abs() < 1e-6);
        // each component stays inside half the gap between centres
        let half_gap = 2f64.sqrt() / 2.0;
        for v in 0..4 {
            assert!((layout[[v, 0]] - 1.0).abs() <= half_gap + 1e-9);
            assert!(layout[[v, 1]].abs() <= half_gap + 1e-9);
        }
    }

    #[test]
    fn test_component_layout_embeds_many_centres() {
        let (graph, data) = separate_cliques(6);
        let mut rng = StdRng::seed_from_u64(5);

        let layout = component_layout(&graph, &data, Metric::Euclidean, 2, &mut rng)
            .expect("six components");
        assert_eq!(layout.dim(), (24, 2));
        assert!(layout.iter().all(|v| v.is_finite()));

        let means = component_means(&layout, 6);
        for a in 0..6 {
            for b in (a + 1)..6 {
                let d = ((means[a][0] - means[b][0]).powi(2) + (means[a][1] - means[b][1]).powi(2))
                    .sqrt();
                assert!(d > 1e-6, "components {a} and {b} share a centre");
            }
        }
    }
}
