//! Fuzzy neighbour graph
//!
//! Exact k-nearest-neighbour search followed by the smooth-kNN calibration
//! and the fuzzy union of the directed membership graph:
//!
//!   w_ij = exp(-(d_ij - rho_i) / sigma_i)
//!   W    = P + Pᵀ - P ∘ Pᵀ  (evaluated as 1 - (1 - P) ∘ (1 - Pᵀ))
//!
//! where rho_i is the distance to the nearest neighbour of i and sigma_i is
//! chosen so that Σ_j w_ij = log2(k).

use std::collections::BTreeMap;

use ndarray::Array2;

use crate::config::Metric;
use crate::projection::distance::distance;

const SMOOTH_K_TOLERANCE: f32 = 1e-5;
const MIN_K_DIST_SCALE: f32 = 1e-3;
const SMOOTH_K_ITERATIONS: usize = 64;

/// Neighbours of every point, nearest first. Each point is its own first
/// neighbour.
#[derive(Debug, Clone)]
pub struct KnnGraph {
    pub indices: Vec<Vec<usize>>,
    pub distances: Vec<Vec<f32>>,
}

/// Exact kNN by brute force. Row `i` of the result starts with `i` itself.
pub fn nearest_neighbors(data: &Array2<f32>, k: usize, metric: Metric) -> KnnGraph {
    let n = data.nrows();
    let k = k.min(n);
    let mut indices = Vec::with_capacity(n);
    let mut distances = Vec::with_capacity(n);

    let mut row_dists = vec![0.0f32; n];
    let mut order: Vec<usize> = Vec::with_capacity(n);
    for i in 0..n {
        for (j, d) in row_dists.iter_mut().enumerate() {
            *d = if i == j {
                0.0
            } else {
                distance(metric, data.row(i), data.row(j))
            };
        }

        order.clear();
        order.extend(0..n);
        // self sorts ahead of exact duplicates
        order.sort_by(|&a, &b| {
            row_dists[a]
                .total_cmp(&row_dists[b])
                .then((a != i).cmp(&(b != i)))
                .then(a.cmp(&b))
        });
        order.truncate(k);

        distances.push(order.iter().map(|&j| row_dists[j]).collect());
        indices.push(order.clone());
    }

    KnnGraph { indices, distances }
}

/// Per-point `(sigma, rho)` calibration.
pub fn smooth_knn_dist(distances: &[Vec<f32>], k: usize) -> (Vec<f32>, Vec<f32>) {
    let target = (k as f32).log2();
    let n = distances.len();

    let all_count: usize = distances.iter().map(Vec::len).sum();
    let mean_all = if all_count == 0 {
        0.0
    } else {
        distances.iter().flatten().sum::<f32>() / all_count as f32
    };

    let mut sigmas = Vec::with_capacity(n);
    let mut rhos = Vec::with_capacity(n);

    for row in distances {
        let rho = row.iter().copied().find(|&d| d > 0.0).unwrap_or(0.0);

        let mut lo = 0.0f32;
        let mut hi = f32::INFINITY;
        let mut mid = 1.0f32;

        for _ in 0..SMOOTH_K_ITERATIONS {
            let psum: f32 = row
                .iter()
                .skip(1)
                .map(|&d| {
                    let d = d - rho;
                    if d > 0.0 {
                        (-d / mid).exp()
                    } else {
                        1.0
                    }
                })
                .sum();

            if (psum - target).abs() < SMOOTH_K_TOLERANCE {
                break;
            }

            if psum > target {
                hi = mid;
                mid = (lo + hi) / 2.0;
            } else {
                lo = mid;
                if hi == f32::INFINITY {
                    mid *= 2.0;
                } else {
                    mid = (lo + hi) / 2.0;
                }
            }
        }

        let floor = if rho > 0.0 {
            let mean_row = if row.is_empty() {
                0.0
            } else {
                row.iter().sum::<f32>() / row.len() as f32
            };
            MIN_K_DIST_SCALE * mean_row
        } else {
            MIN_K_DIST_SCALE * mean_all
        };

        sigmas.push(mid.max(floor));
        rhos.push(rho);
    }

    (sigmas, rhos)
}

/// Symmetric weighted graph; every undirected edge is stored in both
/// directions, ordered by `(head, tail)`.
#[derive(Debug, Clone)]
pub struct FuzzyGraph {
    pub n_vertices: usize,
    pub edges: Vec<(usize, usize, f32)>,
}

impl FuzzyGraph {
    pub fn max_weight(&self) -> f32 {
        self.edges.iter().map(|e| e.2).fold(0.0, f32::max)
    }

    /// Connected-component label per vertex, and the number of components.
    ///
    /// Labels are assigned in order of each component's lowest vertex.
    pub fn components(&self) -> (Vec<usize>, usize) {
        let mut adjacency = vec![Vec::new(); self.n_vertices];
        for &(i, j, _) in &self.edges {
            adjacency[i].push(j);
        }
        let mut labels = vec![usize::MAX; self.n_vertices];
        let mut n_components = 0;
        for start in 0..self.n_vertices {
            if labels[start] != usize::MAX {
                continue;
            }
            labels[start] = n_components;
            let mut stack = vec![start];
            while let Some(v) = stack.pop() {
                for &u in &adjacency[v] {
                    if labels[u] == usize::MAX {
                        labels[u] = n_components;
                        stack.push(u);
                    }
                }
            }
            n_components += 1;
        }
        (labels, n_components)
    }

    /// Whether every vertex can reach every other one.
    pub fn is_connected(&self) -> bool {
        self.components().1 <= 1
    }

    /// The graph induced by `members`, reindexed in the given order.
    pub fn subgraph(&self, members: &[usize]) -> FuzzyGraph {
        let mut index = vec![usize::MAX; self.n_vertices];
        for (new, &old) in members.iter().enumerate() {
            index[old] = new;
        }
        let mut edges: Vec<(usize, usize, f32)> = self
            .edges
            .iter()
            .filter(|&&(i, j, _)| index[i] != usize::MAX && index[j] != usize::MAX)
            .map(|&(i, j, w)| (index[i], index[j], w))
            .collect();
        edges.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        FuzzyGraph {
            n_vertices: members.len(),
            edges,
        }
    }
}

/// Build the fuzzy union graph from a kNN graph.
pub fn fuzzy_simplicial_set(knn: &KnnGraph, k: usize) -> FuzzyGraph {
    let n = knn.indices.len();
    let (sigmas, rhos) = smooth_knn_dist(&knn.distances, k);

    let mut directed: BTreeMap<(usize, usize), f32> = BTreeMap::new();
    for i in 0..n {
        for (&j, &d) in knn.indices[i].iter().zip(&knn.distances[i]) {
            if j == i {
                continue;
            }
            let strength = if d - rhos[i] <= 0.0 || sigmas[i] == 0.0 {
                1.0
            } else {
                (-(d - rhos[i]) / sigmas[i]).exp()
            };
            directed.insert((i, j), strength);
        }
    }

    let mut union: BTreeMap<(usize, usize), f32> = BTreeMap::new();
    for (&(i, j), &p_ij) in &directed {
        let p_ji = directed.get(&(j, i)).copied().unwrap_or(0.0);
        let w = 1.0 - (1.0 - p_ij) * (1.0 - p_ji);
        if w > 0.0 {
            union.insert((i, j), w);
            union.insert((j, i), w);
        }
    }

    FuzzyGraph {
        n_vertices: n,
        edges: union.into_iter().map(|((i, j), w)| (i, j, w)).collect(),
    }
}
