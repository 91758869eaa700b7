//! Low-dimensional layout: curve fit, initialization and SGD optimization

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::Rng;

use crate::config::Metric;
use crate::projection::graph::FuzzyGraph;
use crate::projection::spectral::{component_layout, spectral_layout};

const CURVE_SAMPLES: usize = 300;
const CURVE_FIT_ITERATIONS: usize = 200;

const NEGATIVE_SAMPLE_RATE: f64 = 5.0;
const REPULSION_STRENGTH: f32 = 1.0;
const INITIAL_ALPHA: f32 = 1.0;
const GRADIENT_CLIP: f32 = 4.0;
const INIT_NOISE: f64 = 1e-4;
const LAYOUT_SCALE: f32 = 10.0;

/// Fit `1 / (1 + a·x^(2b))` to the target membership curve
///
/// The target is 1 below `min_dist` and `exp(-(x - min_dist) / spread)`
/// above it, sampled on `[0, 3·spread]`. Levenberg-Marquardt from `a = b = 1`.
pub fn find_ab_params(spread: f32, min_dist: f32) -> (f32, f32) {
    let spread = spread as f64;
    let min_dist = min_dist as f64;
    let samples: Vec<(f64, f64)> = (0..CURVE_SAMPLES)
        .map(|i| {
            let x = 3.0 * spread * i as f64 / (CURVE_SAMPLES - 1) as f64;
            let y = if x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            };
            (x, y)
        })
        .collect();

    let cost = |a: f64, b: f64| -> f64 {
        samples
            .iter()
            .map(|&(x, y)| {
                let r = 1.0 / (1.0 + a * x.powf(2.0 * b)) - y;
                r * r
            })
            .sum()
    };

    let (mut a, mut b) = (1.0f64, 1.0f64);
    let mut current = cost(a, b);
    let mut lambda = 1e-3;

    for _ in 0..CURVE_FIT_ITERATIONS {
        let mut jtj = [[0.0f64; 2]; 2];
        let mut jtr = [0.0f64; 2];
        for &(x, y) in &samples {
            if x <= 0.0 {
                continue;
            }
            let u = x.powf(2.0 * b);
            let denom = 1.0 + a * u;
            let r = 1.0 / denom - y;
            let da = -u / (denom * denom);
            let db = -a * u * 2.0 * x.ln() / (denom * denom);
            jtj[0][0] += da * da;
            jtj[0][1] += da * db;
            jtj[1][1] += db * db;
            jtr[0] += da * r;
            jtr[1] += db * r;
        }
        jtj[1][0] = jtj[0][1];

        let m00 = jtj[0][0] * (1.0 + lambda) + f64::EPSILON;
        let m11 = jtj[1][1] * (1.0 + lambda) + f64::EPSILON;
        let m01 = jtj[0][1];
        let det = m00 * m11 - m01 * m01;
        if det.abs() < f64::MIN_POSITIVE {
            break;
        }
        let step_a = -(m11 * jtr[0] - m01 * jtr[1]) / det;
        let step_b = -(m00 * jtr[1] - m01 * jtr[0]) / det;

        let (next_a, next_b) = (a + step_a, b + step_b);
        if next_a > 0.0 && next_b > 0.0 {
            let next = cost(next_a, next_b);
            if next < current {
                let improvement = current - next;
                a = next_a;
                b = next_b;
                current = next;
                lambda = (lambda / 10.0).max(1e-12);
                if improvement < 1e-14 {
                    break;
                }
                continue;
            }
        }
        lambda *= 10.0;
        if lambda > 1e12 {
            break;
        }
    }

    (a as f32, b as f32)
}

fn standard_normal(rng: &mut StdRng) -> f64 {
    // Box-Muller; 1 - u keeps the log argument in (0, 1]
    let u1: f64 = rng.random();
    let u2: f64 = rng.random();
    (-2.0 * (1.0 - u1).ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Rescale every axis to `[0, LAYOUT_SCALE]`.
fn rescale(layout: &mut [[f32; 2]]) {
    for axis in 0..2 {
        let min = layout.iter().map(|p| p[axis]).fold(f32::INFINITY, f32::min) as f64;
        let max = layout.iter().map(|p| p[axis]).fold(f32::NEG_INFINITY, f32::max) as f64;
        let range = max - min;
        for p in layout.iter_mut() {
            p[axis] = if range > 0.0 {
                let unit = (p[axis] as f64 - min) / range;
                ((unit * LAYOUT_SCALE as f64) as f32).clamp(0.0, LAYOUT_SCALE)
            } else {
                LAYOUT_SCALE / 2.0
            };
        }
    }
}

/// Starting coordinates.
///
/// A connected graph gets a Laplacian eigenmap, a disconnected one gets an
/// eigenmap per component placed apart from the others. Graphs too large
/// for the dense eigen-solve start from seeded uniform coordinates.
pub fn initial_layout(
    graph: &FuzzyGraph,
    data: &Array2<f32>,
    metric: Metric,
    rng: &mut StdRng,
) -> Vec<[f32; 2]> {
    let spectral = if graph.is_connected() {
        spectral_layout(graph, 2)
    } else {
        tracing::debug!(
            components = graph.components().1,
            "Neighbour graph is disconnected, laying out components separately"
        );
        component_layout(graph, data, metric, 2, rng)
    };

    let mut layout: Vec<[f32; 2]> = match spectral {
        Some(spectral) => {
            let max_abs = spectral.iter().fold(0.0f64, |m, v| m.max(v.abs()));
            let expansion = if max_abs > 0.0 { 10.0 / max_abs } else { 1.0 };
            spectral
                .rows()
                .into_iter()
                .map(|row| {
                    [
                        (row[0] * expansion + INIT_NOISE * standard_normal(rng)) as f32,
                        (row[1] * expansion + INIT_NOISE * standard_normal(rng)) as f32,
                    ]
                })
                .collect()
        }
        None => {
            if graph.n_vertices >= 4 {
                tracing::warn!(
                    points = graph.n_vertices,
                    "Spectral initialization unavailable, using random layout"
                );
            }
            (0..graph.n_vertices)
                .map(|_| {
                    [
                        rng.random_range(-10.0f32..10.0),
                        rng.random_range(-10.0f32..10.0),
                    ]
                })
                .collect()
        }
    };
    rescale(&mut layout);
    layout
}

#[inline]
fn clip(v: f32) -> f32 {
    v.clamp(-GRADIENT_CLIP, GRADIENT_CLIP)
}

#[inline]
fn squared_distance(p: [f32; 2], q: [f32; 2]) -> f32 {
    let dx = p[0] - q[0];
    let dy = p[1] - q[1];
    dx * dx + dy * dy
}

/// Stochastic gradient descent on the fuzzy cross-entropy.
///
/// Each edge is sampled proportionally to its weight; after every positive
/// sample its head is pushed away from `NEGATIVE_SAMPLE_RATE` random points
/// per epoch. The learning rate decays linearly to zero over `n_epochs`.
pub fn optimize_layout(
    layout: &mut [[f32; 2]],
    graph: &FuzzyGraph,
    a: f32,
    b: f32,
    n_epochs: usize,
    rng: &mut StdRng,
) {
    let n_vertices = layout.len();
    let max_weight = graph.max_weight();
    if n_vertices < 2 || n_epochs == 0 || max_weight <= 0.0 {
        return;
    }

    // edges too weak to be sampled even once are dropped
    let cutoff = max_weight / n_epochs as f32;
    let edges: Vec<(usize, usize, f32)> = graph
        .edges
        .iter()
        .copied()
        .filter(|&(_, _, w)| w >= cutoff)
        .collect();

    let epochs_per_sample: Vec<f64> = edges
        .iter()
        .map(|&(_, _, w)| n_epochs as f64 / (n_epochs as f64 * (w / max_weight) as f64))
        .collect();
    let epochs_per_negative_sample: Vec<f64> = epochs_per_sample
        .iter()
        .map(|e| e / NEGATIVE_SAMPLE_RATE)
        .collect();
    let mut next_sample = epochs_per_sample.clone();
    let mut next_negative_sample = epochs_per_negative_sample.clone();

    let mut alpha = INITIAL_ALPHA;
    for epoch in 0..n_epochs {
        let epoch_f = epoch as f64;
        for (e, &(head, tail, _)) in edges.iter().enumerate() {
            if next_sample[e] > epoch_f {
                continue;
            }

            let dist_sq = squared_distance(layout[head], layout[tail]);
            let grad_coeff = if dist_sq > 0.0 {
                -2.0 * a * b * dist_sq.powf(b - 1.0) / (a * dist_sq.powf(b) + 1.0)
            } else {
                0.0
            };
            for d in 0..2 {
                let grad = clip(grad_coeff * (layout[head][d] - layout[tail][d]));
                layout[head][d] += grad * alpha;
                layout[tail][d] -= grad * alpha;
            }
            next_sample[e] += epochs_per_sample[e];

            let n_negative = ((epoch_f - next_negative_sample[e]) / epochs_per_negative_sample[e])
                .max(0.0) as usize;
            for _ in 0..n_negative {
                let other = rng.random_range(0..n_vertices);
                let dist_sq = squared_distance(layout[head], layout[other]);
                let grad_coeff = if dist_sq > 0.0 {
                    2.0 * REPULSION_STRENGTH * b
                        / ((0.001 + dist_sq) * (a * dist_sq.powf(b) + 1.0))
                } else if head == other {
                    continue;
                } else {
                    0.0
                };
                for d in 0..2 {
                    let grad = if grad_coeff > 0.0 {
                        clip(grad_coeff * (layout[head][d] - layout[other][d]))
                    } else {
                        0.0
                    };
                    layout[head][d] += grad * alpha;
                }
            }
            next_negative_sample[e] += n_negative as f64 * epochs_per_negative_sample[e];
        }
        alpha = INITIAL_ALPHA * (1.0 - (epoch + 1) as f32 / n_epochs as f32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_ab_params_for_common_min_dist() {
        // reference values for spread = 1.0, min_dist = 0.1
        let (a, b) = find_ab_params(1.0, 0.1);
        assert!((a - 1.577).abs() < 0.02, "a = {a}");
        assert!((b - 0.895).abs() < 0.02, "b = {b}");
    }

    #[test]
    fn test_ab_params_curve_tracks_target() {
        let (a, b) = find_ab_params(1.0, 0.3);
        for &(x, target) in &[(0.0f32, 1.0f32), (1.3, (-1.0f32).exp()), (2.5, (-2.2f32).exp())] {
            let fitted = 1.0 / (1.0 + a * x.powf(2.0 * b));
            assert!(
                (fitted - target).abs() < 0.1,
                "x = {x}: fitted {fitted}, target {target}"
            );
        }
        // larger min_dist flattens the curve
        let (a_small, _) = find_ab_params(1.0, 0.1);
        assert!(a < a_small);
    }

    fn points(n: usize) -> Array2<f32> {
        Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f32 + 1.0)
    }

    fn cliques(groups: &[&[usize]]) -> Vec<(usize, usize, f32)> {
        let mut edges = Vec::new();
        for group in groups {
            for &i in group.iter() {
                for &j in group.iter() {
                    if i != j {
                        edges.push((i, j, 1.0));
                    }
                }
            }
        }
        edges
    }

    fn two_cliques() -> FuzzyGraph {
        let mut edges = Vec::new();
        for group in [[0usize, 1, 2], [3, 4, 5]] {
            for &i in &group {
                for &j in &group {
                    if i != j {
                        edges.push((i, j, 1.0));
                    }
                }
            }
        }
        // weak bridge keeps the graph connected
        edges.push((2, 3, 0.05));
        edges.push((3, 2, 0.05));
        edges.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        FuzzyGraph {
            n_vertices: 6,
            edges,
        }
    }

    #[test]
    fn test_initial_layout_is_scaled_and_seeded() {
        let graph = two_cliques();
        let data = points(6);
        let first = initial_layout(&graph, &data, Metric::Cosine, &mut StdRng::seed_from_u64(7));
        let second =
            initial_layout(&graph, &data, Metric::Cosine, &mut StdRng::seed_from_u64(7));

        assert_eq!(first, second);
        assert_eq!(first.len(), 6);
        for p in &first {
            assert!((0.0..=10.0).contains(&p[0]) && (0.0..=10.0).contains(&p[1]));
        }
    }

    #[test]
    fn test_rescale_hits_bounds_exactly() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let mut layout: Vec<[f32; 2]> = (0..7)
                .map(|_| {
                    [
                        rng.random_range(-13.7f32..11.3),
                        rng.random_range(-0.3f32..0.9),
                    ]
                })
                .collect();
            rescale(&mut layout);
            for axis in 0..2 {
                let max = layout.iter().map(|p| p[axis]).fold(f32::MIN, f32::max);
                let min = layout.iter().map(|p| p[axis]).fold(f32::MAX, f32::min);
                assert_eq!(max, LAYOUT_SCALE);
                assert_eq!(min, 0.0);
            }
        }
    }

    #[test]
    fn test_disconnected_components_start_apart() {
        let graph = FuzzyGraph {
            n_vertices: 10,
            edges: cliques(&[&[0, 1, 2, 3, 4], &[5, 6, 7, 8, 9]]),
        };
        assert!(!graph.is_connected());

        let mut rng = StdRng::seed_from_u64(11);
        let layout = initial_layout(&graph, &points(10), Metric::Euclidean, &mut rng);

        let centroid = |ids: std::ops::Range<usize>| -> [f32; 2] {
            let n = ids.len() as f32;
            let (sx, sy) = ids.fold((0.0, 0.0), |(sx, sy), i| {
                (sx + layout[i][0], sy + layout[i][1])
            });
            [sx / n, sy / n]
        };
        let first = centroid(0..5);
        let second = centroid(5..10);

        // first component is centred on +x, the second on +y
        assert!(first[0] > second[0] + 1.0, "{first:?} vs {second:?}");
        assert!(second[1] > first[1] + 1.0, "{first:?} vs {second:?}");
        for p in &layout {
            assert!((0.0..=10.0).contains(&p[0]) && (0.0..=10.0).contains(&p[1]));
        }
    }

    #[test]
    fn test_optimize_pulls_cliques_apart() {
        let graph = two_cliques();
        let mut rng = StdRng::seed_from_u64(42);
        let mut layout = initial_layout(&graph, &points(6), Metric::Cosine, &mut rng);
        let (a, b) = find_ab_params(1.0, 0.3);

        optimize_layout(&mut layout, &graph, a, b, 200, &mut rng);

        let centroid = |ids: &[usize]| -> [f32; 2] {
            let n = ids.len() as f32;
            [
                ids.iter().map(|&i| layout[i][0]).sum::<f32>() / n,
                ids.iter().map(|&i| layout[i][1]).sum::<f32>() / n,
            ]
        };
        let spread_of = |ids: &[usize], c: [f32; 2]| -> f32 {
            ids.iter()
                .map(|&i| squared_distance(layout[i], c).sqrt())
                .fold(0.0, f32::max)
        };

        let left = centroid(&[0, 1, 2]);
        let right = centroid(&[3, 4, 5]);
        let between = squared_distance(left, right).sqrt();

        assert!(layout.iter().all(|p| p[0].is_finite() && p[1].is_finite()));
        assert!(
            between > spread_of(&[0, 1, 2], left) && between > spread_of(&[3, 4, 5], right),
            "clusters should be further apart than their own radius"
        );
    }

    #[test]
    fn test_optimize_without_edges_is_noop() {
        let graph = FuzzyGraph {
            n_vertices: 3,
            edges: vec![],
        };
        let mut layout = vec![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let before = layout.clone();
        optimize_layout(&mut layout, &graph, 1.0, 1.0, 100, &mut StdRng::seed_from_u64(1));
        assert_eq!(layout, before);
    }
}
