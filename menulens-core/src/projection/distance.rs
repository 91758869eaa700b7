use ndarray::ArrayView1;

use crate::config::Metric;

/// Cosine distance `1 - cos(a, b)`.
///
/// Two zero vectors are at distance 0; a zero vector is at distance 1 from
/// anything else.
pub fn cosine(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += x as f64 * y as f64;
        norm_a += x as f64 * x as f64;
        norm_b += y as f64 * y as f64;
    }

    match (norm_a == 0.0, norm_b == 0.0) {
        (true, true) => 0.0,
        (true, false) | (false, true) => 1.0,
        (false, false) => (1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())).max(0.0) as f32,
    }
}

pub fn euclidean(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt() as f32
}

pub fn distance(metric: Metric, a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    match metric {
        Metric::Cosine => cosine(a, b),
        Metric::Euclidean => euclidean(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cosine_basic_angles() {
        let x = array![1.0f32, 0.0];
        let y = array![0.0f32, 1.0];
        let neg = array![-2.0f32, 0.0];

        assert!(cosine(x.view(), x.view()).abs() < 1e-6);
        assert!((cosine(x.view(), y.view()) - 1.0).abs() < 1e-6);
        assert!((cosine(x.view(), neg.view()) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_ignores_magnitude() {
        let a = array![1.0f32, 2.0, 3.0];
        let b = array![10.0f32, 20.0, 30.0];
        assert!(cosine(a.view(), b.view()).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vectors() {
        let zero = array![0.0f32, 0.0];
        let x = array![1.0f32, 0.0];
        assert_eq!(cosine(zero.view(), zero.view()), 0.0);
        assert_eq!(cosine(zero.view(), x.view()), 1.0);
    }

    #[test]
    fn test_euclidean() {
        let a = array![0.0f32, 0.0];
        let b = array![3.0f32, 4.0];
        assert!((euclidean(a.view(), b.view()) - 5.0).abs() < 1e-6);
        assert_eq!(distance(Metric::Euclidean, a.view(), a.view()), 0.0);
    }
}
