//! Input normalization — plain arrays and tensor-like values to `ndarray`
//!
//! Embeddings arrive either as native arrays (`Vec<f32>`, nested `Vec`s,
//! slices, any `ndarray` array of `f32`/`f64`) or as tensor-like values that
//! live somewhere else (an inference runtime, an accelerator) and can only be
//! read after copying them to host memory. [`HostTensor`] is that copy step;
//! everything downstream only ever sees `Array1<f32>` / `Array2<f32>`.

use ndarray::{ArrayBase, Array1, Array2, Axis, Data, Dimension};

use crate::error::VizError;

/// Numeric element types accepted for embeddings and scores.
pub trait HostScalar: Copy {
    fn to_f32(self) -> f32;
    fn to_f64(self) -> f64;
}

impl HostScalar for f32 {
    fn to_f32(self) -> f32 {
        self
    }
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl HostScalar for f64 {
    fn to_f32(self) -> f32 {
        self as f32
    }
    fn to_f64(self) -> f64 {
        self
    }
}

/// Row-major host copy of a tensor's values.
///
/// Embeddings are carried as `f32`; scores use `HostArray<f64>`.
#[derive(Debug, Clone, PartialEq)]
pub struct HostArray<T = f32> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

impl<T> HostArray<T> {
    pub fn new(shape: Vec<usize>, data: Vec<T>) -> Result<Self, VizError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(VizError::Tensor(format!(
                "shape {:?} holds {} values, buffer has {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }
}

/// A value that can be detached into host memory as a plain `f32` buffer.
///
/// Implemented for native arrays as a straight copy, and for runtime tensor
/// types (behind the `onnx` feature) by extracting their host data.
pub trait HostTensor {
    fn detach_to_host(&self) -> Result<HostArray, VizError>;

    /// Full-precision copy, used for similarity scores.
    ///
    /// Defaults to widening [`detach_to_host`](Self::detach_to_host); types
    /// that hold `f64` values override it so nothing is rounded through `f32`.
    fn detach_to_host_f64(&self) -> Result<HostArray<f64>, VizError> {
        let host = self.detach_to_host()?;
        Ok(HostArray {
            shape: host.shape,
            data: host.data.into_iter().map(f64::from).collect(),
        })
    }
}

impl HostTensor for HostArray {
    fn detach_to_host(&self) -> Result<HostArray, VizError> {
        Ok(self.clone())
    }
}

impl HostTensor for HostArray<f64> {
    fn detach_to_host(&self) -> Result<HostArray, VizError> {
        Ok(HostArray {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&v| v as f32).collect(),
        })
    }

    fn detach_to_host_f64(&self) -> Result<HostArray<f64>, VizError> {
        Ok(self.clone())
    }
}

impl<S, D> HostTensor for ArrayBase<S, D>
where
    S: Data,
    S::Elem: HostScalar,
    D: Dimension,
{
    fn detach_to_host(&self) -> Result<HostArray, VizError> {
        // `iter` walks in logical row-major order regardless of memory layout
        Ok(HostArray {
            shape: self.shape().to_vec(),
            data: self.iter().map(|v| v.to_f32()).collect(),
        })
    }

    fn detach_to_host_f64(&self) -> Result<HostArray<f64>, VizError> {
        Ok(HostArray {
            shape: self.shape().to_vec(),
            data: self.iter().map(|v| v.to_f64()).collect(),
        })
    }
}

fn rows_to_host<T: HostScalar, U>(
    rows: &[Vec<T>],
    convert: fn(T) -> U,
) -> Result<HostArray<U>, VizError> {
    let width = rows.first().map_or(0, Vec::len);
    let mut data = Vec::with_capacity(rows.len() * width);
    for (row, values) in rows.iter().enumerate() {
        if values.len() != width {
            return Err(VizError::RaggedRows {
                row,
                expected: width,
                actual: values.len(),
            });
        }
        data.extend(values.iter().map(|&v| convert(v)));
    }
    Ok(HostArray {
        shape: vec![rows.len(), width],
        data,
    })
}

macro_rules! impl_host_tensor_for_std {
    ($($t:ty),*) => {$(
        impl HostTensor for [$t] {
            fn detach_to_host(&self) -> Result<HostArray, VizError> {
                Ok(HostArray {
                    shape: vec![self.len()],
                    data: self.iter().map(|v| v.to_f32()).collect(),
                })
            }

            fn detach_to_host_f64(&self) -> Result<HostArray<f64>, VizError> {
                Ok(HostArray {
                    shape: vec![self.len()],
                    data: self.iter().map(|v| v.to_f64()).collect(),
                })
            }
        }

        impl HostTensor for Vec<$t> {
            fn detach_to_host(&self) -> Result<HostArray, VizError> {
                self.as_slice().detach_to_host()
            }

            fn detach_to_host_f64(&self) -> Result<HostArray<f64>, VizError> {
                self.as_slice().detach_to_host_f64()
            }
        }

        impl HostTensor for [Vec<$t>] {
            fn detach_to_host(&self) -> Result<HostArray, VizError> {
                rows_to_host(self, HostScalar::to_f32)
            }

            fn detach_to_host_f64(&self) -> Result<HostArray<f64>, VizError> {
                rows_to_host(self, HostScalar::to_f64)
            }
        }

        impl HostTensor for Vec<Vec<$t>> {
            fn detach_to_host(&self) -> Result<HostArray, VizError> {
                self.as_slice().detach_to_host()
            }

            fn detach_to_host_f64(&self) -> Result<HostArray<f64>, VizError> {
                self.as_slice().detach_to_host_f64()
            }
        }
    )*};
}

impl_host_tensor_for_std!(f32, f64);

#[cfg(feature = "onnx")]
fn ort_dims(shape: &[i64]) -> Result<Vec<usize>, VizError> {
    shape
        .iter()
        .map(|&d| {
            usize::try_from(d)
                .map_err(|_| VizError::Tensor(format!("dynamic dimension {d} in output")))
        })
        .collect()
}

#[cfg(feature = "onnx")]
impl HostTensor for ort::value::DynValue {
    fn detach_to_host(&self) -> Result<HostArray, VizError> {
        let (shape, data) = self
            .try_extract_tensor::<f32>()
            .map_err(|e| VizError::Tensor(e.to_string()))?;
        HostArray::new(ort_dims(shape)?, data.to_vec())
    }

    fn detach_to_host_f64(&self) -> Result<HostArray<f64>, VizError> {
        if let Ok((shape, data)) = self.try_extract_tensor::<f64>() {
            return HostArray::new(ort_dims(shape)?, data.to_vec());
        }
        let host = self.detach_to_host()?;
        Ok(HostArray {
            shape: host.shape,
            data: host.data.into_iter().map(f64::from).collect(),
        })
    }
}

// ============================================================================
// Scalars
// ============================================================================

/// A scalar, or a one-element wrapper around one, as handed out by most
/// similarity computations.
pub trait ScalarLike {
    fn item(&self) -> Result<f64, VizError>;
}

impl ScalarLike for f32 {
    fn item(&self) -> Result<f64, VizError> {
        Ok(*self as f64)
    }
}

impl ScalarLike for f64 {
    fn item(&self) -> Result<f64, VizError> {
        Ok(*self)
    }
}

impl<S, D> ScalarLike for ArrayBase<S, D>
where
    S: Data,
    S::Elem: HostScalar,
    D: Dimension,
{
    fn item(&self) -> Result<f64, VizError> {
        match self.len() {
            1 => Ok(self.iter().next().map_or(0.0, |v| v.to_f64())),
            elements => Err(VizError::InvalidScalar { elements }),
        }
    }
}

#[cfg(feature = "onnx")]
impl ScalarLike for ort::value::DynValue {
    fn item(&self) -> Result<f64, VizError> {
        let host = self.detach_to_host_f64()?;
        match host.data.as_slice() {
            [v] => Ok(*v),
            values => Err(VizError::InvalidScalar {
                elements: values.len(),
            }),
        }
    }
}

/// Coerce a list of scalar-like values to plain `f64`.
pub fn scores_from_scalars<S: ScalarLike>(scores: &[S]) -> Result<Vec<f64>, VizError> {
    scores.iter().map(ScalarLike::item).collect()
}

/// Flatten a 1-D (or `[N, 1]`) tensor of scores to plain `f64`.
pub fn scores_from_tensor<T: HostTensor + ?Sized>(scores: &T) -> Result<Vec<f64>, VizError> {
    let host = scores.detach_to_host_f64()?;
    match host.shape.as_slice() {
        [_] | [_, 1] => Ok(host.data),
        _ => Err(VizError::InvalidShape {
            what: "similarity",
            shape: host.shape.clone(),
            reason: "expected a vector of scores",
        }),
    }
}

// ============================================================================
// Normalizer
// ============================================================================

fn check_finite(what: &'static str, data: &[f32]) -> Result<(), VizError> {
    match data.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(VizError::NonFinite { what, index }),
        None => Ok(()),
    }
}

/// Normalize the query embedding: shape `[D]` or `[1, D]`.
pub fn normalize_query<Q: HostTensor + ?Sized>(query: &Q) -> Result<Array1<f32>, VizError> {
    let host = query.detach_to_host()?;
    match host.shape.as_slice() {
        [0] | [1, 0] => return Err(VizError::EmptyEmbedding),
        [_] | [1, _] => {}
        _ => {
            return Err(VizError::InvalidShape {
                what: "query",
                shape: host.shape.clone(),
                reason: "expected a single vector",
            })
        }
    }
    check_finite("query", &host.data)?;
    Ok(Array1::from(host.data))
}

/// Normalize the candidate matrix: shape `[N, D]`, or an empty `[0]`.
pub fn normalize_candidates<C: HostTensor + ?Sized>(
    candidates: &C,
) -> Result<Array2<f32>, VizError> {
    let host = candidates.detach_to_host()?;
    let (rows, cols) = match host.shape.as_slice() {
        [0] => (0, 0),
        &[rows, cols] => (rows, cols),
        _ => {
            return Err(VizError::InvalidShape {
                what: "candidates",
                shape: host.shape.clone(),
                reason: "expected a matrix with one row per item",
            })
        }
    };
    if rows > 0 && cols == 0 {
        return Err(VizError::EmptyEmbedding);
    }
    check_finite("candidates", &host.data)?;
    Array2::from_shape_vec((rows, cols), host.data)
        .map_err(|e| VizError::Tensor(e.to_string()))
}

/// Stack the query above the candidates into one `(N+1)×D` matrix.
pub fn stack(query: &Array1<f32>, candidates: &Array2<f32>) -> Result<Array2<f32>, VizError> {
    let query_row = query.view().insert_axis(Axis(0));
    if candidates.nrows() == 0 {
        return Ok(query_row.to_owned());
    }
    if candidates.ncols() != query.len() {
        return Err(VizError::DimensionMismatch {
            expected: query.len(),
            actual: candidates.ncols(),
        });
    }
    ndarray::concatenate(Axis(0), &[query_row, candidates.view()])
        .map_err(|e| VizError::Tensor(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array0};

    /// Stand-in for a device tensor: values are only reachable through
    /// `detach_to_host`.
    struct DeviceTensor {
        shape: Vec<usize>,
        device_buffer: Vec<f64>,
    }

    impl HostTensor for DeviceTensor {
        fn detach_to_host(&self) -> Result<HostArray, VizError> {
            HostArray::new(
                self.shape.clone(),
                self.device_buffer.iter().map(|&v| v as f32).collect(),
            )
        }
    }

    #[test]
    fn test_query_accepts_vector_and_row_matrix() {
        let from_vec = normalize_query(&vec![1.0f32, 2.0, 3.0]).unwrap();
        let from_row = normalize_query(&array![[1.0f32, 2.0, 3.0]]).unwrap();
        let from_f64 = normalize_query(&array![1.0f64, 2.0, 3.0]).unwrap();

        assert_eq!(from_vec, array![1.0f32, 2.0, 3.0]);
        assert_eq!(from_vec, from_row);
        assert_eq!(from_vec, from_f64);
    }

    #[test]
    fn test_query_rejects_matrix_and_empty() {
        let matrix = array![[1.0f32, 2.0], [3.0, 4.0]];
        assert!(matches!(
            normalize_query(&matrix),
            Err(VizError::InvalidShape { what: "query", .. })
        ));
        assert!(matches!(
            normalize_query(&Vec::<f32>::new()),
            Err(VizError::EmptyEmbedding)
        ));
    }

    #[test]
    fn test_candidates_from_nested_vecs() {
        let rows = vec![vec![1.0f32, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]];
        let matrix = normalize_candidates(&rows).unwrap();

        assert_eq!(matrix.dim(), (3, 2));
        assert_eq!(matrix.row(2), array![0.5f32, 0.5]);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let rows = vec![vec![1.0f32, 0.0], vec![0.0]];
        match normalize_candidates(&rows) {
            Err(VizError::RaggedRows {
                row,
                expected,
                actual,
            }) => {
                assert_eq!((row, expected, actual), (1, 2, 1));
            }
            other => panic!("expected RaggedRows, got {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_rejected() {
        let rows = vec![vec![1.0f32, f32::NAN]];
        assert!(matches!(
            normalize_candidates(&rows),
            Err(VizError::NonFinite {
                what: "candidates",
                index: 1
            })
        ));
    }

    #[test]
    fn test_device_tensor_detaches_losslessly() {
        let plain = array![[0.25f32, -1.5, 3.0], [7.0, 0.125, -0.5]];
        let tensor = DeviceTensor {
            shape: vec![2, 3],
            device_buffer: vec![0.25, -1.5, 3.0, 7.0, 0.125, -0.5],
        };

        assert_eq!(
            normalize_candidates(&tensor).unwrap(),
            normalize_candidates(&plain).unwrap()
        );
    }

    #[test]
    fn test_transposed_view_is_read_in_logical_order() {
        let stored = array![[1.0f32, 3.0], [2.0, 4.0]];
        let host = stored.t().detach_to_host().unwrap();
        assert_eq!(host.data, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_stack_puts_query_first() {
        let query = array![9.0f32, 9.0];
        let candidates = array![[1.0f32, 2.0], [3.0, 4.0]];

        let stacked = stack(&query, &candidates).unwrap();

        assert_eq!(stacked.dim(), (3, 2));
        assert_eq!(stacked.row(0), query);
        assert_eq!(stacked.row(2), array![3.0f32, 4.0]);
    }

    #[test]
    fn test_stack_dimension_mismatch_names_both_sizes() {
        let query = array![1.0f32, 2.0, 3.0];
        let candidates = array![[1.0f32, 2.0]];

        let err = stack(&query, &candidates).unwrap_err();
        assert!(matches!(
            err,
            VizError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert!(err.to_string().contains("expected 3"));
        assert!(err.to_string().contains("got 2"));
    }

    #[test]
    fn test_stack_with_no_candidates() {
        let query = array![1.0f32, 2.0];
        let candidates = normalize_candidates(&Vec::<f32>::new()).unwrap();

        let stacked = stack(&query, &candidates).unwrap();
        assert_eq!(stacked.dim(), (1, 2));
    }

    #[test]
    fn test_scalar_like_coercion() {
        assert_eq!(0.5f32.item().unwrap(), 0.5);
        assert_eq!(Array0::from_elem((), 0.75f64).item().unwrap(), 0.75);
        assert_eq!(array![0.25f32].item().unwrap(), 0.25);
        assert!(matches!(
            array![0.1f32, 0.2].item(),
            Err(VizError::InvalidScalar { elements: 2 })
        ));
    }

    #[test]
    fn test_scores_from_tensor() {
        let scores = scores_from_tensor(&array![[0.5f32], [0.25]]).unwrap();
        assert_eq!(scores, vec![0.5, 0.25]);
        assert!(scores_from_tensor(&array![[0.5f32, 0.25]]).is_err());
    }

    #[test]
    fn test_f64_scores_keep_full_precision() {
        let scores = [0.3349999999f64, 0.125];

        assert_eq!(scores_from_tensor(&array![0.3349999999f64, 0.125]).unwrap(), scores);
        assert_eq!(scores_from_tensor(&scores.to_vec()).unwrap(), scores);
        assert_eq!(
            scores_from_tensor(&vec![vec![0.3349999999f64], vec![0.125]]).unwrap(),
            scores
        );
        assert_eq!(scores_from_scalars(&scores).unwrap(), scores);
    }

    #[test]
    fn test_f32_only_tensors_widen_for_scores() {
        let tensor = DeviceTensor {
            shape: vec![2],
            device_buffer: vec![0.5, 0.25],
        };
        assert_eq!(scores_from_tensor(&tensor).unwrap(), vec![0.5, 0.25]);
    }
}
