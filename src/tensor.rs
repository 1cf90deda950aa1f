use crate::error::{PramError, Result};
use rand::distr::Uniform;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fmt;

/// Dense tensor produced by the build strategies.
///
/// Fields:
/// - `data`: flat Vec<f32> of actual values (row-major order)
/// - `shape`: dimensions, e.g. [rows, cols]
/// - `requires_grad`: marks a trainable parameter
///
/// The serialized form (`{shape, data, requires_grad}`) is also what the
/// builder recognises as an already-built tensor, so a record dump can be fed
/// back in as parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
    #[serde(default)]
    pub requires_grad: bool,
}

// ===== TENSOR CONSTRUCTORS =====
impl Tensor {
    /// Create a new tensor from data and shape
    ///
    /// # Errors
    /// Returns `ShapeDataMismatch` if data.len() != shape.product()
    pub fn new(data: Vec<f32>, shape: &[usize], requires_grad: bool) -> Result<Tensor> {
        let elements = checked_numel(shape)?;
        if data.len() != elements {
            return Err(PramError::ShapeDataMismatch {
                shape: shape.to_vec(),
                elements,
                len: data.len(),
            });
        }
        Ok(Tensor {
            shape: shape.to_vec(),
            data,
            requires_grad,
        })
    }

    /// Create a tensor filled with zeros
    pub fn zeros(shape: &[usize]) -> Result<Tensor> {
        Self::full(shape, 0.0)
    }

    /// Create a tensor filled with ones
    pub fn ones(shape: &[usize]) -> Result<Tensor> {
        Self::full(shape, 1.0)
    }

    /// Create a tensor where every element is `value`
    ///
    /// # Errors
    /// `InvalidParameter` if the shape's element count overflows `usize`.
    pub fn full(shape: &[usize], value: f32) -> Result<Tensor> {
        let size = checked_numel(shape)?;
        Ok(Tensor {
            shape: shape.to_vec(),
            data: vec![value; size],
            requires_grad: false,
        })
    }

    /// Create a tensor with values drawn from N(mean, std)
    ///
    /// # Errors
    /// `InvalidParameter` if `std` is negative or not finite, or the shape
    /// overflows.
    pub fn normal(shape: &[usize], mean: f32, std: f32) -> Result<Tensor> {
        let size = checked_numel(shape)?;
        let normal = Normal::new(mean, std)
            .map_err(|e| PramError::InvalidParameter(format!("normal(mean={mean}, std={std}): {e}")))?;
        let mut rng = rand::rng();
        let data: Vec<f32> = (0..size).map(|_| normal.sample(&mut rng)).collect();
        Ok(Tensor {
            shape: shape.to_vec(),
            data,
            requires_grad: false,
        })
    }

    /// Create a tensor with values uniformly distributed in [low, high)
    ///
    /// # Errors
    /// `InvalidParameter` unless `low < high` and `high - low` is finite, or
    /// if the shape overflows.
    pub fn uniform(shape: &[usize], low: f32, high: f32) -> Result<Tensor> {
        let size = checked_numel(shape)?;
        let uniform = Uniform::new(low, high)
            .map_err(|e| PramError::InvalidParameter(format!("uniform(low={low}, high={high}): {e}")))?;
        let mut rng = rand::rng();
        let data: Vec<f32> = (0..size).map(|_| uniform.sample(&mut rng)).collect();
        Ok(Tensor {
            shape: shape.to_vec(),
            data,
            requires_grad: false,
        })
    }
}

// ===== PROPERTIES =====
impl Tensor {
    /// Number of elements
    #[must_use]
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Number of dimensions
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Mark the tensor as a trainable parameter
    #[must_use]
    pub fn into_parameter(mut self) -> Tensor {
        self.requires_grad = true;
        self
    }

    /// Apply a function to every element in place
    pub fn map_inplace(&mut self, f: impl Fn(f32) -> f32) {
        for x in &mut self.data {
            *x = f(*x);
        }
    }

    /// Recognise the serialized form of a tensor.
    ///
    /// Only mappings whose keys are `shape`, `data` and optionally
    /// `requires_grad` qualify, and the data length must agree with the shape.
    pub fn from_value(raw: &Value) -> Option<Tensor> {
        let map = raw.as_mapping()?;
        let allowed = ["shape", "data", "requires_grad"];
        if !map.contains_key("shape") || !map.contains_key("data") {
            return None;
        }
        if map
            .keys()
            .any(|k| !k.as_str().is_some_and(|k| allowed.contains(&k)))
        {
            return None;
        }
        let t: Tensor = serde_yaml::from_value(raw.clone()).ok()?;
        let elements = checked_numel(&t.shape).ok()?;
        (t.data.len() == elements).then_some(t)
    }
}

/// Element count of `shape`, rejecting shapes whose product overflows
fn checked_numel(shape: &[usize]) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| PramError::InvalidParameter(format!("shape {shape:?} is too large")))
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tensor(shape={:?}", self.shape)?;
        if self.numel() <= 8 {
            write!(f, ", data={:?}", self.data)?;
        }
        if self.requires_grad {
            write!(f, ", requires_grad=true")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_mismatched_data() {
        let err = Tensor::new(vec![1.0, 2.0, 3.0], &[2, 2], false).unwrap_err();
        assert!(matches!(
            err,
            PramError::ShapeDataMismatch {
                elements: 4,
                len: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_full_and_friends() {
        let t = Tensor::full(&[2, 3], 1.5).unwrap();
        assert_eq!(t.shape, vec![2, 3]);
        assert!(t.data.iter().all(|&x| x == 1.5));
        assert!(Tensor::zeros(&[4]).unwrap().data.iter().all(|&x| x == 0.0));
        assert!(Tensor::ones(&[4]).unwrap().data.iter().all(|&x| x == 1.0));
    }

    #[test]
    fn test_overflowing_shape_is_rejected() {
        let huge = [1usize << 32, 1 << 32, 16];
        assert!(matches!(
            Tensor::full(&huge, 0.0),
            Err(PramError::InvalidParameter(_))
        ));
        assert!(matches!(
            Tensor::normal(&huge, 0.0, 1.0),
            Err(PramError::InvalidParameter(_))
        ));
        assert!(matches!(
            Tensor::uniform(&huge, 0.0, 1.0),
            Err(PramError::InvalidParameter(_))
        ));
        assert!(matches!(
            Tensor::new(vec![], &huge, false),
            Err(PramError::InvalidParameter(_))
        ));

        let raw: Value =
            serde_yaml::from_str("{shape: [4294967296, 4294967296, 16], data: []}").unwrap();
        assert_eq!(Tensor::from_value(&raw), None);
    }

    #[test]
    fn test_normal_shape_and_invalid_std() {
        let t = Tensor::normal(&[3, 2], 5.0, 0.5).unwrap();
        assert_eq!(t.shape, vec![3, 2]);
        assert_eq!(t.numel(), 6);
        assert!(Tensor::normal(&[2], 0.0, -1.0).is_err());
    }

    #[test]
    fn test_zero_std_is_constant() {
        let t = Tensor::normal(&[5], 2.0, 0.0).unwrap();
        assert!(t.data.iter().all(|&x| x == 2.0));
    }

    #[test]
    fn test_uniform_range() {
        let t = Tensor::uniform(&[100], -1.0, 1.0).unwrap();
        assert!(t.data.iter().all(|&x| (-1.0..1.0).contains(&x)));
        assert!(Tensor::uniform(&[1], 1.0, 1.0).is_err());
    }

    #[test]
    fn test_uniform_range_too_wide() {
        let err = Tensor::uniform(&[2], -3.0e38, 3.0e38).unwrap_err();
        assert!(matches!(err, PramError::InvalidParameter(_)));
        assert!(Tensor::uniform(&[2], f32::NEG_INFINITY, 0.0).is_err());
    }

    #[test]
    fn test_from_value_recognises_dump_form() {
        let t = Tensor::new(vec![1.0, 2.0], &[2], true).unwrap();
        let v = serde_yaml::to_value(&t).unwrap();
        assert_eq!(Tensor::from_value(&v), Some(t));

        let not_tensor: Value = serde_yaml::from_str("{mean: 1.0, std: 0.5, size: [2]}").unwrap();
        assert_eq!(Tensor::from_value(&not_tensor), None);

        let extra: Value = serde_yaml::from_str("{shape: [1], data: [1.0], mean: 2.0}").unwrap();
        assert_eq!(Tensor::from_value(&extra), None);

        let bad_len: Value = serde_yaml::from_str("{shape: [3], data: [1.0]}").unwrap();
        assert_eq!(Tensor::from_value(&bad_len), None);
    }

    #[test]
    fn test_display() {
        let t = Tensor::ones(&[2]).unwrap().into_parameter();
        assert_eq!(t.to_string(), "tensor(shape=[2], data=[1.0, 1.0], requires_grad=true)");
    }
}
