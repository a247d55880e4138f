//! Row-major float tensor
//!
//! Minimal multi-dimensional array as supplied by the training-framework
//! exporter: a shape vector plus flat row-major data.

use serde::{Deserialize, Serialize};

use crate::error::{QforgeError, Result};

/// Multi-dimensional array of f32 in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(QforgeError::InvalidModel {
                reason: format!(
                    "tensor data length {} does not match shape {:?} (expected {})",
                    data.len(),
                    shape,
                    expected
                ),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element at a multi-index, row-major. Index length must equal the rank.
    pub fn get(&self, index: &[usize]) -> f32 {
        debug_assert_eq!(index.len(), self.shape.len());
        let mut flat = 0;
        for (i, &idx) in index.iter().enumerate() {
            debug_assert!(idx < self.shape[i]);
            flat = flat * self.shape[i] + idx;
        }
        self.data[flat]
    }

    /// Largest absolute value in the tensor, 0.0 for an empty tensor.
    pub fn peak(&self) -> f32 {
        self.data.iter().fold(0.0f32, |acc, &v| acc.max(v.abs()))
    }
}
