use thiserror::Error;

use crate::dtype::DType;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TensorError {
    #[error("dtype mismatch: expected {expected}, got {got}")]
    DTypeMismatch { expected: DType, got: DType },
    #[error("data length {len} does not match {numel} elements of shape {dims:?}")]
    LengthMismatch {
        len: usize,
        numel: usize,
        dims: Vec<usize>,
    },
    #[error("layout {layout} expects {expected} dimensions, got {got}")]
    LayoutRank {
        layout: String,
        expected: usize,
        got: usize,
    },
}

pub type Result<T> = std::result::Result<T, TensorError>;
