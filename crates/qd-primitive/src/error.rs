use thiserror::Error;

/// Status codes returned across the primitive boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success = 0,
    InvalidArguments = 1,
    Unimplemented = 2,
    RuntimeError = 3,
}

impl Status {
    pub fn from_result<T>(result: &Result<T>) -> Status {
        match result {
            Ok(_) => Status::Success,
            Err(e) => e.status(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrimitiveError {
    /// Malformed, wrong-typed, wrong-ranked or missing runtime memory.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    /// Engine pairing, hardware feature or configuration not supported.
    #[error("unimplemented: {0}")]
    Unimplemented(String),
    /// Configuration succeeded but the device could not carry it out.
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("tensor error: {0}")]
    Tensor(#[from] qd_tensor::TensorError),
}

impl PrimitiveError {
    pub fn status(&self) -> Status {
        match self {
            PrimitiveError::InvalidArguments(_) | PrimitiveError::Tensor(_) => {
                Status::InvalidArguments
            }
            PrimitiveError::Unimplemented(_) => Status::Unimplemented,
            PrimitiveError::Runtime(_) => Status::RuntimeError,
        }
    }
}

pub type Result<T> = std::result::Result<T, PrimitiveError>;
