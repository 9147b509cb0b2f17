use thiserror::Error;

use crate::feature::DeviceExt;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("engine {engine} cannot compile device kernels")]
    CompilationUnsupported { engine: String },
    #[error("kernel entry point not found: {0}")]
    UnknownKernel(String),
    #[error("kernel {kernel} requires {ext} which the device does not support")]
    MissingExtension { kernel: String, ext: DeviceExt },
    #[error("submission failed: {0}")]
    Submission(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
