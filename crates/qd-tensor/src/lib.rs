//! `qd-tensor` - Memory descriptors and typed memory for quantized-primitive dispatch.
//!
//! This crate provides:
//! - Data type definitions (F32, F16, S32, S8, U8)
//! - `Shape` utilities
//! - `MemoryDesc` with layout and extra-flag (compensation marker) metadata
//! - `Memory` handles backed by typed host storage

pub mod dtype;
pub mod error;
pub mod memory;
pub mod memory_desc;
pub mod shape;

// Re-export primary types at the crate root for convenience.
pub use dtype::DType;
pub use error::{Result, TensorError};
pub use memory::{Memory, Storage};
pub use memory_desc::{ExtraFlag, ExtraFlags, Layout, MemoryDesc};
pub use shape::Shape;
