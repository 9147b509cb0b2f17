//! `qd-engine` - Compute engines for quantized-primitive dispatch.
//!
//! This crate provides:
//! - The `Engine` capability trait (feature queries, kernel compilation)
//! - A `CpuEngine` and a reference accelerator `GpuEngine` with a kernel cache
//! - `KernelCtx`, `Kernel`, `NdRange` and kernel argument lists
//! - The `Stream` submission trait and the accelerator's `GpuStream`
//! - `EngineConfig`, read from the environment

pub mod config;
pub mod cpu;
pub mod engine;
pub mod error;
pub mod feature;
pub mod gpu;
pub mod kernel;
pub mod stream;

pub use config::EngineConfig;
pub use cpu::CpuEngine;
pub use engine::{Engine, EngineKind};
pub use error::{EngineError, Result};
pub use feature::{DeviceExt, DeviceExtSet};
pub use gpu::{GpuEngine, GpuStream};
pub use kernel::{Kernel, KernelArg, KernelArgList, KernelCtx, NdRange};
pub use stream::Stream;
