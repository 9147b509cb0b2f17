use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::{Engine, EngineKind};
use crate::error::{EngineError, Result};
use crate::feature::DeviceExt;
use crate::kernel::{Kernel, KernelCtx};

/// Host processor engine.
///
/// Owns host memory and can be the source side of a cross-engine
/// primitive, but has no device extensions and compiles no device kernels.
#[derive(Debug, Clone)]
pub struct CpuEngine {
    buffer_alignment: usize,
    verbose: bool,
}

impl CpuEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::global())
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        CpuEngine {
            buffer_alignment: config.buffer_alignment,
            verbose: config.verbose,
        }
    }
}

impl Default for CpuEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for CpuEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Cpu
    }

    fn name(&self) -> &str {
        "cpu"
    }

    fn mayiuse(&self, _ext: DeviceExt) -> bool {
        false
    }

    fn buffer_alignment(&self) -> usize {
        self.buffer_alignment
    }

    fn verbose(&self) -> bool {
        self.verbose
    }

    fn create_kernel(&self, name: &str, _ctx: &KernelCtx) -> Result<Arc<Kernel>> {
        log::debug!("cpu engine asked to compile device kernel {}", name);
        Err(EngineError::CompilationUnsupported {
            engine: self.name().to_string(),
        })
    }
}
