use std::fmt::{self, Debug};
use std::sync::Arc;

use crate::error::Result;
use crate::feature::DeviceExt;
use crate::kernel::{Kernel, KernelCtx};

/// Kind of compute engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// General-purpose processor.
    Cpu,
    /// Accelerator device.
    Gpu,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Cpu => write!(f, "cpu"),
            EngineKind::Gpu => write!(f, "gpu"),
        }
    }
}

/// Capability interface every engine implements.
///
/// Primitives only ever query features and request compilation through
/// this trait; they never inspect the concrete engine type.
pub trait Engine: Send + Sync + Debug {
    fn kind(&self) -> EngineKind;

    /// Returns the name of this engine (e.g., "cpu", a device name).
    fn name(&self) -> &str;

    /// Whether the engine supports the given device extension.
    fn mayiuse(&self, ext: DeviceExt) -> bool;

    /// Alignment, in bytes, the engine requires of buffers it is handed.
    fn buffer_alignment(&self) -> usize;

    /// Whether primitives created for this engine log `qd_verbose` lines.
    fn verbose(&self) -> bool;

    /// Compiles the program entry point `name` with the given kernel context.
    ///
    /// # Errors
    /// Fails when the engine cannot produce a usable kernel object.
    fn create_kernel(&self, name: &str, ctx: &KernelCtx) -> Result<Arc<Kernel>>;
}
