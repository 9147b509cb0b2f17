//! Reference accelerator engine.
//!
//! Models a device by its advertised extension set and the kernel entry
//! points its program provides. Compilation validates the kernel context
//! against the device and hands out cached kernel objects; launches go to a
//! [`GpuStream`].

mod cache;
pub mod stream;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::{Engine, EngineKind};
use crate::error::{EngineError, Result};
use crate::feature::{DeviceExt, DeviceExtSet};
use crate::kernel::{Kernel, KernelCtx};

use cache::KernelCache;
pub use stream::{ArgRecord, GpuStream, Submission};

/// Entry points the built-in device program provides.
pub const DEFAULT_KERNELS: &[&str] = &["wei_reorder"];

#[derive(Debug)]
pub struct GpuEngine {
    name: String,
    extensions: DeviceExtSet,
    kernels: BTreeSet<String>,
    config: EngineConfig,
    cache: KernelCache,
    next_kernel_id: AtomicU64,
}

impl GpuEngine {
    /// Create a device engine using the process-wide configuration.
    pub fn new(name: &str, extensions: DeviceExtSet) -> Self {
        Self::with_config(name, extensions, EngineConfig::global().clone())
    }

    pub fn with_config(name: &str, extensions: DeviceExtSet, config: EngineConfig) -> Self {
        log::info!(
            "initialized gpu engine {} (extensions: {:?}, kernel cache: {})",
            name,
            extensions.iter().map(|e| e.name()).collect::<Vec<_>>(),
            config.kernel_cache
        );
        GpuEngine {
            name: name.to_string(),
            extensions,
            kernels: DEFAULT_KERNELS.iter().map(|k| k.to_string()).collect(),
            config,
            cache: KernelCache::new(),
            next_kernel_id: AtomicU64::new(1),
        }
    }

    /// Replaces the set of entry points the device program provides.
    pub fn with_kernels(mut self, kernels: &[&str]) -> Self {
        self.kernels = kernels.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn extensions(&self) -> DeviceExtSet {
        self.extensions
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of distinct kernels compiled and cached so far.
    pub fn cached_kernels(&self) -> usize {
        self.cache.len()
    }

    fn compile(&self, name: &str, ctx: &KernelCtx) -> Result<Kernel> {
        if !self.kernels.contains(name) {
            return Err(EngineError::UnknownKernel(name.to_string()));
        }
        if let Some(ext) = ctx.required_extensions().find(|ext| !self.mayiuse(*ext)) {
            return Err(EngineError::MissingExtension {
                kernel: name.to_string(),
                ext,
            });
        }
        let id = self.next_kernel_id.fetch_add(1, Ordering::Relaxed);
        let options = ctx.build_options();
        log::debug!("{}: compiled {} #{} [{}]", self.name, name, id, options);
        Ok(Kernel::new(id, name, options))
    }
}

impl Engine for GpuEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Gpu
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn mayiuse(&self, ext: DeviceExt) -> bool {
        self.extensions.contains(ext)
    }

    fn buffer_alignment(&self) -> usize {
        self.config.buffer_alignment
    }

    fn verbose(&self) -> bool {
        self.config.verbose
    }

    fn create_kernel(&self, name: &str, ctx: &KernelCtx) -> Result<Arc<Kernel>> {
        if !self.config.kernel_cache {
            return self.compile(name, ctx).map(Arc::new);
        }
        let key = (name.to_string(), ctx.build_options());
        let (kernel, hit) = self
            .cache
            .get_or_try_insert_with(key, || self.compile(name, ctx))?;
        if hit {
            log::debug!("{}: kernel cache hit for {} #{}", self.name, name, kernel.id());
        }
        Ok(kernel)
    }
}
