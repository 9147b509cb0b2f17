use std::sync::Arc;

use qd_engine::{Engine, Kernel, KernelArg, KernelArgList};
use qd_tensor::{Memory, MemoryDesc};

use crate::arg::{ArgId, ArgKey};
use crate::error::{PrimitiveError, Result};
use crate::exec_ctx::ExecContext;
use crate::primitive::{verbose, Primitive};
use crate::reorder::pd::RnnWeightsReorderPd;
use crate::resolver::{
    resolve_scale_broadcast, resolve_scale_scalar, resolve_zero_point_buffer,
    resolve_zero_point_scalar, ScaleBuffer,
};
use crate::scratchpad::ScratchpadKey;

/// Device program entry point of the reorder.
pub const KERNEL_NAME: &str = "wei_reorder";

/// Cross-engine RNN weights reorder: a compiled kernel plus the descriptor
/// it was compiled from.
#[derive(Debug)]
pub struct RnnWeightsReorder {
    pd: Arc<RnnWeightsReorderPd>,
    kernel: Arc<Kernel>,
}

/// Memory bound for `arg`, which must also match the descriptor the
/// primitive was created with.
fn bound_arg<'a>(ctx: &ExecContext<'a>, arg: ArgId, expected: &MemoryDesc) -> Result<&'a Memory> {
    let memory = ctx
        .memory(ArgKey::Mem(arg))
        .ok_or_else(|| PrimitiveError::InvalidArguments(format!("no memory bound for {}", arg)))?;
    if memory.desc() != expected {
        return Err(PrimitiveError::InvalidArguments(format!(
            "{} is {}, primitive was created for {}",
            arg,
            memory.desc(),
            expected
        )));
    }
    Ok(memory)
}

impl RnnWeightsReorder {
    /// Compiles the reorder kernel on `engine`.
    ///
    /// # Errors
    /// `Runtime` if the engine yields no usable kernel.
    pub fn init(pd: Arc<RnnWeightsReorderPd>, engine: &dyn Engine) -> Result<Self> {
        let kernel_ctx = pd.init_kernel_ctx();
        let kernel = engine.create_kernel(KERNEL_NAME, &kernel_ctx).map_err(|e| {
            PrimitiveError::Runtime(format!(
                "{}: could not create {} on {}: {}",
                pd.name(),
                KERNEL_NAME,
                engine.name(),
                e
            ))
        })?;
        Ok(RnnWeightsReorder { pd, kernel })
    }

    pub fn pd(&self) -> &RnnWeightsReorderPd {
        &self.pd
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }
}

impl Primitive for RnnWeightsReorder {
    fn name(&self) -> &'static str {
        self.pd.name()
    }

    fn execute(&self, ctx: &ExecContext<'_>) -> Result<()> {
        let pd = &*self.pd;
        let conf = pd.conf();
        let attr = pd.attr();

        let input = bound_arg(ctx, ArgId::FROM, pd.src_md())?;
        let output = bound_arg(ctx, ArgId::TO, pd.dst_md())?;

        // Resolve and validate everything before the kernel is touched.
        let scales = resolve_scale_broadcast(ctx, attr, ArgId::TO)?;
        // A broadcast covers only SCALE_LANES values.
        if scales.len() < conf.scales_count {
            let bound = match scales {
                ScaleBuffer::Broadcast(_) => "single broadcast",
                ScaleBuffer::Dense(_) => "dense",
            };
            return Err(PrimitiveError::InvalidArguments(format!(
                "{} destination scales ({} values) bound, {} required",
                bound,
                scales.len(),
                conf.scales_count
            )));
        }
        let src_scale = resolve_scale_scalar(ctx, attr, ArgId::FROM)?;
        let src_zero_point = resolve_zero_point_scalar(ctx, attr, ArgId::FROM)?;
        let dst_zero_points = resolve_zero_point_buffer(ctx, attr, ArgId::TO)?;

        let grantor = ctx.scratchpad_grantor(pd.scratchpad_registry())?;
        let workspace = if conf.do_reorder {
            let region = grantor.get(ScratchpadKey::ReorderRnnSpace).ok_or_else(|| {
                PrimitiveError::InvalidArguments(format!(
                    "scratchpad region {} unavailable",
                    ScratchpadKey::ReorderRnnSpace
                ))
            })?;
            KernelArg::SubMemory {
                memory: region.memory,
                offset: region.offset,
                size: region.size,
            }
        } else {
            KernelArg::Memory(output)
        };

        let mut args = KernelArgList::new();
        args.set(0, KernelArg::Memory(input));
        args.set(1, workspace);
        args.set(2, KernelArg::Memory(output));
        args.set(3, scales.kernel_arg());
        args.set(4, KernelArg::F32(*src_scale));
        args.set(5, KernelArg::I32(src_zero_point));
        args.set(6, dst_zero_points.kernel_arg());

        ctx.stream()
            .submit(&self.kernel, &conf.range, &args)
            .map_err(|e| PrimitiveError::Runtime(format!("{}: {}", pd.name(), e)))?;

        verbose(
            pd.verbose(),
            "exec",
            pd.name(),
            format_args!(
                "src:{},dst:{},gws:{:?}",
                pd.src_md(),
                pd.dst_md(),
                conf.range.global
            ),
        );
        Ok(())
    }
}
