//! Runtime quantization-parameter resolution.
//!
//! Each function looks at the attribute set first: a default attribute
//! resolves to a local identity value (scale 1.0, zero point 0) without
//! touching the execution context. A runtime attribute must have memory
//! bound under the matching attribute key, and that memory is validated
//! before anything is handed to a kernel.
//!
//! Broadcast and scalar resolution are kept apart because their consumers
//! read different widths: vector kernels load a full 16-lane register,
//! scalar consumers read exactly one value.

use qd_engine::KernelArg;
use qd_tensor::{DType, Memory};

use crate::arg::{ArgId, ArgKey};
use crate::attr::AttributeSet;
use crate::error::{PrimitiveError, Result};
use crate::exec_ctx::ExecContext;

/// Width of a broadcast scale vector.
pub const SCALE_LANES: usize = 16;

static DEFAULT_SCALE: f32 = 1.0;
static DEFAULT_ZERO_POINT: i32 = 0;

/// Sixteen f32 lanes, 16-byte aligned.
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleLanes(pub [f32; SCALE_LANES]);

impl ScaleLanes {
    pub fn splat(value: f32) -> Self {
        ScaleLanes([value; SCALE_LANES])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

/// Resolved scales for a vector consumer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleBuffer<'a> {
    /// A single value (default or runtime) replicated into every lane.
    Broadcast(ScaleLanes),
    /// The caller's dense buffer, passed through unchanged.
    Dense(&'a [f32]),
}

impl ScaleBuffer<'_> {
    pub fn as_slice(&self) -> &[f32] {
        match self {
            ScaleBuffer::Broadcast(lanes) => lanes.as_slice(),
            ScaleBuffer::Dense(values) => values,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn kernel_arg(&self) -> KernelArg<'_> {
        KernelArg::F32Slice(self.as_slice())
    }
}

/// Resolved zero points for a buffer consumer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZeroPointBuffer<'a> {
    /// A single zero-valued slot.
    Default(&'static [i32]),
    /// The caller's memory, passed through as-is.
    Runtime(&'a Memory),
}

impl<'a> ZeroPointBuffer<'a> {
    pub fn kernel_arg(&self) -> KernelArg<'a> {
        match *self {
            ZeroPointBuffer::Default(slot) => KernelArg::I32Slice(slot),
            ZeroPointBuffer::Runtime(memory) => KernelArg::Memory(memory),
        }
    }
}

fn bound_memory<'a>(ctx: &ExecContext<'a>, key: ArgKey) -> Result<&'a Memory> {
    ctx.memory(key)
        .ok_or_else(|| PrimitiveError::InvalidArguments(format!("no memory bound for {}", key)))
}

/// Checks element type and rank 1, and optionally that the buffer holds
/// exactly one element.
fn check_vector(memory: &Memory, key: ArgKey, dtype: DType, single: bool) -> Result<()> {
    let desc = memory.desc();
    if desc.dtype() != dtype {
        return Err(PrimitiveError::InvalidArguments(format!(
            "{} must be {}, got {}",
            key,
            dtype,
            desc.dtype()
        )));
    }
    if desc.ndims() != 1 {
        return Err(PrimitiveError::InvalidArguments(format!(
            "{} must be rank 1, got shape {}",
            key,
            desc.shape()
        )));
    }
    if single && !desc.shape().is_single_value() {
        return Err(PrimitiveError::InvalidArguments(format!(
            "{} must hold exactly one value, got shape {}",
            key,
            desc.shape()
        )));
    }
    Ok(())
}

/// Resolves the scales of `arg` for a consumer that loads a full vector.
///
/// Default scales and single-value runtime scales come back broadcast to
/// [`SCALE_LANES`] lanes. A runtime buffer with more than one value is
/// returned as the caller's own slice.
pub fn resolve_scale_broadcast<'a>(
    ctx: &ExecContext<'a>,
    attr: &AttributeSet,
    arg: ArgId,
) -> Result<ScaleBuffer<'a>> {
    if attr.scales(arg).is_default() {
        return Ok(ScaleBuffer::Broadcast(ScaleLanes::splat(DEFAULT_SCALE)));
    }
    let key = ArgKey::Scales(arg);
    let memory = bound_memory(ctx, key)?;
    check_vector(memory, key, DType::F32, false)?;

    let values = &memory.as_f32_slice()?[..memory.desc().nelems()];
    match values {
        [single] => Ok(ScaleBuffer::Broadcast(ScaleLanes::splat(*single))),
        _ => Ok(ScaleBuffer::Dense(values)),
    }
}

/// Resolves the scale of `arg` as a single value.
///
/// The result points either at a shared 1.0 constant or directly into the
/// bound memory; nothing is copied.
pub fn resolve_scale_scalar<'a>(
    ctx: &ExecContext<'a>,
    attr: &AttributeSet,
    arg: ArgId,
) -> Result<&'a f32> {
    if attr.scales(arg).is_default() {
        return Ok(&DEFAULT_SCALE);
    }
    let key = ArgKey::Scales(arg);
    let memory = bound_memory(ctx, key)?;
    check_vector(memory, key, DType::F32, true)?;
    let values: &'a [f32] = memory.as_f32_slice()?;
    Ok(&values[0])
}

/// Resolves the zero points of `arg` for a consumer that takes a buffer.
///
/// Runtime memory is only checked for presence; its contents are the
/// consumer's business.
pub fn resolve_zero_point_buffer<'a>(
    ctx: &ExecContext<'a>,
    attr: &AttributeSet,
    arg: ArgId,
) -> Result<ZeroPointBuffer<'a>> {
    if attr.zero_points(arg).is_default() {
        return Ok(ZeroPointBuffer::Default(std::slice::from_ref(
            &DEFAULT_ZERO_POINT,
        )));
    }
    let memory = bound_memory(ctx, ArgKey::ZeroPoints(arg))?;
    Ok(ZeroPointBuffer::Runtime(memory))
}

/// Resolves the zero point of `arg` as a value; 0 when unset.
pub fn resolve_zero_point_scalar(
    ctx: &ExecContext<'_>,
    attr: &AttributeSet,
    arg: ArgId,
) -> Result<i32> {
    if attr.zero_points(arg).is_default() {
        return Ok(DEFAULT_ZERO_POINT);
    }
    let key = ArgKey::ZeroPoints(arg);
    let memory = bound_memory(ctx, key)?;
    check_vector(memory, key, DType::S32, true)?;
    Ok(memory.as_i32_slice()?[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use qd_engine::GpuStream;
    use qd_tensor::{Layout, MemoryDesc, Storage};

    fn runtime_attr() -> AttributeSet {
        AttributeSet::new()
            .with_scales(ArgId::DST, 0)
            .with_zero_points(ArgId::DST, 0)
    }

    fn status(err: PrimitiveError) -> crate::Status {
        err.status()
    }

    #[test]
    fn test_default_scale_broadcast() {
        let stream = GpuStream::new();
        let ctx = ExecContext::new(&stream);
        let buf = resolve_scale_broadcast(&ctx, &AttributeSet::new(), ArgId::DST).unwrap();
        assert_eq!(buf, ScaleBuffer::Broadcast(ScaleLanes::splat(1.0)));
        assert_eq!(buf.len(), SCALE_LANES);
    }

    #[test]
    fn test_single_runtime_scale_broadcast() {
        let stream = GpuStream::new();
        let scale = Memory::from_f32(&[1], vec![2.5]).unwrap();
        let ctx = ExecContext::new(&stream).with_arg(ArgKey::Scales(ArgId::DST), &scale);
        let buf = resolve_scale_broadcast(&ctx, &runtime_attr(), ArgId::DST).unwrap();
        let ScaleBuffer::Broadcast(lanes) = buf else {
            panic!("expected broadcast, got {:?}", buf);
        };
        for lane in lanes.0 {
            assert_relative_eq!(lane, 2.5);
        }
        assert_eq!(std::mem::align_of_val(&lanes), 16);
        assert_eq!(lanes.as_slice().as_ptr() as usize % 16, 0);
    }

    #[test]
    fn test_dense_runtime_scales_pass_through() {
        let stream = GpuStream::new();
        let scales = Memory::from_f32(&[4], vec![0.5, 1.0, 1.5, 2.0]).unwrap();
        let ctx = ExecContext::new(&stream).with_arg(ArgKey::Scales(ArgId::DST), &scales);
        let buf = resolve_scale_broadcast(&ctx, &runtime_attr(), ArgId::DST).unwrap();
        match buf {
            ScaleBuffer::Dense(values) => {
                assert_eq!(values, &[0.5, 1.0, 1.5, 2.0]);
                assert_eq!(values.as_ptr(), scales.as_f32_slice().unwrap().as_ptr());
            }
            other => panic!("expected dense, got {:?}", other),
        }
    }

    #[test]
    fn test_scale_broadcast_missing_memory() {
        let stream = GpuStream::new();
        let ctx = ExecContext::new(&stream);
        let err = resolve_scale_broadcast(&ctx, &runtime_attr(), ArgId::DST).unwrap_err();
        assert_eq!(status(err), crate::Status::InvalidArguments);
    }

    #[test]
    fn test_scale_broadcast_wrong_type_or_rank() {
        let stream = GpuStream::new();
        let ints = Memory::from_i32(&[1], vec![2]).unwrap();
        let matrix = Memory::from_f32(&[1, 1], vec![2.0]).unwrap();
        for bad in [&ints, &matrix] {
            let ctx = ExecContext::new(&stream).with_arg(ArgKey::Scales(ArgId::DST), bad);
            let err = resolve_scale_broadcast(&ctx, &runtime_attr(), ArgId::DST).unwrap_err();
            assert_eq!(status(err), crate::Status::InvalidArguments);
        }
    }

    #[test]
    fn test_scale_scalar() {
        let stream = GpuStream::new();
        let ctx = ExecContext::new(&stream);
        assert_relative_eq!(
            *resolve_scale_scalar(&ctx, &AttributeSet::new(), ArgId::SRC).unwrap(),
            1.0
        );

        let attr = AttributeSet::new().with_scales(ArgId::SRC, 0);
        let scale = Memory::from_f32(&[1], vec![0.25]).unwrap();
        let ctx = ExecContext::new(&stream).with_arg(ArgKey::Scales(ArgId::SRC), &scale);
        let value = resolve_scale_scalar(&ctx, &attr, ArgId::SRC).unwrap();
        assert!(std::ptr::eq(value, &scale.as_f32_slice().unwrap()[0]));
    }

    #[test]
    fn test_scale_scalar_rejects_multiple_values() {
        let stream = GpuStream::new();
        let attr = AttributeSet::new().with_scales(ArgId::SRC, 0);
        let scales = Memory::from_f32(&[2], vec![0.25, 0.5]).unwrap();
        let ctx = ExecContext::new(&stream).with_arg(ArgKey::Scales(ArgId::SRC), &scales);
        assert!(resolve_scale_scalar(&ctx, &attr, ArgId::SRC).is_err());

        let ctx = ExecContext::new(&stream);
        assert!(resolve_scale_scalar(&ctx, &attr, ArgId::SRC).is_err());
    }

    #[test]
    fn test_zero_point_defaults() {
        let stream = GpuStream::new();
        let ctx = ExecContext::new(&stream);
        let attr = AttributeSet::new();
        assert_eq!(resolve_zero_point_scalar(&ctx, &attr, ArgId::SRC).unwrap(), 0);
        match resolve_zero_point_buffer(&ctx, &attr, ArgId::DST).unwrap() {
            ZeroPointBuffer::Default(slot) => assert_eq!(slot, &[0]),
            other => panic!("expected default slot, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_point_buffer_passes_memory_through() {
        let stream = GpuStream::new();
        // Not validated: a two-element f32 buffer is passed along untouched.
        let odd = Memory::from_f32(&[2], vec![1.0, 2.0]).unwrap();
        let ctx = ExecContext::new(&stream).with_arg(ArgKey::ZeroPoints(ArgId::DST), &odd);
        match resolve_zero_point_buffer(&ctx, &runtime_attr(), ArgId::DST).unwrap() {
            ZeroPointBuffer::Runtime(memory) => assert!(std::ptr::eq(memory, &odd)),
            other => panic!("expected runtime memory, got {:?}", other),
        }

        let empty = ExecContext::new(&stream);
        assert!(resolve_zero_point_buffer(&empty, &runtime_attr(), ArgId::DST).is_err());
    }

    #[test]
    fn test_zero_point_scalar_runtime() {
        let stream = GpuStream::new();
        let attr = AttributeSet::new().with_zero_points(ArgId::SRC, 0);
        let zp = Memory::from_i32(&[1], vec![-7]).unwrap();
        let ctx = ExecContext::new(&stream).with_arg(ArgKey::ZeroPoints(ArgId::SRC), &zp);
        assert_eq!(resolve_zero_point_scalar(&ctx, &attr, ArgId::SRC).unwrap(), -7);

        let wrong = Memory::from_storage(
            MemoryDesc::new(&[1], DType::S8, Layout::Plain),
            Storage::S8(vec![3]),
        )
        .unwrap();
        let ctx = ExecContext::new(&stream).with_arg(ArgKey::ZeroPoints(ArgId::SRC), &wrong);
        let err = resolve_zero_point_scalar(&ctx, &attr, ArgId::SRC).unwrap_err();
        assert_eq!(status(err), crate::Status::InvalidArguments);
    }
}
