use std::fmt;

use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::shape::Shape;

/// Physical layout of a memory object.
///
/// The RNN weight layouts name their dimensions in storage order:
/// `l` layers, `d` directions, `i` input channels, `g` gates, `o` output
/// channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Layout not determined yet; a primitive must pick one before use.
    Any,
    /// Plain 1-D or dense row-major layout for auxiliary buffers.
    Plain,
    Ldigo,
    Ldgoi,
    Ldio,
    Ldoi,
}

impl Layout {
    /// Rank a descriptor must have to use this layout, if fixed.
    pub fn rank(&self) -> Option<usize> {
        match self {
            Layout::Any | Layout::Plain => None,
            Layout::Ldigo | Layout::Ldgoi => Some(5),
            Layout::Ldio | Layout::Ldoi => Some(4),
        }
    }

    /// True for the layouts RNN weights can be stored in.
    pub fn is_rnn_weights(&self) -> bool {
        self.rank().is_some()
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Layout::Any => "any",
            Layout::Plain => "plain",
            Layout::Ldigo => "ldigo",
            Layout::Ldgoi => "ldgoi",
            Layout::Ldio => "ldio",
            Layout::Ldoi => "ldoi",
        };
        f.write_str(name)
    }
}

/// Semantic markers carried in a descriptor's extra flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtraFlag {
    /// Weights carry precomputed compensation for u8 data and s8 weights.
    RnnU8S8Compensation,
    /// Weights carry precomputed compensation for s8 data and s8 weights.
    RnnS8S8Compensation,
    /// Quantization scales were adjusted to avoid saturation.
    ScaleAdjust,
}

impl ExtraFlag {
    fn bit(self) -> u32 {
        match self {
            ExtraFlag::RnnU8S8Compensation => 1 << 0,
            ExtraFlag::RnnS8S8Compensation => 1 << 1,
            ExtraFlag::ScaleAdjust => 1 << 2,
        }
    }
}

/// Set of [`ExtraFlag`] markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExtraFlags {
    bits: u32,
}

impl ExtraFlags {
    pub const fn empty() -> Self {
        ExtraFlags { bits: 0 }
    }

    pub fn from_flags(flags: &[ExtraFlag]) -> Self {
        let mut set = ExtraFlags::empty();
        for flag in flags {
            set.insert(*flag);
        }
        set
    }

    pub fn insert(&mut self, flag: ExtraFlag) {
        self.bits |= flag.bit();
    }

    pub fn contains(&self, flag: ExtraFlag) -> bool {
        self.bits & flag.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// True when any RNN compensation marker is present.
    pub fn has_rnn_compensation(&self) -> bool {
        self.contains(ExtraFlag::RnnU8S8Compensation)
            || self.contains(ExtraFlag::RnnS8S8Compensation)
    }

    /// Asymmetric and symmetric compensation cannot be requested together.
    pub fn has_conflicting_compensation(&self) -> bool {
        self.contains(ExtraFlag::RnnU8S8Compensation)
            && self.contains(ExtraFlag::RnnS8S8Compensation)
    }
}

impl From<ExtraFlag> for ExtraFlags {
    fn from(flag: ExtraFlag) -> Self {
        ExtraFlags::from_flags(&[flag])
    }
}

/// Immutable description of a memory object: shape, element type, layout
/// and extra flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoryDesc {
    shape: Shape,
    dtype: DType,
    layout: Layout,
    extra: ExtraFlags,
}

impl MemoryDesc {
    pub fn new(dims: &[usize], dtype: DType, layout: Layout) -> Self {
        MemoryDesc {
            shape: Shape::from_slice(dims),
            dtype,
            layout,
            extra: ExtraFlags::empty(),
        }
    }

    /// A rank-1 plain descriptor, the shape runtime quantization
    /// parameters are passed in.
    pub fn vector(len: usize, dtype: DType) -> Self {
        MemoryDesc::new(&[len], dtype, Layout::Plain)
    }

    pub fn with_extra_flags(mut self, extra: ExtraFlags) -> Self {
        self.extra = extra;
        self
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn ndims(&self) -> usize {
        self.shape.ndim()
    }

    pub fn nelems(&self) -> usize {
        self.shape.numel()
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn extra(&self) -> ExtraFlags {
        self.extra
    }

    /// Checks that the rank matches the layout's fixed rank, if it has one.
    pub fn validate_layout(&self) -> Result<()> {
        match self.layout.rank() {
            Some(expected) if expected != self.ndims() => Err(TensorError::LayoutRank {
                layout: self.layout.to_string(),
                expected,
                got: self.ndims(),
            }),
            _ => Ok(()),
        }
    }

    /// Number of f32 compensation values appended after the weights when a
    /// compensation marker is set: one per (layer, direction, gate, output)
    /// for rank 5, per (layer, direction, output) for rank 4.
    pub fn compensation_count(&self) -> usize {
        self.checked_compensation_count().unwrap_or(usize::MAX)
    }

    fn checked_compensation_count(&self) -> Option<usize> {
        if !self.extra.has_rnn_compensation() {
            return Some(0);
        }
        let dims = self.dims();
        let counted = match (self.layout.rank(), dims) {
            (Some(5), [l, d, _, g, o]) => Shape::from_slice(&[*l, *d, *g, *o]),
            (Some(4), [l, d, _, o]) => Shape::from_slice(&[*l, *d, *o]),
            _ => return Some(0),
        };
        counted.checked_numel()
    }

    /// Bytes needed to hold the data plus any compensation area, or `None`
    /// if that does not fit in `usize`.
    pub fn checked_size_in_bytes(&self) -> Option<usize> {
        let data = self
            .shape
            .checked_numel()?
            .checked_mul(self.dtype.size_in_bytes())?;
        let compensation = self
            .checked_compensation_count()?
            .checked_mul(DType::F32.size_in_bytes())?;
        data.checked_add(compensation)
    }

    /// Bytes needed to hold the data plus any compensation area, saturating
    /// at `usize::MAX`.
    pub fn size_in_bytes(&self) -> usize {
        self.checked_size_in_bytes().unwrap_or(usize::MAX)
    }
}

impl fmt::Display for MemoryDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.dtype, self.layout, self.shape)
    }
}
