use std::fmt;

/// Element types a memory object can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DType {
    /// 32-bit floating point.
    F32,
    /// 16-bit floating point (IEEE 754 half-precision, via the `half` crate).
    F16,
    /// 32-bit signed integer. Used for zero points and accumulators.
    S32,
    /// 8-bit signed integer (symmetric quantization).
    S8,
    /// 8-bit unsigned integer (asymmetric quantization).
    U8,
}

impl DType {
    /// Returns the size in bytes of a single element.
    ///
    /// - F32, S32: 4 bytes
    /// - F16: 2 bytes (using `half::f16`)
    /// - S8, U8: 1 byte
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::F32 | DType::S32 => 4,
            DType::F16 => 2,
            DType::S8 | DType::U8 => 1,
        }
    }

    /// Returns true for floating point types.
    pub fn is_float(&self) -> bool {
        matches!(self, DType::F32 | DType::F16)
    }

    /// Short upper-case tag, used when building kernel defines.
    pub fn tag(&self) -> &'static str {
        match self {
            DType::F32 => "F32",
            DType::F16 => "F16",
            DType::S32 => "S32",
            DType::S8 => "S8",
            DType::U8 => "U8",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F32 => write!(f, "f32"),
            DType::F16 => write!(f, "f16"),
            DType::S32 => write!(f, "s32"),
            DType::S8 => write!(f, "s8"),
            DType::U8 => write!(f, "u8"),
        }
    }
}
