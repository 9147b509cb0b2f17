use std::fmt;

/// Integer identifier of a primitive argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArgId(pub u32);

impl ArgId {
    pub const SRC: ArgId = ArgId(1);
    pub const FROM: ArgId = ArgId::SRC;
    pub const DST: ArgId = ArgId(17);
    pub const TO: ArgId = ArgId::DST;
    pub const SCRATCHPAD: ArgId = ArgId(80);
}

impl fmt::Display for ArgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ArgId::SRC => write!(f, "src"),
            ArgId::DST => write!(f, "dst"),
            ArgId::SCRATCHPAD => write!(f, "scratchpad"),
            ArgId(id) => write!(f, "arg{}", id),
        }
    }
}

/// Tag or-ed into an argument id to address its runtime scales.
pub const ARG_ATTR_SCALES: u32 = 4096;
/// Tag or-ed into an argument id to address its runtime zero points.
pub const ARG_ATTR_ZERO_POINTS: u32 = 8192;

const ATTR_MASK: u32 = ARG_ATTR_SCALES | ARG_ATTR_ZERO_POINTS;

/// Key under which memory is bound in an execution context: an argument
/// itself, or one of its quantization attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArgKey {
    Mem(ArgId),
    Scales(ArgId),
    ZeroPoints(ArgId),
}

impl ArgKey {
    pub fn arg(&self) -> ArgId {
        match *self {
            ArgKey::Mem(arg) | ArgKey::Scales(arg) | ArgKey::ZeroPoints(arg) => arg,
        }
    }

    /// Integer encoding used at the C boundary.
    pub fn raw(&self) -> u32 {
        match *self {
            ArgKey::Mem(ArgId(id)) => id,
            ArgKey::Scales(ArgId(id)) => ARG_ATTR_SCALES | id,
            ArgKey::ZeroPoints(ArgId(id)) => ARG_ATTR_ZERO_POINTS | id,
        }
    }

    /// Decodes a raw identifier. Both attribute tags at once is not a valid key.
    pub fn from_raw(raw: u32) -> Option<ArgKey> {
        let id = ArgId(raw & !ATTR_MASK);
        match raw & ATTR_MASK {
            0 => Some(ArgKey::Mem(id)),
            ARG_ATTR_SCALES => Some(ArgKey::Scales(id)),
            ARG_ATTR_ZERO_POINTS => Some(ArgKey::ZeroPoints(id)),
            _ => None,
        }
    }
}

impl fmt::Display for ArgKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgKey::Mem(arg) => write!(f, "{}", arg),
            ArgKey::Scales(arg) => write!(f, "scales:{}", arg),
            ArgKey::ZeroPoints(arg) => write!(f, "zero_points:{}", arg),
        }
    }
}
