use std::collections::BTreeMap;

use crate::arg::ArgId;

/// Scaling configuration of one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScaleAttr {
    /// No scaling: every value is 1.0.
    #[default]
    Default,
    /// Scales are supplied at execution time. `mask` selects the dimensions
    /// with distinct values; 0 means one value for the whole tensor.
    Runtime { mask: u32 },
}

/// Zero-point configuration of one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ZeroPointAttr {
    /// No offset: the zero point is 0.
    #[default]
    Default,
    Runtime { mask: u32 },
}

impl ScaleAttr {
    pub fn is_default(&self) -> bool {
        matches!(self, ScaleAttr::Default)
    }

    pub fn mask(&self) -> u32 {
        match self {
            ScaleAttr::Default => 0,
            ScaleAttr::Runtime { mask } => *mask,
        }
    }
}

impl ZeroPointAttr {
    pub fn is_default(&self) -> bool {
        matches!(self, ZeroPointAttr::Default)
    }

    pub fn mask(&self) -> u32 {
        match self {
            ZeroPointAttr::Default => 0,
            ZeroPointAttr::Runtime { mask } => *mask,
        }
    }
}

/// Per-argument quantization attributes attached to a primitive at creation.
///
/// Arguments without an entry have default (identity) attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttributeSet {
    scales: BTreeMap<ArgId, ScaleAttr>,
    zero_points: BTreeMap<ArgId, ZeroPointAttr>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `arg` as taking runtime scales with the given mask.
    pub fn with_scales(mut self, arg: ArgId, mask: u32) -> Self {
        self.scales.insert(arg, ScaleAttr::Runtime { mask });
        self
    }

    /// Marks `arg` as taking runtime zero points with the given mask.
    pub fn with_zero_points(mut self, arg: ArgId, mask: u32) -> Self {
        self.zero_points.insert(arg, ZeroPointAttr::Runtime { mask });
        self
    }

    pub fn scales(&self, arg: ArgId) -> ScaleAttr {
        self.scales.get(&arg).copied().unwrap_or_default()
    }

    pub fn zero_points(&self, arg: ArgId) -> ZeroPointAttr {
        self.zero_points.get(&arg).copied().unwrap_or_default()
    }

    pub fn has_default_values(&self) -> bool {
        self.scales.values().all(ScaleAttr::is_default)
            && self.zero_points.values().all(ZeroPointAttr::is_default)
    }
}
