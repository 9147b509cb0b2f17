use std::fmt;

/// Optional device capabilities an engine can be queried for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceExt {
    /// Lock-step execution across a sub-group of work-items.
    IntelSubgroups,
    /// Sub-group block reads and writes on 16-bit data.
    IntelSubgroupsShort,
    /// Half-precision arithmetic.
    KhrFp16,
    /// Double-precision arithmetic.
    KhrFp64,
}

impl DeviceExt {
    pub const ALL: [DeviceExt; 4] = [
        DeviceExt::IntelSubgroups,
        DeviceExt::IntelSubgroupsShort,
        DeviceExt::KhrFp16,
        DeviceExt::KhrFp64,
    ];

    /// The extension string a device advertises for this capability.
    pub fn name(&self) -> &'static str {
        match self {
            DeviceExt::IntelSubgroups => "cl_intel_subgroups",
            DeviceExt::IntelSubgroupsShort => "cl_intel_subgroups_short",
            DeviceExt::KhrFp16 => "cl_khr_fp16",
            DeviceExt::KhrFp64 => "cl_khr_fp64",
        }
    }

    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

impl fmt::Display for DeviceExt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of device extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceExtSet {
    bits: u32,
}

impl DeviceExtSet {
    pub const fn empty() -> Self {
        DeviceExtSet { bits: 0 }
    }

    pub fn all() -> Self {
        DeviceExtSet::from_exts(&DeviceExt::ALL)
    }

    pub fn from_exts(exts: &[DeviceExt]) -> Self {
        let mut set = DeviceExtSet::empty();
        for ext in exts {
            set.insert(*ext);
        }
        set
    }

    pub fn insert(&mut self, ext: DeviceExt) {
        self.bits |= ext.bit();
    }

    pub fn contains(&self, ext: DeviceExt) -> bool {
        self.bits & ext.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = DeviceExt> + '_ {
        DeviceExt::ALL.into_iter().filter(|ext| self.contains(*ext))
    }
}
