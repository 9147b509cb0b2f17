use std::collections::{BTreeMap, BTreeSet};

use qd_tensor::Memory;

use crate::error::{EngineError, Result};
use crate::feature::DeviceExt;

/// Compile-time configuration of a device kernel: compiler options,
/// preprocessor defines and the device extensions the program needs.
///
/// Defines are kept sorted so that the rendered build options depend only
/// on the content, never on insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KernelCtx {
    options: Vec<String>,
    defines: BTreeMap<String, i64>,
    required: BTreeSet<DeviceExt>,
}

impl KernelCtx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_option(&mut self, option: &str) {
        if !self.options.iter().any(|o| o == option) {
            self.options.push(option.to_string());
        }
    }

    pub fn define_int(&mut self, name: &str, value: i64) {
        self.defines.insert(name.to_string(), value);
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.defines.get(name).copied()
    }

    pub fn require(&mut self, ext: DeviceExt) {
        self.required.insert(ext);
    }

    pub fn required_extensions(&self) -> impl Iterator<Item = DeviceExt> + '_ {
        self.required.iter().copied()
    }

    /// Renders the options followed by `-DNAME=value` for every define.
    pub fn build_options(&self) -> String {
        let mut out = self.options.join(" ");
        for (name, value) in &self.defines {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&format!("-D{}={}", name, value));
        }
        out
    }
}

/// A compiled device program entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kernel {
    id: u64,
    name: String,
    build_options: String,
}

impl Kernel {
    pub fn new(id: u64, name: &str, build_options: String) -> Self {
        Kernel {
            id,
            name: name.to_string(),
            build_options,
        }
    }

    /// Engine-unique id; kernels served from a cache share it.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn build_options(&self) -> &str {
        &self.build_options
    }
}

/// Launch geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NdRange {
    pub global: [usize; 3],
    pub local: Option<[usize; 3]>,
}

impl NdRange {
    pub fn new(global: [usize; 3]) -> Self {
        NdRange {
            global,
            local: None,
        }
    }

    pub fn with_local(mut self, local: [usize; 3]) -> Self {
        self.local = Some(local);
        self
    }

    pub fn work_items(&self) -> usize {
        self.global.iter().product()
    }
}

/// One kernel argument. Memory arguments are borrowed for the duration of
/// the submission; host values are copied by the stream.
#[derive(Debug, Clone, Copy)]
pub enum KernelArg<'a> {
    Memory(&'a Memory),
    SubMemory {
        memory: &'a Memory,
        offset: usize,
        size: usize,
    },
    F32(f32),
    I32(i32),
    F32Slice(&'a [f32]),
    I32Slice(&'a [i32]),
}

/// Positional kernel arguments.
#[derive(Debug, Clone, Default)]
pub struct KernelArgList<'a> {
    args: Vec<Option<KernelArg<'a>>>,
}

impl<'a> KernelArgList<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, index: usize, arg: KernelArg<'a>) {
        if self.args.len() <= index {
            self.args.resize(index + 1, None);
        }
        self.args[index] = Some(arg);
    }

    pub fn get(&self, index: usize) -> Option<&KernelArg<'a>> {
        self.args.get(index).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// All arguments in slot order.
    ///
    /// # Errors
    /// Fails if any slot below the highest set index was left empty.
    pub fn complete(&self) -> Result<Vec<KernelArg<'a>>> {
        self.args
            .iter()
            .enumerate()
            .map(|(i, arg)| {
                (*arg).ok_or_else(|| {
                    EngineError::Submission(format!("kernel argument {} not set", i))
                })
            })
            .collect()
    }
}
