use half::f16;

use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::memory_desc::{Layout, MemoryDesc};

/// Host-side typed storage behind a [`Memory`].
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    F32(Vec<f32>),
    F16(Vec<f16>),
    S32(Vec<i32>),
    S8(Vec<i8>),
    U8(Vec<u8>),
}

impl Storage {
    /// Zero-filled storage holding `n` elements of `dtype`.
    pub fn zeros(dtype: DType, n: usize) -> Self {
        match dtype {
            DType::F32 => Storage::F32(vec![0.0; n]),
            DType::F16 => Storage::F16(vec![f16::ZERO; n]),
            DType::S32 => Storage::S32(vec![0; n]),
            DType::S8 => Storage::S8(vec![0; n]),
            DType::U8 => Storage::U8(vec![0; n]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Storage::F32(v) => v.len(),
            Storage::F16(v) => v.len(),
            Storage::S32(v) => v.len(),
            Storage::S8(v) => v.len(),
            Storage::U8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DType {
        match self {
            Storage::F32(_) => DType::F32,
            Storage::F16(_) => DType::F16,
            Storage::S32(_) => DType::S32,
            Storage::S8(_) => DType::S8,
            Storage::U8(_) => DType::U8,
        }
    }

    pub fn size_in_bytes(&self) -> usize {
        self.len() * self.dtype().size_in_bytes()
    }

    /// Address of the first element, as a device would receive it.
    pub fn as_ptr(&self) -> *const u8 {
        match self {
            Storage::F32(v) => v.as_ptr().cast(),
            Storage::F16(v) => v.as_ptr().cast(),
            Storage::S32(v) => v.as_ptr().cast(),
            Storage::S8(v) => v.as_ptr().cast(),
            Storage::U8(v) => v.as_ptr(),
        }
    }
}

/// A memory handle: a descriptor plus the storage it describes.
///
/// Storage may be longer than `desc.nelems()` when the descriptor carries a
/// trailing compensation area or when the memory backs a scratchpad.
#[derive(Debug, Clone, PartialEq)]
pub struct Memory {
    desc: MemoryDesc,
    storage: Storage,
}

impl Memory {
    /// Zero-filled memory large enough for `desc`, compensation included.
    pub fn new(desc: MemoryDesc) -> Self {
        let elem = desc.dtype().size_in_bytes();
        let n = desc.size_in_bytes().div_ceil(elem);
        let storage = Storage::zeros(desc.dtype(), n);
        Memory { desc, storage }
    }

    /// Wraps existing storage, checking that it covers the descriptor.
    pub fn from_storage(desc: MemoryDesc, storage: Storage) -> Result<Self> {
        if storage.dtype() != desc.dtype() {
            return Err(TensorError::DTypeMismatch {
                expected: desc.dtype(),
                got: storage.dtype(),
            });
        }
        if storage.len() < desc.nelems() {
            return Err(TensorError::LengthMismatch {
                len: storage.len(),
                numel: desc.nelems(),
                dims: desc.dims().to_vec(),
            });
        }
        Ok(Memory { desc, storage })
    }

    /// Plain f32 memory with the given dims.
    pub fn from_f32(dims: &[usize], data: Vec<f32>) -> Result<Self> {
        Memory::from_storage(
            MemoryDesc::new(dims, DType::F32, Layout::Plain),
            Storage::F32(data),
        )
    }

    /// Plain s32 memory with the given dims.
    pub fn from_i32(dims: &[usize], data: Vec<i32>) -> Result<Self> {
        Memory::from_storage(
            MemoryDesc::new(dims, DType::S32, Layout::Plain),
            Storage::S32(data),
        )
    }

    /// Untyped byte buffer, the form scratchpads are allocated in.
    pub fn bytes(size: usize) -> Self {
        Memory {
            desc: MemoryDesc::vector(size, DType::U8),
            storage: Storage::U8(vec![0; size]),
        }
    }

    pub fn desc(&self) -> &MemoryDesc {
        &self.desc
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn dtype(&self) -> DType {
        self.desc.dtype()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.storage.size_in_bytes()
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.storage.as_ptr()
    }

    /// # Errors
    /// Returns `DTypeMismatch` if the storage is not F32.
    pub fn as_f32_slice(&self) -> Result<&[f32]> {
        match &self.storage {
            Storage::F32(v) => Ok(v),
            other => Err(TensorError::DTypeMismatch {
                expected: DType::F32,
                got: other.dtype(),
            }),
        }
    }

    /// # Errors
    /// Returns `DTypeMismatch` if the storage is not S32.
    pub fn as_i32_slice(&self) -> Result<&[i32]> {
        match &self.storage {
            Storage::S32(v) => Ok(v),
            other => Err(TensorError::DTypeMismatch {
                expected: DType::S32,
                got: other.dtype(),
            }),
        }
    }
}
