//! Scratchpad planning.
//!
//! A primitive descriptor books every auxiliary buffer it needs while it is
//! created. The registry is then read by whoever allocates memory for the
//! execution graph: one allocation of [`ScratchpadRegistry::size`] bytes is
//! bound to each execution and carved into regions by a
//! [`ScratchpadGrantor`].

use std::fmt;

use qd_tensor::Memory;

use crate::error::{PrimitiveError, Result};

/// Names of scratchpad regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScratchpadKey {
    /// Intermediate f32 copy of RNN weights in the destination order.
    ReorderRnnSpace,
}

impl fmt::Display for ScratchpadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScratchpadKey::ReorderRnnSpace => write!(f, "reorder_rnn_space"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchpadEntry {
    pub key: ScratchpadKey,
    /// Region size in bytes.
    pub size: usize,
    pub element_size: usize,
    pub alignment: usize,
    /// Start of the reserved span; the region begins at the first aligned
    /// address inside it.
    pub offset: usize,
}

/// Workspace requirements of one primitive descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScratchpadRegistry {
    entries: Vec<ScratchpadEntry>,
    size: usize,
}

impl ScratchpadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registrar(&mut self) -> Registrar<'_> {
        Registrar { registry: self }
    }

    pub fn get(&self, key: ScratchpadKey) -> Option<&ScratchpadEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn entries(&self) -> &[ScratchpadEntry] {
        &self.entries
    }

    /// Total bytes an execution must bind.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Booking handle over a registry.
pub struct Registrar<'a> {
    registry: &'a mut ScratchpadRegistry,
}

impl Registrar<'_> {
    /// Books `count` elements of `element_size` bytes under `key`.
    ///
    /// Booking the same key again with an identical request is a no-op.
    ///
    /// # Errors
    /// Fails with `Runtime` if the key is already booked with a different
    /// request, or if `alignment` is not a power of two. Fails with
    /// `InvalidArguments` if the request does not fit in the address space.
    pub fn book(
        &mut self,
        key: ScratchpadKey,
        count: usize,
        element_size: usize,
        alignment: usize,
    ) -> Result<()> {
        if !alignment.is_power_of_two() {
            return Err(PrimitiveError::Runtime(format!(
                "scratchpad {}: alignment {} is not a power of two",
                key, alignment
            )));
        }
        let overflow = || {
            PrimitiveError::InvalidArguments(format!(
                "scratchpad {}: {} x {} bytes overflows the address space",
                key, count, element_size
            ))
        };
        let size = count.checked_mul(element_size).ok_or_else(overflow)?;
        if let Some(existing) = self.registry.get(key) {
            if existing.size == size
                && existing.element_size == element_size
                && existing.alignment == alignment
            {
                return Ok(());
            }
            return Err(PrimitiveError::Runtime(format!(
                "scratchpad {} already booked with {} bytes, refusing {} bytes",
                key, existing.size, size
            )));
        }

        // Reserve alignment slack so the region can start on a boundary.
        let total = size
            .checked_add(alignment)
            .and_then(|capacity| self.registry.size.checked_add(capacity))
            .ok_or_else(overflow)?;
        let entry = ScratchpadEntry {
            key,
            size,
            element_size,
            alignment,
            offset: self.registry.size,
        };
        log::debug!(
            "booked scratchpad {}: {} bytes ({} x {}) aligned to {}",
            key,
            size,
            count,
            element_size,
            alignment
        );
        self.registry.size = total;
        self.registry.entries.push(entry);
        Ok(())
    }
}

/// A granted scratchpad region.
#[derive(Debug, Clone, Copy)]
pub struct ScratchpadRegion<'a> {
    pub memory: &'a Memory,
    /// Byte offset of the aligned region inside `memory`.
    pub offset: usize,
    pub size: usize,
}

/// Hands out the regions of a registry from the scratchpad bound to one
/// execution.
#[derive(Debug, Clone, Copy)]
pub struct ScratchpadGrantor<'a> {
    registry: &'a ScratchpadRegistry,
    memory: Option<&'a Memory>,
}

impl<'a> ScratchpadGrantor<'a> {
    /// # Errors
    /// Fails with `InvalidArguments` when the registry is non-empty and no
    /// scratchpad, or one smaller than the plan, is bound.
    pub fn new(registry: &'a ScratchpadRegistry, memory: Option<&'a Memory>) -> Result<Self> {
        if !registry.is_empty() {
            match memory {
                None => {
                    return Err(PrimitiveError::InvalidArguments(format!(
                        "scratchpad of {} bytes required but none bound",
                        registry.size()
                    )))
                }
                Some(m) if m.size_in_bytes() < registry.size() => {
                    return Err(PrimitiveError::InvalidArguments(format!(
                        "scratchpad holds {} bytes, {} required",
                        m.size_in_bytes(),
                        registry.size()
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(ScratchpadGrantor { registry, memory })
    }

    pub fn get(&self, key: ScratchpadKey) -> Option<ScratchpadRegion<'a>> {
        let entry = self.registry.get(key)?;
        let memory = self.memory?;
        let base = memory.as_ptr() as usize;
        let start = base + entry.offset;
        let aligned = (start + entry.alignment - 1) & !(entry.alignment - 1);
        Some(ScratchpadRegion {
            memory,
            offset: aligned - base,
            size: entry.size,
        })
    }
}
