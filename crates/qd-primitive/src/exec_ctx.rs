use std::collections::HashMap;

use qd_engine::Stream;
use qd_tensor::Memory;

use crate::arg::{ArgId, ArgKey};
use crate::error::Result;
use crate::scratchpad::{ScratchpadGrantor, ScratchpadRegistry};

/// Everything one execution of a primitive needs: bound memory, the queue
/// to submit to, and the scratchpad allocation.
///
/// Contexts are built per call and borrowed by the primitive; nothing in
/// them outlives the call.
#[derive(Debug)]
pub struct ExecContext<'a> {
    args: HashMap<ArgKey, &'a Memory>,
    stream: &'a dyn Stream,
}

impl<'a> ExecContext<'a> {
    pub fn new(stream: &'a dyn Stream) -> Self {
        ExecContext {
            args: HashMap::new(),
            stream,
        }
    }

    /// Binds `memory` under `key`, replacing any previous binding.
    pub fn with_arg(mut self, key: ArgKey, memory: &'a Memory) -> Self {
        self.args.insert(key, memory);
        self
    }

    /// Binds the scratchpad allocation for this execution.
    pub fn with_scratchpad(self, memory: &'a Memory) -> Self {
        self.with_arg(ArgKey::Mem(ArgId::SCRATCHPAD), memory)
    }

    /// Memory bound under `key`. Absence is a normal state; callers decide
    /// whether it is an error.
    pub fn memory(&self, key: ArgKey) -> Option<&'a Memory> {
        self.args.get(&key).copied()
    }

    pub fn stream(&self) -> &'a dyn Stream {
        self.stream
    }

    /// Grantor over this execution's scratchpad for the given plan.
    pub fn scratchpad_grantor(
        &self,
        registry: &'a ScratchpadRegistry,
    ) -> Result<ScratchpadGrantor<'a>> {
        ScratchpadGrantor::new(registry, self.memory(ArgKey::Mem(ArgId::SCRATCHPAD)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qd_engine::GpuStream;

    #[test]
    fn test_bindings() {
        let stream = GpuStream::new();
        let src = Memory::from_f32(&[2], vec![1.0, 2.0]).unwrap();
        let scale = Memory::from_f32(&[1], vec![0.5]).unwrap();
        let ctx = ExecContext::new(&stream)
            .with_arg(ArgKey::Mem(ArgId::SRC), &src)
            .with_arg(ArgKey::Scales(ArgId::DST), &scale);

        assert!(ctx.memory(ArgKey::Mem(ArgId::SRC)).is_some());
        assert!(ctx.memory(ArgKey::Mem(ArgId::DST)).is_none());
        assert!(ctx.memory(ArgKey::Scales(ArgId::SRC)).is_none());
        assert_eq!(
            ctx.memory(ArgKey::Scales(ArgId::DST)).map(|m| m.desc().dims().to_vec()),
            Some(vec![1])
        );
    }

    #[test]
    fn test_scratchpad_binding() {
        let stream = GpuStream::new();
        let registry = ScratchpadRegistry::new();
        let ctx = ExecContext::new(&stream);
        assert!(ctx.scratchpad_grantor(&registry).is_ok());

        let scratch = Memory::bytes(256);
        let ctx = ctx.with_scratchpad(&scratch);
        assert!(ctx.memory(ArgKey::Mem(ArgId::SCRATCHPAD)).is_some());
    }
}
