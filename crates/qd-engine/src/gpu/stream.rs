use std::sync::{Mutex, PoisonError};

use qd_tensor::DType;

use crate::error::{EngineError, Result};
use crate::kernel::{Kernel, KernelArg, KernelArgList, NdRange};
use crate::stream::Stream;

/// Owned snapshot of one kernel argument, taken at submission time.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgRecord {
    Buffer {
        dtype: DType,
        offset: usize,
        size: usize,
    },
    F32(f32),
    I32(i32),
    F32Values(Vec<f32>),
    I32Values(Vec<i32>),
}

/// A kernel launch as the device queue received it.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub kernel_id: u64,
    pub kernel_name: String,
    pub build_options: String,
    pub range: NdRange,
    pub args: Vec<ArgRecord>,
}

impl Submission {
    pub fn arg(&self, index: usize) -> Option<&ArgRecord> {
        self.args.get(index)
    }
}

#[derive(Debug, Default)]
struct Queue {
    pending: Vec<Submission>,
    completed: Vec<Submission>,
}

/// In-order queue of the reference accelerator.
///
/// Arguments are validated and snapshotted at submission; `wait` retires
/// everything pending.
#[derive(Debug, Default)]
pub struct GpuStream {
    queue: Mutex<Queue>,
}

impl GpuStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Every launch retired by `wait` and not yet taken, oldest first.
    pub fn completed(&self) -> Vec<Submission> {
        self.lock().completed.clone()
    }

    /// Removes and returns the retired launches, oldest first.
    pub fn take_completed(&self) -> Vec<Submission> {
        std::mem::take(&mut self.lock().completed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn record(index: usize, arg: &KernelArg<'_>) -> Result<ArgRecord> {
    let rec = match *arg {
        KernelArg::Memory(memory) => ArgRecord::Buffer {
            dtype: memory.dtype(),
            offset: 0,
            size: memory.size_in_bytes(),
        },
        KernelArg::SubMemory {
            memory,
            offset,
            size,
        } => {
            let end = offset.checked_add(size);
            if end.map_or(true, |end| end > memory.size_in_bytes()) {
                return Err(EngineError::Submission(format!(
                    "argument {}: region [{}, +{}) exceeds buffer of {} bytes",
                    index,
                    offset,
                    size,
                    memory.size_in_bytes()
                )));
            }
            ArgRecord::Buffer {
                dtype: memory.dtype(),
                offset,
                size,
            }
        }
        KernelArg::F32(v) => ArgRecord::F32(v),
        KernelArg::I32(v) => ArgRecord::I32(v),
        KernelArg::F32Slice(values) => ArgRecord::F32Values(values.to_vec()),
        KernelArg::I32Slice(values) => ArgRecord::I32Values(values.to_vec()),
    };
    Ok(rec)
}

impl Stream for GpuStream {
    fn submit(&self, kernel: &Kernel, range: &NdRange, args: &KernelArgList<'_>) -> Result<()> {
        if range.work_items() == 0 {
            return Err(EngineError::Submission(format!(
                "empty launch range {:?} for {}",
                range.global,
                kernel.name()
            )));
        }
        let args = args
            .complete()?
            .iter()
            .enumerate()
            .map(|(i, arg)| record(i, arg))
            .collect::<Result<Vec<_>>>()?;

        log::trace!(
            "enqueue {} (kernel #{}) gws={:?} with {} args",
            kernel.name(),
            kernel.id(),
            range.global,
            args.len()
        );
        self.lock().pending.push(Submission {
            kernel_id: kernel.id(),
            kernel_name: kernel.name().to_string(),
            build_options: kernel.build_options().to_string(),
            range: *range,
            args,
        });
        Ok(())
    }

    fn wait(&self) -> Result<()> {
        let mut queue = self.lock();
        let retired = std::mem::take(&mut queue.pending);
        queue.completed.extend(retired);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qd_tensor::Memory;

    fn kernel() -> Kernel {
        Kernel::new(7, "wei_reorder", "-DNDIMS=5".into())
    }

    #[test]
    fn test_submit_then_wait() {
        let stream = GpuStream::new();
        let mem = Memory::from_f32(&[4], vec![0.0; 4]).unwrap();
        let lanes = [2.5f32; 16];
        let mut args = KernelArgList::new();
        args.set(0, KernelArg::Memory(&mem));
        args.set(1, KernelArg::F32Slice(&lanes));
        args.set(2, KernelArg::I32(3));

        stream.submit(&kernel(), &NdRange::new([1, 1, 4]), &args).unwrap();
        assert_eq!(stream.pending(), 1);
        assert!(stream.completed().is_empty());

        stream.wait().unwrap();
        assert_eq!(stream.pending(), 0);
        let done = stream.completed();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].kernel_id, 7);
        assert_eq!(
            done[0].arg(0),
            Some(&ArgRecord::Buffer {
                dtype: DType::F32,
                offset: 0,
                size: 16
            })
        );
        assert_eq!(done[0].arg(1), Some(&ArgRecord::F32Values(vec![2.5; 16])));
    }

    #[test]
    fn test_take_completed_drains() {
        let stream = GpuStream::new();
        let args = {
            let mut args = KernelArgList::new();
            args.set(0, KernelArg::I32(1));
            args
        };
        for _ in 0..3 {
            stream.submit(&kernel(), &NdRange::new([1, 1, 1]), &args).unwrap();
        }
        stream.wait().unwrap();

        assert_eq!(stream.take_completed().len(), 3);
        assert!(stream.completed().is_empty());
        assert!(stream.take_completed().is_empty());

        stream.submit(&kernel(), &NdRange::new([1, 1, 1]), &args).unwrap();
        stream.wait().unwrap();
        assert_eq!(stream.take_completed().len(), 1);
    }

    #[test]
    fn test_sub_memory_out_of_bounds() {
        let stream = GpuStream::new();
        let scratch = Memory::bytes(64);
        let mut args = KernelArgList::new();
        args.set(
            0,
            KernelArg::SubMemory {
                memory: &scratch,
                offset: 32,
                size: 64,
            },
        );
        let err = stream
            .submit(&kernel(), &NdRange::new([1, 1, 1]), &args)
            .unwrap_err();
        assert!(matches!(err, EngineError::Submission(_)));
        assert_eq!(stream.pending(), 0);
    }

    #[test]
    fn test_empty_range_rejected() {
        let stream = GpuStream::new();
        let args = KernelArgList::new();
        assert!(stream.submit(&kernel(), &NdRange::new([0, 1, 1]), &args).is_err());
    }
}
