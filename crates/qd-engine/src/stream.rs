use std::fmt::Debug;

use crate::error::Result;
use crate::kernel::{Kernel, KernelArgList, NdRange};

/// An in-order device queue.
///
/// `submit` returns once the launch is enqueued, not once it finishes;
/// ordering and completion are the queue's business.
pub trait Stream: Send + Sync + Debug {
    fn submit(&self, kernel: &Kernel, range: &NdRange, args: &KernelArgList<'_>) -> Result<()>;

    /// Blocks until every submitted launch has completed.
    fn wait(&self) -> Result<()>;
}
