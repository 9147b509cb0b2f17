use std::fmt::Display;

use crate::error::Result;
use crate::exec_ctx::ExecContext;

/// An initialized primitive: immutable after creation, shareable across
/// threads, executed once per call with a fresh context.
pub trait Primitive: Send + Sync {
    /// Implementation name, e.g. "cross_engine::rnn".
    fn name(&self) -> &'static str;

    /// Submits the primitive's work to the context's stream. Returns once
    /// the submission is accepted; completion is tracked by the stream.
    fn execute(&self, ctx: &ExecContext<'_>) -> Result<()>;
}

/// Emits a `qd_verbose` line when `enabled`.
pub(crate) fn verbose(enabled: bool, phase: &str, impl_name: &str, details: impl Display) {
    if enabled {
        log::info!("qd_verbose,{},{},{}", phase, impl_name, details);
    }
}
