use std::mem::size_of;

use qd_engine::{DeviceExt, Engine, EngineKind, KernelCtx};
use qd_tensor::{DType, MemoryDesc};

use crate::attr::AttributeSet;
use crate::error::{PrimitiveError, Result};
use crate::primitive::verbose;
use crate::reorder::conf::RnnReorderConf;
use crate::scratchpad::{ScratchpadKey, ScratchpadRegistry};

pub const IMPL_NAME: &str = "cross_engine::rnn";

/// Lifecycle of a descriptor under negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdState {
    Uninitialized,
    Validating,
    Configured,
    Ready,
    Rejected,
}

struct Negotiation {
    state: PdState,
}

impl Negotiation {
    fn new() -> Self {
        Negotiation {
            state: PdState::Uninitialized,
        }
    }

    fn advance(&mut self, next: PdState) {
        log::debug!("{}: {:?} -> {:?}", IMPL_NAME, self.state, next);
        self.state = next;
    }

    fn reject(&mut self, err: PrimitiveError) -> PrimitiveError {
        log::debug!("{}: rejected in {:?}: {}", IMPL_NAME, self.state, err);
        self.state = PdState::Rejected;
        err
    }
}

/// Descriptor of the cross-engine RNN weights reorder.
///
/// Created once; every check runs in [`RnnWeightsReorderPd::create`] and the
/// result is never re-validated. Executions share it read-only.
#[derive(Debug, Clone)]
pub struct RnnWeightsReorderPd {
    src_md: MemoryDesc,
    dst_md: MemoryDesc,
    attr: AttributeSet,
    conf: RnnReorderConf,
    scratchpad: ScratchpadRegistry,
    state: PdState,
    verbose: bool,
}

/// Compensation markers: asymmetric and symmetric are mutually exclusive.
fn check_compensation(dst_md: &MemoryDesc) -> Result<()> {
    if dst_md.extra().has_conflicting_compensation() {
        return Err(PrimitiveError::Unimplemented(
            "destination requests both u8s8 and s8s8 compensation".to_string(),
        ));
    }
    Ok(())
}

fn check_engines(src_engine: &dyn Engine, dst_engine: &dyn Engine) -> Result<()> {
    let src_ok = matches!(src_engine.kind(), EngineKind::Cpu | EngineKind::Gpu);
    let dst_ok = dst_engine.kind() == EngineKind::Gpu;
    if !src_ok || !dst_ok {
        return Err(PrimitiveError::Unimplemented(format!(
            "engine pair {} -> {} not supported",
            src_engine.kind(),
            dst_engine.kind()
        )));
    }
    Ok(())
}

fn check_features(
    dst_engine: &dyn Engine,
    src_md: &MemoryDesc,
    dst_md: &MemoryDesc,
) -> Result<()> {
    let mut required = vec![DeviceExt::IntelSubgroups];
    if src_md.dtype() == DType::F16 || dst_md.dtype() == DType::F16 {
        required.extend([DeviceExt::KhrFp16, DeviceExt::IntelSubgroupsShort]);
    }
    match required.into_iter().find(|ext| !dst_engine.mayiuse(*ext)) {
        Some(missing) => Err(PrimitiveError::Unimplemented(format!(
            "{} lacks {}",
            dst_engine.name(),
            missing
        ))),
        None => Ok(()),
    }
}

impl RnnWeightsReorderPd {
    /// Negotiates a reorder of `src_md` on `src_engine` into `dst_md` on
    /// `dst_engine`.
    ///
    /// Checks run in order and the first failure wins: compensation markers,
    /// engine pairing, device features, then the derived configuration.
    /// On success the scratchpad is booked when values must be staged.
    pub fn create(
        src_engine: &dyn Engine,
        dst_engine: &dyn Engine,
        src_md: &MemoryDesc,
        dst_md: &MemoryDesc,
        attr: &AttributeSet,
    ) -> Result<Self> {
        let mut negotiation = Negotiation::new();
        negotiation.advance(PdState::Validating);

        check_compensation(dst_md)
            .and_then(|_| check_engines(src_engine, dst_engine))
            .and_then(|_| check_features(dst_engine, src_md, dst_md))
            .map_err(|e| negotiation.reject(e))?;

        let conf =
            RnnReorderConf::init(src_md, dst_md, attr).map_err(|e| negotiation.reject(e))?;
        negotiation.advance(PdState::Configured);

        let mut scratchpad = ScratchpadRegistry::new();
        if conf.do_reorder {
            scratchpad
                .registrar()
                .book(
                    ScratchpadKey::ReorderRnnSpace,
                    conf.nelems,
                    size_of::<f32>(),
                    dst_engine.buffer_alignment(),
                )
                .map_err(|e| negotiation.reject(e))?;
        }
        negotiation.advance(PdState::Ready);

        let verbose_enabled = dst_engine.verbose();
        verbose(
            verbose_enabled,
            "create",
            IMPL_NAME,
            format_args!(
                "{}->{},src:{},dst:{}",
                src_engine.kind(),
                dst_engine.name(),
                src_md,
                dst_md
            ),
        );

        Ok(RnnWeightsReorderPd {
            src_md: src_md.clone(),
            dst_md: dst_md.clone(),
            attr: attr.clone(),
            conf,
            scratchpad,
            state: negotiation.state,
            verbose: verbose_enabled,
        })
    }

    pub fn name(&self) -> &'static str {
        IMPL_NAME
    }

    pub fn src_md(&self) -> &MemoryDesc {
        &self.src_md
    }

    pub fn dst_md(&self) -> &MemoryDesc {
        &self.dst_md
    }

    pub fn attr(&self) -> &AttributeSet {
        &self.attr
    }

    pub fn conf(&self) -> &RnnReorderConf {
        &self.conf
    }

    pub fn scratchpad_registry(&self) -> &ScratchpadRegistry {
        &self.scratchpad
    }

    pub fn state(&self) -> PdState {
        self.state
    }

    /// Whether executions log `qd_verbose` lines, taken from the
    /// destination engine at creation.
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn init_kernel_ctx(&self) -> KernelCtx {
        self.conf.init_kernel_ctx()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qd_engine::{CpuEngine, DeviceExtSet, EngineConfig, GpuEngine};
    use qd_tensor::{ExtraFlag, ExtraFlags, Layout};

    fn gpu(exts: &[DeviceExt]) -> GpuEngine {
        let config = EngineConfig::default();
        GpuEngine::with_config("test-gpu", DeviceExtSet::from_exts(exts), config)
    }

    fn weights(dt: DType, layout: Layout) -> MemoryDesc {
        MemoryDesc::new(&[1, 1, 4, 3, 8], dt, layout)
    }

    #[test]
    fn test_ready_state_and_scratchpad() {
        let cpu = CpuEngine::new();
        let dst_engine = gpu(&[DeviceExt::IntelSubgroups]);
        let pd = RnnWeightsReorderPd::create(
            &cpu,
            &dst_engine,
            &weights(DType::F32, Layout::Ldigo),
            &weights(DType::S8, Layout::Ldgoi),
            &AttributeSet::new(),
        )
        .unwrap();
        assert_eq!(pd.state(), PdState::Ready);
        assert_eq!(pd.name(), "cross_engine::rnn");
        let entry = pd
            .scratchpad_registry()
            .get(ScratchpadKey::ReorderRnnSpace)
            .unwrap();
        assert_eq!(entry.size, 96 * 4);
        assert_eq!(entry.alignment, dst_engine.buffer_alignment());
    }

    #[test]
    fn test_verbose_follows_destination_engine() {
        let cpu = CpuEngine::new();
        let quiet = gpu(&[DeviceExt::IntelSubgroups]);
        let loud = GpuEngine::with_config(
            "loud-gpu",
            DeviceExtSet::from_exts(&[DeviceExt::IntelSubgroups]),
            EngineConfig {
                verbose: true,
                ..EngineConfig::default()
            },
        );
        let src = weights(DType::F32, Layout::Ldigo);
        let dst = weights(DType::S8, Layout::Ldgoi);
        let attr = AttributeSet::new();

        let pd = RnnWeightsReorderPd::create(&cpu, &loud, &src, &dst, &attr).unwrap();
        assert!(pd.verbose());
        let pd = RnnWeightsReorderPd::create(&cpu, &quiet, &src, &dst, &attr).unwrap();
        assert!(!pd.verbose());
    }

    #[test]
    fn test_conflicting_flags_checked_first() {
        // CPU destination would also be rejected; the flag check comes first.
        let cpu = CpuEngine::new();
        let both = ExtraFlags::from_flags(&[
            ExtraFlag::RnnU8S8Compensation,
            ExtraFlag::RnnS8S8Compensation,
        ]);
        let err = RnnWeightsReorderPd::create(
            &cpu,
            &cpu,
            &weights(DType::F32, Layout::Ldigo),
            &weights(DType::S8, Layout::Ldigo).with_extra_flags(both),
            &AttributeSet::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("compensation"));
    }

    #[test]
    fn test_engine_pairing() {
        let cpu = CpuEngine::new();
        let dev = gpu(&[DeviceExt::IntelSubgroups]);
        let err = RnnWeightsReorderPd::create(
            &dev,
            &cpu,
            &weights(DType::F32, Layout::Ldigo),
            &weights(DType::S8, Layout::Ldigo),
            &AttributeSet::new(),
        )
        .unwrap_err();
        assert!(matches!(err, PrimitiveError::Unimplemented(_)));

        assert!(RnnWeightsReorderPd::create(
            &dev,
            &dev,
            &weights(DType::F32, Layout::Ldigo),
            &weights(DType::S8, Layout::Ldigo),
            &AttributeSet::new(),
        )
        .is_ok());
    }

    #[test]
    fn test_f16_needs_short_subgroups() {
        let cpu = CpuEngine::new();
        let fp16_only = gpu(&[DeviceExt::IntelSubgroups, DeviceExt::KhrFp16]);
        let err = RnnWeightsReorderPd::create(
            &cpu,
            &fp16_only,
            &weights(DType::F16, Layout::Ldigo),
            &weights(DType::S8, Layout::Ldigo),
            &AttributeSet::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("cl_intel_subgroups_short"));
    }

    #[test]
    fn test_config_failure_rejects() {
        let cpu = CpuEngine::new();
        let dev = gpu(&[DeviceExt::IntelSubgroups]);
        let err = RnnWeightsReorderPd::create(
            &cpu,
            &dev,
            &weights(DType::F32, Layout::Any),
            &weights(DType::S8, Layout::Ldigo),
            &AttributeSet::new(),
        )
        .unwrap_err();
        assert!(matches!(err, PrimitiveError::Unimplemented(_)));
    }
}
