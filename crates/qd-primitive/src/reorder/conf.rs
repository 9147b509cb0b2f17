use qd_engine::{DeviceExt, KernelCtx, NdRange};
use qd_tensor::{DType, ExtraFlag, Layout, MemoryDesc};

use crate::arg::ArgId;
use crate::attr::AttributeSet;
use crate::error::{PrimitiveError, Result};

/// Sub-group width used when the output channel count allows it.
pub const SUB_GROUP_SIZE: usize = 16;

/// Derived configuration of an RNN weights reorder.
///
/// Everything the kernel and the dispatcher need is fixed here once, at
/// descriptor creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RnnReorderConf {
    pub src_dt: DType,
    pub dst_dt: DType,
    pub src_layout: Layout,
    pub dst_layout: Layout,
    pub ndims: usize,
    pub dims: Vec<usize>,
    pub nelems: usize,
    /// Destination carries asymmetric (u8 data, s8 weights) compensation.
    pub with_sum_ab: bool,
    /// Destination carries symmetric (s8 data, s8 weights) compensation.
    pub with_sum_a: bool,
    pub quantize: bool,
    /// Source and destination orders differ, so values are staged in the
    /// scratchpad before being written out.
    pub do_reorder: bool,
    /// Destination scales mask.
    pub mask: u32,
    pub scales_count: usize,
    pub sub_group_size: usize,
    pub range: NdRange,
}

fn unimplemented(msg: String) -> PrimitiveError {
    PrimitiveError::Unimplemented(msg)
}

fn check_weights_layout(md: &MemoryDesc, which: &str) -> Result<()> {
    if !md.layout().is_rnn_weights() {
        return Err(unimplemented(format!(
            "{} layout {} is not an rnn weights layout",
            which,
            md.layout()
        )));
    }
    md.validate_layout()
        .map_err(|e| unimplemented(format!("{}: {}", which, e)))
}

fn supported_dt(dt: DType) -> bool {
    matches!(dt, DType::F32 | DType::F16 | DType::S8)
}

/// Dimensions selected by `mask`, bit `i` selecting dimension `i`.
fn masked_count(dims: &[usize], mask: u32) -> usize {
    dims.iter()
        .enumerate()
        .filter(|(i, _)| mask & (1u32 << *i) != 0)
        .map(|(_, d)| *d)
        .product()
}

impl RnnReorderConf {
    /// Builds the configuration for reordering `src_md` into `dst_md`.
    ///
    /// # Errors
    /// `Unimplemented` for layouts, types or attributes this reorder does
    /// not handle; `InvalidArguments` when source and destination
    /// dimensions disagree.
    pub fn init(src_md: &MemoryDesc, dst_md: &MemoryDesc, attr: &AttributeSet) -> Result<Self> {
        check_weights_layout(src_md, "source")?;
        check_weights_layout(dst_md, "destination")?;

        if src_md.dims() != dst_md.dims() {
            return Err(PrimitiveError::InvalidArguments(format!(
                "source dims {} differ from destination dims {}",
                src_md.shape(),
                dst_md.shape()
            )));
        }

        if dst_md.nelems() == 0 {
            return Err(PrimitiveError::InvalidArguments(format!(
                "zero-sized weights {}",
                dst_md.shape()
            )));
        }

        if src_md.checked_size_in_bytes().is_none() || dst_md.checked_size_in_bytes().is_none() {
            return Err(PrimitiveError::InvalidArguments(format!(
                "weights {} exceed the addressable size",
                dst_md.shape()
            )));
        }

        let (src_dt, dst_dt) = (src_md.dtype(), dst_md.dtype());
        if !supported_dt(src_dt) || !supported_dt(dst_dt) {
            return Err(unimplemented(format!(
                "unsupported data types {} -> {}",
                src_dt, dst_dt
            )));
        }

        let extra = dst_md.extra();
        if extra.has_rnn_compensation() && dst_dt != DType::S8 {
            return Err(unimplemented(format!(
                "compensation requires s8 destination, got {}",
                dst_dt
            )));
        }

        if attr.scales(ArgId::SRC).mask() != 0 {
            return Err(unimplemented(
                "source scales must be a single value".to_string(),
            ));
        }
        if attr.zero_points(ArgId::SRC).mask() != 0 {
            return Err(unimplemented(
                "source zero point must be a single value".to_string(),
            ));
        }

        let dims = dst_md.dims().to_vec();
        let ndims = dims.len();
        // Per-channel scales may vary over gates and outputs only.
        let allowed_mask = match ndims {
            5 => 0b11000,
            _ => 0b1000,
        };
        let mask = attr.scales(ArgId::DST).mask();
        if mask & !allowed_mask != 0 {
            return Err(unimplemented(format!(
                "destination scales mask {:#b} not supported for rank {}",
                mask, ndims
            )));
        }

        let (ld, i) = (dims[0] * dims[1], dims[2]);
        let outer = match ndims {
            5 => dims[3] * dims[4],
            _ => dims[3],
        };
        let oc = dims[ndims - 1];
        let sub_group_size = if oc % SUB_GROUP_SIZE == 0 {
            SUB_GROUP_SIZE
        } else {
            1
        };
        let mut range = NdRange::new([ld, i, outer]);
        if sub_group_size > 1 {
            range = range.with_local([1, 1, sub_group_size]);
        }

        Ok(RnnReorderConf {
            src_dt,
            dst_dt,
            src_layout: src_md.layout(),
            dst_layout: dst_md.layout(),
            ndims,
            nelems: dst_md.nelems(),
            with_sum_ab: extra.contains(ExtraFlag::RnnU8S8Compensation),
            with_sum_a: extra.contains(ExtraFlag::RnnS8S8Compensation),
            quantize: src_dt.is_float() && dst_dt == DType::S8,
            do_reorder: src_md.layout() != dst_md.layout(),
            mask,
            scales_count: if mask != 0 {
                masked_count(&dims, mask)
            } else {
                1
            },
            sub_group_size,
            range,
            dims,
        })
    }

    /// True if either side holds half-precision data.
    pub fn uses_f16(&self) -> bool {
        self.src_dt == DType::F16 || self.dst_dt == DType::F16
    }

    /// Derives the kernel compile-time configuration.
    ///
    /// Pure: equal configurations always give equal contexts, which is what
    /// lets engines cache compiled kernels by their build options.
    pub fn init_kernel_ctx(&self) -> KernelCtx {
        let flag = |b: bool| i64::from(b);
        let mut ctx = KernelCtx::new();
        ctx.add_option("-cl-std=CL2.0");

        ctx.define_int("NDIMS", self.ndims as i64);
        for (i, d) in self.dims.iter().enumerate() {
            ctx.define_int(&format!("D{}", i), *d as i64);
        }
        ctx.define_int(&format!("SRC_DT_{}", self.src_dt.tag()), 1);
        ctx.define_int(&format!("DST_DT_{}", self.dst_dt.tag()), 1);
        ctx.define_int(
            "SRC_LAYOUT_LDGOI",
            flag(matches!(self.src_layout, Layout::Ldgoi | Layout::Ldoi)),
        );
        ctx.define_int(
            "DST_LAYOUT_LDGOI",
            flag(matches!(self.dst_layout, Layout::Ldgoi | Layout::Ldoi)),
        );

        ctx.define_int("WITH_SUM_A", flag(self.with_sum_a));
        ctx.define_int("WITH_SUM_AB", flag(self.with_sum_ab));
        ctx.define_int("QUANTIZE", flag(self.quantize));
        ctx.define_int("DO_REORDER", flag(self.do_reorder));
        ctx.define_int("MASK", i64::from(self.mask));
        ctx.define_int("SCALES_COUNT", self.scales_count as i64);

        ctx.define_int("SUB_GROUP_SIZE", self.sub_group_size as i64);
        ctx.define_int("REF_REORDER", flag(self.sub_group_size == 1));
        for (i, g) in self.range.global.iter().enumerate() {
            ctx.define_int(&format!("GWS{}", i), *g as i64);
        }

        ctx.require(DeviceExt::IntelSubgroups);
        if self.uses_f16() {
            ctx.require(DeviceExt::KhrFp16);
            ctx.require(DeviceExt::IntelSubgroupsShort);
        }
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qd_tensor::ExtraFlags;

    fn md(dims: &[usize], dt: DType, layout: Layout) -> MemoryDesc {
        MemoryDesc::new(dims, dt, layout)
    }

    #[test]
    fn test_quantizing_reorder_conf() {
        let src = md(&[2, 1, 8, 4, 32], DType::F32, Layout::Ldigo);
        let dst = md(&[2, 1, 8, 4, 32], DType::S8, Layout::Ldgoi)
            .with_extra_flags(ExtraFlag::RnnU8S8Compensation.into());
        let attr = AttributeSet::new().with_scales(ArgId::DST, 0b11000);
        let conf = RnnReorderConf::init(&src, &dst, &attr).unwrap();

        assert!(conf.quantize);
        assert!(conf.do_reorder);
        assert!(conf.with_sum_ab);
        assert!(!conf.with_sum_a);
        assert_eq!(conf.nelems, 2 * 8 * 4 * 32);
        assert_eq!(conf.scales_count, 4 * 32);
        assert_eq!(conf.sub_group_size, 16);
        assert_eq!(conf.range.global, [2, 8, 128]);
        assert_eq!(conf.range.local, Some([1, 1, 16]));
    }

    #[test]
    fn test_same_layout_needs_no_reorder() {
        let src = md(&[1, 1, 3, 5], DType::F32, Layout::Ldio);
        let dst = md(&[1, 1, 3, 5], DType::F32, Layout::Ldio);
        let conf = RnnReorderConf::init(&src, &dst, &AttributeSet::new()).unwrap();
        assert!(!conf.do_reorder);
        assert!(!conf.quantize);
        assert_eq!(conf.scales_count, 1);
        assert_eq!(conf.sub_group_size, 1);
        assert_eq!(conf.range.global, [1, 3, 5]);
        assert_eq!(conf.range.local, None);
    }

    #[test]
    fn test_unsupported_layouts() {
        let any = md(&[1, 1, 3, 4, 5], DType::F32, Layout::Any);
        let dst = md(&[1, 1, 3, 4, 5], DType::S8, Layout::Ldigo);
        let err = RnnReorderConf::init(&any, &dst, &AttributeSet::new()).unwrap_err();
        assert!(matches!(err, PrimitiveError::Unimplemented(_)));

        let wrong_rank = md(&[1, 3, 4, 5], DType::F32, Layout::Ldigo);
        let err = RnnReorderConf::init(&wrong_rank, &dst, &AttributeSet::new()).unwrap_err();
        assert!(matches!(err, PrimitiveError::Unimplemented(_)));
    }

    #[test]
    fn test_dims_mismatch() {
        let src = md(&[1, 1, 3, 4, 5], DType::F32, Layout::Ldigo);
        let dst = md(&[1, 1, 3, 4, 6], DType::S8, Layout::Ldigo);
        let err = RnnReorderConf::init(&src, &dst, &AttributeSet::new()).unwrap_err();
        assert!(matches!(err, PrimitiveError::InvalidArguments(_)));
    }

    #[test]
    fn test_unaddressable_weights_rejected() {
        let dims = [1, 1, usize::MAX / 2, 1, 1];
        let src = md(&dims, DType::F32, Layout::Ldigo);
        let dst = md(&dims, DType::S8, Layout::Ldgoi);
        let err = RnnReorderConf::init(&src, &dst, &AttributeSet::new()).unwrap_err();
        assert!(matches!(err, PrimitiveError::InvalidArguments(_)));
    }

    #[test]
    fn test_rejected_types_and_attrs() {
        let src = md(&[1, 1, 3, 4, 5], DType::F32, Layout::Ldigo);
        let u8_dst = md(&[1, 1, 3, 4, 5], DType::U8, Layout::Ldigo);
        assert!(RnnReorderConf::init(&src, &u8_dst, &AttributeSet::new()).is_err());

        let f32_comp = md(&[1, 1, 3, 4, 5], DType::F32, Layout::Ldigo)
            .with_extra_flags(ExtraFlags::from(ExtraFlag::RnnS8S8Compensation));
        assert!(RnnReorderConf::init(&src, &f32_comp, &AttributeSet::new()).is_err());

        let dst = md(&[1, 1, 3, 4, 5], DType::S8, Layout::Ldigo);
        let per_channel_src = AttributeSet::new().with_scales(ArgId::SRC, 1);
        assert!(RnnReorderConf::init(&src, &dst, &per_channel_src).is_err());
        let per_channel_zp = AttributeSet::new().with_zero_points(ArgId::SRC, 2);
        assert!(RnnReorderConf::init(&src, &dst, &per_channel_zp).is_err());
        let input_mask = AttributeSet::new().with_scales(ArgId::DST, 0b100);
        assert!(RnnReorderConf::init(&src, &dst, &input_mask).is_err());
    }

    #[test]
    fn test_kernel_ctx_is_deterministic() {
        let src = md(&[1, 2, 4, 3, 16], DType::F16, Layout::Ldigo);
        let dst = md(&[1, 2, 4, 3, 16], DType::S8, Layout::Ldgoi);
        let conf = RnnReorderConf::init(&src, &dst, &AttributeSet::new()).unwrap();
        let a = conf.init_kernel_ctx();
        let b = conf.clone().init_kernel_ctx();
        assert_eq!(a, b);
        assert_eq!(a.build_options(), b.build_options());

        assert_eq!(a.get_int("SRC_DT_F16"), Some(1));
        assert_eq!(a.get_int("DST_DT_S8"), Some(1));
        assert_eq!(a.get_int("DST_LAYOUT_LDGOI"), Some(1));
        assert_eq!(a.get_int("QUANTIZE"), Some(1));
        assert_eq!(a.get_int("REF_REORDER"), Some(0));
        let required: Vec<_> = a.required_extensions().collect();
        assert!(required.contains(&DeviceExt::KhrFp16));
        assert!(required.contains(&DeviceExt::IntelSubgroupsShort));
    }

    #[test]
    fn test_kernel_ctx_differs_with_conf() {
        let src = md(&[1, 1, 4, 3, 8], DType::F32, Layout::Ldigo);
        let dst = md(&[1, 1, 4, 3, 8], DType::S8, Layout::Ldigo);
        let plain = RnnReorderConf::init(&src, &dst, &AttributeSet::new()).unwrap();
        let masked = RnnReorderConf::init(
            &src,
            &dst,
            &AttributeSet::new().with_scales(ArgId::DST, 0b11000),
        )
        .unwrap();
        assert_ne!(
            plain.init_kernel_ctx().build_options(),
            masked.init_kernel_ctx().build_options()
        );
        let required: Vec<_> = plain.init_kernel_ctx().required_extensions().collect();
        assert_eq!(required, vec![DeviceExt::IntelSubgroups]);
    }
}
