//! `qd-primitive` - Quantization attributes and the cross-engine RNN weights
//! reorder.
//!
//! A descriptor negotiates engines, device features and layouts once
//! ([`RnnWeightsReorderPd::create`]); the primitive then compiles its kernel
//! ([`RnnWeightsReorder::init`]). Each execution resolves the runtime scales
//! and zero points bound to its [`ExecContext`] and submits one launch.

pub mod arg;
pub mod attr;
pub mod error;
pub mod exec_ctx;
pub mod primitive;
pub mod reorder;
pub mod resolver;
pub mod scratchpad;

pub use arg::{ArgId, ArgKey};
pub use attr::{AttributeSet, ScaleAttr, ZeroPointAttr};
pub use error::{PrimitiveError, Result, Status};
pub use exec_ctx::ExecContext;
pub use primitive::Primitive;
pub use reorder::{PdState, RnnReorderConf, RnnWeightsReorder, RnnWeightsReorderPd};
pub use resolver::{
    resolve_scale_broadcast, resolve_scale_scalar, resolve_zero_point_buffer,
    resolve_zero_point_scalar, ScaleBuffer, ScaleLanes, ZeroPointBuffer, SCALE_LANES,
};
pub use scratchpad::{
    Registrar, ScratchpadEntry, ScratchpadGrantor, ScratchpadKey, ScratchpadRegion,
    ScratchpadRegistry,
};
