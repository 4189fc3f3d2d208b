//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx3d;

pub use crate::data::geometry::{Geometry, Mat3, Vec3};
pub use crate::data::io::rewrite_origin;
pub use crate::data::morph_3d::{BoundingBox, Connectivity, PaddedBox};
pub use crate::data::resample::{align_label_to, resample_nearest};
pub use crate::data::{GridAttr, Volume};

pub use crate::error::{FrameError, Result, Warning};

pub use crate::frame::{crop, recenter, CropOptions, CroppedResult};

pub use crate::validate::{
    validate, validate_label_presence, Interpolation, ToSpace, ValidateArgs, Validated,
};

pub use crate::pipeline::{
    run_autospm, run_with_mask, with_session, Engine, PipelineOutcome, Registrar,
    ResliceOptions, Segmenter,
};
