//! Motive Animation
//!
//! Keyframe motion playback for skeletal characters.
//!
//! - [`curve`]: step, linear, and spline curves with loop wrap keys
//! - [`asset`]: immutable [`KeyframeAsset`] definitions
//! - [`keyframe`]: [`KeyframeMotion`], one playing instance of an asset
//! - [`pose`]: priority-ordered pose blending
//! - [`constraint`]: short-chain IK corrections
//! - [`controller`]: [`MotionController`], the per-character tick driver

pub mod asset;
pub mod binding;
pub mod constraint;
pub mod controller;
pub mod curve;
pub mod keyframe;
pub mod motion;
pub mod pose;
pub mod settings;
pub mod values;
pub mod world;

pub use asset::{
    ChannelUsage, ConstraintKind, ConstraintTarget, HandPose, JointConstraintSharedData,
    JointMotion, JointPriority, KeyframeAsset, MAX_CHAIN_LENGTH,
};
pub use binding::JointBindings;
pub use constraint::{ConstraintSolver, JointConstraint};
pub use controller::{MotionController, MotionKey};
pub use curve::{
    Curve, CurveError, InterpolationMode, KeyframeCursor, PositionCurve, RotationCurve, ScaleCurve,
};
pub use keyframe::KeyframeMotion;
pub use motion::{
    AssetLookup, InitContext, InitStatus, Motion, MotionContext, MotionEvent, MotionState,
};
pub use pose::{PoseBuffer, Touched};
pub use settings::{MotionSettings, SolverSettings};
pub use values::Interpolatable;
pub use world::{CharacterWorld, EmptyWorld, GroundContact};
