//! # Motive
//!
//! Skeletal keyframe motion playback: binary keyframe assets, an id-keyed
//! asset cache with asynchronous loading, priority-blended motion playback,
//! and short-chain IK constraints layered over the keyframed pose.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use motive::prelude::*;
//!
//! let cache = Arc::new(KeyframeCache::new());
//! cache.add_asset(id, asset);
//!
//! let mut controller = MotionController::new();
//! let walk = controller.add_motion(KeyframeMotion::new(id));
//! controller.start_motion(walk, 0.0, cache.as_ref(), &skeleton);
//! controller.update(dt, &mut skeleton, cache.as_ref(), &world);
//! ```

pub use motive_animation as animation;
pub use motive_assets as assets;

pub use glam;

pub use motive_core::{
    AnimationError, AssetError, AssetId, AssetStatus, BoundingBox, DecodeError, Error, JointHandle,
    LoadTicket, Result, Skeleton, Transform, UnsolvableReason,
};

pub use motive_animation::{
    CharacterWorld, ConstraintSolver, Curve, InterpolationMode, KeyframeAsset, KeyframeMotion,
    Motion, MotionController, MotionKey, MotionState, PoseBuffer,
};

pub use motive_assets::{AssetFetcher, KeyframeCache, KeyframeLoader, LoadCompletion};

pub mod prelude {
    pub use motive_animation::{
        CharacterWorld, EmptyWorld, GroundContact, InitStatus, JointPriority, KeyframeAsset,
        KeyframeMotion, Motion, MotionController, MotionKey, MotionState,
    };
    pub use motive_assets::{
        FileFetcher, KeyframeCache, KeyframeLoader, LoaderSettings, MemoryFetcher,
    };
    pub use motive_core::{AssetId, AssetStatus, Skeleton, Transform};
}
