//! Motion Interface
//!
//! [`Motion`] is the contract every playable motion fulfils: a lifecycle of
//! initialize → activate → per-tick update → deactivate, with an optional
//! constraint pass that runs after every motion's base pose has been blended
//! and the skeleton's world transforms refreshed.
//!
//! Keyframe playback is one implementation ([`KeyframeMotion`]); other
//! kinds plug into the same [`MotionController`].
//!
//! [`KeyframeMotion`]: crate::keyframe::KeyframeMotion
//! [`MotionController`]: crate::controller::MotionController

use std::sync::Arc;

use motive_core::{AssetId, AssetStatus, JointHandle, Skeleton};

use crate::asset::{JointPriority, KeyframeAsset};
use crate::pose::{PoseBuffer, Touched};
use crate::world::CharacterWorld;

/// Lifecycle state of a motion instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MotionState {
    /// Not yet bound to an asset and skeleton.
    #[default]
    Uninitialized,
    /// Initialized, not playing.
    Ready,
    /// Playing.
    Active,
    /// Finished or stopped. May be activated again.
    Inactive,
}

/// Lifecycle events driving [`MotionState::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionEvent {
    Initialized,
    InitializeFailed,
    Activated,
    Completed,
    Deactivated,
}

impl MotionState {
    /// Next state for `event`. Events that make no sense in the current
    /// state leave it unchanged.
    #[must_use]
    pub fn transition(self, event: MotionEvent) -> MotionState {
        use MotionEvent as E;
        use MotionState as S;
        match (self, event) {
            (S::Uninitialized, E::Initialized) => S::Ready,
            (S::Ready | S::Inactive, E::Activated) => S::Active,
            (S::Active, E::Completed) | (_, E::Deactivated) => S::Inactive,
            (state, _) => state,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_initialized(self) -> bool {
        self != MotionState::Uninitialized
    }
}

/// Outcome of [`Motion::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitStatus {
    Success,
    /// Waiting on an asset load; retry later.
    Hold,
    Failure,
}

/// Read access to loaded keyframe assets.
pub trait AssetLookup {
    fn asset(&self, id: AssetId) -> Option<Arc<KeyframeAsset>>;
    fn status(&self, id: AssetId) -> AssetStatus;
}

/// Everything a motion may read while initializing.
pub struct InitContext<'a> {
    pub assets: &'a dyn AssetLookup,
    pub skeleton: &'a Skeleton,
}

/// Everything a motion may touch during a tick.
pub struct MotionContext<'a> {
    pub skeleton: &'a mut Skeleton,
    pub pose: &'a mut PoseBuffer,
    pub world: &'a dyn CharacterWorld,
}

impl MotionContext<'_> {
    /// Re-applies the pose and refreshes world transforms if an earlier
    /// constraint already overrode a joint of `chain` this tick, so a later
    /// solve starts from the corrected pose.
    pub fn refresh_if_constrained(&mut self, chain: &[JointHandle]) -> bool {
        let overridden = chain
            .iter()
            .any(|&h| self.pose.touched(h).contains(Touched::CONSTRAINT));
        if overridden {
            self.skeleton.reset_to_rest();
            self.pose.apply(self.skeleton);
            self.skeleton.update_world_transforms();
        }
        overridden
    }
}

pub trait Motion {
    fn initialize(&mut self, ctx: &InitContext<'_>) -> InitStatus;

    /// Starts playback. Returns `false` if the motion cannot play.
    fn activate(&mut self) -> bool;

    /// Advances to `time` seconds since activation and deposits the pose.
    /// Returns `false` once the motion has finished.
    fn update(&mut self, time: f32, ctx: &mut MotionContext<'_>) -> bool;

    /// Second pass, after every base pose is blended and world transforms are
    /// current.
    fn apply_constraints(&mut self, _time: f32, _ctx: &mut MotionContext<'_>) {}

    fn deactivate(&mut self);

    fn state(&self) -> MotionState;

    fn priority(&self) -> JointPriority;

    fn duration(&self) -> f32;

    fn ease_in_duration(&self) -> f32;

    fn ease_out_duration(&self) -> f32;

    fn is_looping(&self) -> bool;

    /// Ends playback at `time` seconds since activation, easing out before it.
    fn set_stop_time(&mut self, time: f32);

    fn as_any(&self) -> &dyn std::any::Any;

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
