//! Keyframe Assets
//!
//! The immutable, shareable description of one motion: per-joint curves,
//! loop and ease settings, priority, hand pose, and constraint definitions.
//!
//! Assets are built once (by the codec or by hand), wrapped in an `Arc`, and
//! shared by every motion instance that plays them.

use bitflags::bitflags;
use glam::Vec3;
use motive_core::{AssetId, BoundingBox};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::curve::{PositionCurve, RotationCurve, ScaleCurve};

/// Longest joint chain a constraint may drive.
pub const MAX_CHAIN_LENGTH: usize = 4;

bitflags! {
    /// Channels a joint motion animates.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ChannelUsage: u32 {
        const POSITION = 1 << 0;
        const ROTATION = 1 << 1;
        const SCALE    = 1 << 2;
    }
}

/// Blend rank of a joint motion. Higher wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum JointPriority {
    /// Inherit the asset's base priority.
    UseMotion,
    #[default]
    Low,
    Medium,
    High,
    Higher,
    Highest,
    Additive,
}

impl JointPriority {
    #[must_use]
    pub fn to_i32(self) -> i32 {
        match self {
            JointPriority::UseMotion => -1,
            JointPriority::Low => 0,
            JointPriority::Medium => 1,
            JointPriority::High => 2,
            JointPriority::Higher => 3,
            JointPriority::Highest => 4,
            JointPriority::Additive => 5,
        }
    }

    #[must_use]
    pub fn from_i32(value: i32) -> Option<Self> {
        Some(match value {
            -1 => JointPriority::UseMotion,
            0 => JointPriority::Low,
            1 => JointPriority::Medium,
            2 => JointPriority::High,
            3 => JointPriority::Higher,
            4 => JointPriority::Highest,
            5 => JointPriority::Additive,
            _ => return None,
        })
    }

    /// Replaces `UseMotion` with the motion's base priority.
    #[inline]
    #[must_use]
    pub fn resolve(self, base: JointPriority) -> JointPriority {
        match self {
            JointPriority::UseMotion => base,
            other => other,
        }
    }
}

/// Hand shape requested while a motion plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HandPose {
    Spread,
    #[default]
    Relaxed,
    Point,
    Fist,
    RelaxedL,
    PointL,
    FistL,
    RelaxedR,
    PointR,
    FistR,
    SaluteR,
    Typing,
    PeaceR,
    PalmR,
}

impl HandPose {
    const ALL: [HandPose; 14] = [
        HandPose::Spread,
        HandPose::Relaxed,
        HandPose::Point,
        HandPose::Fist,
        HandPose::RelaxedL,
        HandPose::PointL,
        HandPose::FistL,
        HandPose::RelaxedR,
        HandPose::PointR,
        HandPose::FistR,
        HandPose::SaluteR,
        HandPose::Typing,
        HandPose::PeaceR,
        HandPose::PalmR,
    ];

    #[must_use]
    pub fn to_u32(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }
}

/// Curves for one named joint.
#[derive(Debug, Clone, PartialEq)]
pub struct JointMotion {
    pub name: String,
    pub usage: ChannelUsage,
    pub priority: JointPriority,
    pub position: PositionCurve,
    pub rotation: RotationCurve,
    pub scale: ScaleCurve,
}

impl JointMotion {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            usage: ChannelUsage::empty(),
            priority: JointPriority::UseMotion,
            position: PositionCurve::default(),
            rotation: RotationCurve::default(),
            scale: ScaleCurve::default(),
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: JointPriority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_position(mut self, curve: PositionCurve) -> Self {
        self.usage.set(ChannelUsage::POSITION, !curve.is_empty());
        self.position = curve;
        self
    }

    #[must_use]
    pub fn with_rotation(mut self, curve: RotationCurve) -> Self {
        self.usage.set(ChannelUsage::ROTATION, !curve.is_empty());
        self.rotation = curve;
        self
    }

    #[must_use]
    pub fn with_scale(mut self, curve: ScaleCurve) -> Self {
        self.usage.set(ChannelUsage::SCALE, !curve.is_empty());
        self.scale = curve;
        self
    }

    #[must_use]
    pub fn key_count(&self) -> usize {
        self.position.len() + self.rotation.len() + self.scale.len()
    }

    fn sync_loop_keys(&mut self, looping: bool, loop_in: f32, loop_out: f32) {
        if looping {
            self.position.set_loop_keys(loop_in, loop_out);
            self.rotation.set_loop_keys(loop_in, loop_out);
            self.scale.set_loop_keys(loop_in, loop_out);
        } else {
            self.position.clear_loop_keys();
            self.rotation.clear_loop_keys();
            self.scale.clear_loop_keys();
        }
    }
}

// ============================================================================
// Constraint definitions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Pull the source point onto the target point.
    #[default]
    Point,
    /// Keep the source point on or above the target plane.
    Plane,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConstraintTarget {
    /// A named collision volume on the character.
    #[default]
    Body,
    /// The ground under the source point.
    Ground,
}

/// Shared, immutable definition of one chain constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct JointConstraintSharedData {
    pub kind: ConstraintKind,
    pub target: ConstraintTarget,
    /// Asset joint indices from the effector up to the chain root.
    pub chain: SmallVec<[usize; MAX_CHAIN_LENGTH]>,
    pub source_volume: String,
    pub source_offset: Vec3,
    pub target_volume: String,
    pub target_offset: Vec3,
    /// Plane normal for body plane targets, in the target volume's frame.
    pub target_dir: Vec3,
    pub ease_in_start: f32,
    pub ease_in_stop: f32,
    pub ease_out_start: f32,
    pub ease_out_stop: f32,
}

impl JointConstraintSharedData {
    #[must_use]
    pub fn new(kind: ConstraintKind, target: ConstraintTarget, chain: &[usize]) -> Self {
        Self {
            kind,
            target,
            chain: SmallVec::from_slice(chain),
            source_volume: String::new(),
            source_offset: Vec3::ZERO,
            target_volume: String::new(),
            target_offset: Vec3::ZERO,
            target_dir: Vec3::Y,
            ease_in_start: 0.0,
            ease_in_stop: 0.0,
            ease_out_start: f32::MAX,
            ease_out_stop: f32::MAX,
        }
    }

    #[must_use]
    pub fn with_ease(mut self, in_start: f32, in_stop: f32, out_start: f32, out_stop: f32) -> Self {
        self.ease_in_start = in_start;
        self.ease_in_stop = in_stop;
        self.ease_out_start = out_start;
        self.ease_out_stop = out_stop;
        self
    }

    #[inline]
    #[must_use]
    pub fn chain_length(&self) -> usize {
        self.chain.len()
    }

    /// Asset joint index of the effector.
    #[inline]
    #[must_use]
    pub fn effector(&self) -> Option<usize> {
        self.chain.first().copied()
    }

    /// Window weight at animation time `time`: ramps up between the ease-in
    /// times, holds at 1, ramps down between the ease-out times.
    #[must_use]
    pub fn weight_at(&self, time: f32) -> f32 {
        if time < self.ease_in_start || time > self.ease_out_stop {
            return 0.0;
        }
        if time < self.ease_in_stop {
            let span = self.ease_in_stop - self.ease_in_start;
            return if span > 0.0 {
                ((time - self.ease_in_start) / span).clamp(0.0, 1.0)
            } else {
                1.0
            };
        }
        if time > self.ease_out_start {
            let span = self.ease_out_stop - self.ease_out_start;
            return if span > 0.0 {
                (1.0 - (time - self.ease_out_start) / span).clamp(0.0, 1.0)
            } else {
                0.0
            };
        }
        1.0
    }
}

// ============================================================================
// Asset
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeAsset {
    duration: f32,
    looping: bool,
    loop_in: f32,
    loop_out: f32,
    ease_in: f32,
    ease_out: f32,
    priority: JointPriority,
    hand_pose: HandPose,
    emote: Option<AssetId>,
    pelvis_bbox: BoundingBox,
    joints: Vec<JointMotion>,
    constraints: Vec<JointConstraintSharedData>,
}

impl KeyframeAsset {
    /// Non-looping asset with no easing, playing the full duration.
    #[must_use]
    pub fn new(duration: f32, joints: Vec<JointMotion>) -> Self {
        let duration = duration.max(0.0);
        let mut asset = Self {
            duration,
            looping: false,
            loop_in: 0.0,
            loop_out: duration,
            ease_in: 0.0,
            ease_out: 0.0,
            priority: JointPriority::Low,
            hand_pose: HandPose::default(),
            emote: None,
            pelvis_bbox: BoundingBox::default(),
            joints,
            constraints: Vec::new(),
        };
        asset.sync_loop_keys();
        asset
    }

    #[inline]
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.duration
    }

    #[inline]
    #[must_use]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    #[inline]
    #[must_use]
    pub fn loop_in(&self) -> f32 {
        self.loop_in
    }

    #[inline]
    #[must_use]
    pub fn loop_out(&self) -> f32 {
        self.loop_out
    }

    #[inline]
    #[must_use]
    pub fn ease_in(&self) -> f32 {
        self.ease_in
    }

    #[inline]
    #[must_use]
    pub fn ease_out(&self) -> f32 {
        self.ease_out
    }

    #[inline]
    #[must_use]
    pub fn priority(&self) -> JointPriority {
        self.priority
    }

    /// Highest resolved priority over the base and every joint.
    #[must_use]
    pub fn max_priority(&self) -> JointPriority {
        self.joints
            .iter()
            .map(|j| j.priority.resolve(self.priority))
            .fold(self.priority, Ord::max)
    }

    #[inline]
    #[must_use]
    pub fn hand_pose(&self) -> HandPose {
        self.hand_pose
    }

    #[inline]
    #[must_use]
    pub fn emote(&self) -> Option<AssetId> {
        self.emote
    }

    #[inline]
    #[must_use]
    pub fn pelvis_bbox(&self) -> &BoundingBox {
        &self.pelvis_bbox
    }

    #[inline]
    #[must_use]
    pub fn joints(&self) -> &[JointMotion] {
        &self.joints
    }

    #[inline]
    #[must_use]
    pub fn constraints(&self) -> &[JointConstraintSharedData] {
        &self.constraints
    }

    #[must_use]
    pub fn find_joint(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|j| j.name == name)
    }

    #[must_use]
    pub fn key_count(&self) -> usize {
        self.joints.iter().map(JointMotion::key_count).sum()
    }

    // ------------------------------------------------------------------------
    // Setters
    // ------------------------------------------------------------------------

    pub fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
        self.sync_loop_keys();
    }

    /// Clamped to `[0, loop_out]`.
    pub fn set_loop_in(&mut self, loop_in: f32) {
        self.loop_in = loop_in.clamp(0.0, self.loop_out);
        self.sync_loop_keys();
    }

    /// Clamped to `[loop_in, duration]`.
    pub fn set_loop_out(&mut self, loop_out: f32) {
        self.loop_out = loop_out.clamp(self.loop_in, self.duration);
        self.sync_loop_keys();
    }

    /// Sets both loop points at once, clamped into the duration.
    pub fn set_loop_points(&mut self, loop_in: f32, loop_out: f32) {
        self.loop_out = loop_out.clamp(0.0, self.duration);
        self.loop_in = loop_in.clamp(0.0, self.loop_out);
        self.sync_loop_keys();
    }

    pub fn set_ease_in(&mut self, seconds: f32) {
        self.ease_in = seconds.max(0.0);
    }

    pub fn set_ease_out(&mut self, seconds: f32) {
        self.ease_out = seconds.max(0.0);
    }

    /// Sets the base priority. `UseMotion` is not a valid base and maps to `Low`.
    pub fn set_priority(&mut self, priority: JointPriority) {
        self.priority = priority.resolve(JointPriority::Low);
    }

    pub fn set_hand_pose(&mut self, pose: HandPose) {
        self.hand_pose = pose;
    }

    pub fn set_emote(&mut self, emote: Option<AssetId>) {
        self.emote = emote.filter(|id| !id.is_nil());
    }

    pub fn set_pelvis_bbox(&mut self, bbox: BoundingBox) {
        self.pelvis_bbox = bbox;
    }

    pub fn push_constraint(&mut self, constraint: JointConstraintSharedData) {
        self.constraints.push(constraint);
    }

    fn sync_loop_keys(&mut self) {
        let (looping, loop_in, loop_out) = (self.looping, self.loop_in, self.loop_out);
        for joint in &mut self.joints {
            joint.sync_loop_keys(looping, loop_in, loop_out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_codes() {
        for code in -1..=5 {
            assert_eq!(JointPriority::from_i32(code).unwrap().to_i32(), code);
        }
        assert!(JointPriority::from_i32(6).is_none());
        assert!(JointPriority::High > JointPriority::Medium);
        assert_eq!(JointPriority::UseMotion.resolve(JointPriority::High), JointPriority::High);
    }

    #[test]
    fn test_hand_pose_codes() {
        assert_eq!(HandPose::from_u32(13), Some(HandPose::PalmR));
        assert_eq!(HandPose::PalmR.to_u32(), 13);
        assert!(HandPose::from_u32(14).is_none());
    }

    #[test]
    fn test_loop_setters_clamp() {
        let mut asset = KeyframeAsset::new(2.0, Vec::new());
        asset.set_loop_points(-1.0, 5.0);
        assert_eq!(asset.loop_in(), 0.0);
        assert_eq!(asset.loop_out(), 2.0);
        asset.set_loop_in(3.0);
        assert_eq!(asset.loop_in(), 2.0);
    }

    #[test]
    fn test_constraint_window_weight() {
        let c =
            JointConstraintSharedData::new(ConstraintKind::Point, ConstraintTarget::Ground, &[0])
                .with_ease(0.0, 0.2, 0.8, 1.0);
        assert_eq!(c.weight_at(-0.1), 0.0);
        assert!((c.weight_at(0.1) - 0.5).abs() < 1e-5);
        assert_eq!(c.weight_at(0.5), 1.0);
        assert!((c.weight_at(0.9) - 0.5).abs() < 1e-5);
        assert_eq!(c.weight_at(1.1), 0.0);
    }
}
