use glam::{Quat, Vec3};
use motive_animation::{
    ConstraintKind, ConstraintTarget, Curve, InterpolationMode, JointConstraintSharedData,
    JointMotion, JointPriority, KeyframeAsset, PositionCurve, RotationCurve,
};

use crate::rig::{self, ANKLE, ELBOW, HIP, KNEE, PELVIS, SHOULDER, SOLE_OFFSET, WRIST};

/// Name of the collision volume [`hand_on_hip`] reaches for.
pub const HIP_VOLUME: &str = "hip_volume";

#[must_use]
pub fn position_curve(keys: &[(f32, Vec3)], mode: InterpolationMode) -> PositionCurve {
    Curve::from_keys(keys, mode).unwrap_or_else(|err| panic!("bad fixture curve: {err:?}"))
}

#[must_use]
pub fn rotation_curve(keys: &[(f32, Quat)], mode: InterpolationMode) -> RotationCurve {
    Curve::from_keys(keys, mode).unwrap_or_else(|err| panic!("bad fixture curve: {err:?}"))
}

/// Pelvis slides linearly from its rest position to one unit along +X.
#[must_use]
pub fn pelvis_slide(duration: f32) -> KeyframeAsset {
    let start = Vec3::new(0.0, 1.0, 0.0);
    let position = position_curve(
        &[(0.0, start), (duration, start + Vec3::X)],
        InterpolationMode::Linear,
    );
    KeyframeAsset::new(duration, vec![JointMotion::new(PELVIS).with_position(position)])
}

/// Holds the knee at a fixed forward swing of `angle` radians.
#[must_use]
pub fn knee_bend(angle: f32, priority: JointPriority) -> KeyframeAsset {
    let q = rig::swing(angle);
    let rotation = rotation_curve(&[(0.0, q), (1.0, q)], InterpolationMode::Linear);
    let mut asset = KeyframeAsset::new(1.0, vec![JointMotion::new(KNEE).with_rotation(rotation)]);
    asset.set_priority(priority);
    asset
}

/// Looping idle that keeps the left foot on the ground with a plane
/// constraint on the ankle → knee → hip chain.
#[must_use]
pub fn grounded_stance() -> KeyframeAsset {
    let knee = rotation_curve(
        &[(0.0, Quat::IDENTITY), (0.5, rig::swing(0.05)), (1.0, Quat::IDENTITY)],
        InterpolationMode::Linear,
    );
    let joints = vec![
        JointMotion::new(ANKLE),
        JointMotion::new(KNEE).with_rotation(knee),
        JointMotion::new(HIP),
    ];
    let mut asset = KeyframeAsset::new(1.0, joints);
    asset.set_loop(true);

    let mut constraint = JointConstraintSharedData::new(
        ConstraintKind::Plane,
        ConstraintTarget::Ground,
        &[0, 1, 2],
    );
    constraint.source_offset = SOLE_OFFSET;
    asset.push_constraint(constraint);
    asset
}

/// Right hand reaching a point on a named body volume.
#[must_use]
pub fn hand_on_hip() -> KeyframeAsset {
    let joints = vec![
        JointMotion::new(WRIST),
        JointMotion::new(ELBOW),
        JointMotion::new(SHOULDER),
    ];
    let mut asset = KeyframeAsset::new(2.0, joints);
    let mut constraint = JointConstraintSharedData::new(
        ConstraintKind::Point,
        ConstraintTarget::Body,
        &[0, 1, 2],
    );
    constraint.target_volume = HIP_VOLUME.to_string();
    asset.push_constraint(constraint);
    asset
}

/// A looping two-second walk cycle with spline curves on every leg joint
/// and the pelvis, loop points at 0.5 and 1.5, and short eases.
#[must_use]
pub fn walk_cycle() -> KeyframeAsset {
    let key_count = 9;
    let sample = |f: &dyn Fn(f32) -> Quat| -> RotationCurve {
        let keys: Vec<(f32, Quat)> = (0..key_count)
            .map(|i| {
                let t = i as f32 * 0.25;
                (t, f(t))
            })
            .collect();
        rotation_curve(&keys, InterpolationMode::Spline)
    };
    let phase = |t: f32| t * std::f32::consts::PI;

    let hip = sample(&|t| rig::swing(0.4 * phase(t).sin()));
    let knee = sample(&|t| rig::swing(0.6 * phase(t).sin().abs()));
    let ankle = sample(&|t| rig::swing(-0.2 * phase(t).cos()));
    let pelvis_keys: Vec<(f32, Vec3)> = (0..key_count)
        .map(|i| {
            let t = i as f32 * 0.25;
            (t, Vec3::new(0.0, 1.0 + 0.03 * (2.0 * phase(t)).cos(), 0.0))
        })
        .collect();

    let joints = vec![
        JointMotion::new(PELVIS)
            .with_position(position_curve(&pelvis_keys, InterpolationMode::Spline)),
        JointMotion::new(HIP).with_rotation(hip),
        JointMotion::new(KNEE)
            .with_priority(JointPriority::Medium)
            .with_rotation(knee),
        JointMotion::new(ANKLE).with_rotation(ankle),
    ];
    let mut asset = KeyframeAsset::new(2.0, joints);
    asset.set_loop_points(0.5, 1.5);
    asset.set_loop(true);
    asset.set_ease_in(0.2);
    asset.set_ease_out(0.2);
    asset
}
