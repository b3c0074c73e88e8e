use glam::{Quat, Vec3};
use motive_core::{JointHandle, Skeleton, Transform};

pub const PELVIS: &str = "pelvis";
pub const HIP: &str = "hip_l";
pub const KNEE: &str = "knee_l";
pub const ANKLE: &str = "ankle_l";
pub const SPINE: &str = "spine";
pub const SHOULDER: &str = "shoulder_r";
pub const ELBOW: &str = "elbow_r";
pub const WRIST: &str = "wrist_r";

/// Height of the ankle joint above the origin in the rest pose.
pub const ANKLE_HEIGHT: f32 = 0.1;
/// Offset from the ankle to the sole of the foot.
pub const SOLE_OFFSET: Vec3 = Vec3::new(0.0, -0.1, 0.0);

/// Handles of a [`humanoid`] skeleton.
#[derive(Debug, Clone, Copy)]
pub struct Rig {
    pub pelvis: JointHandle,
    pub hip: JointHandle,
    pub knee: JointHandle,
    pub ankle: JointHandle,
    pub spine: JointHandle,
    pub shoulder: JointHandle,
    pub elbow: JointHandle,
    pub wrist: JointHandle,
}

/// Pelvis one unit above the origin, a left leg whose knee bends slightly
/// forward, and a right arm hanging from the spine.
///
/// World transforms are already up to date on return.
#[must_use]
pub fn humanoid() -> (Skeleton, Rig) {
    let mut skeleton = Skeleton::new();
    let mut add = |name: &str, parent: Option<JointHandle>, position: Vec3| {
        skeleton
            .add_joint(name, parent, Transform::from_position(position))
            .unwrap_or_else(|| panic!("duplicate fixture joint {name}"))
    };

    let pelvis = add(PELVIS, None, Vec3::new(0.0, 1.0, 0.0));
    let hip = add(HIP, Some(pelvis), Vec3::new(0.1, 0.0, 0.0));
    let knee = add(KNEE, Some(hip), Vec3::new(0.0, -0.45, 0.03));
    let ankle = add(ANKLE, Some(knee), Vec3::new(0.0, -0.45, -0.03));
    let spine = add(SPINE, Some(pelvis), Vec3::new(0.0, 0.3, 0.0));
    let shoulder = add(SHOULDER, Some(spine), Vec3::new(-0.2, 0.2, 0.0));
    let elbow = add(ELBOW, Some(shoulder), Vec3::new(0.0, -0.3, 0.02));
    let wrist = add(WRIST, Some(elbow), Vec3::new(0.0, -0.3, 0.0));

    skeleton.update_world_transforms();
    let rig = Rig {
        pelvis,
        hip,
        knee,
        ankle,
        spine,
        shoulder,
        elbow,
        wrist,
    };
    (skeleton, rig)
}

/// Local rotation that swings a joint forward by `angle` radians.
#[must_use]
pub fn swing(angle: f32) -> Quat {
    Quat::from_rotation_x(angle)
}
