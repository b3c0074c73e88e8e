//! Shared fixtures for Motive tests and benches.
//!
//! - [`rig`]: a small humanoid skeleton with a bent leg and arm
//! - [`samples`]: keyframe assets exercising curves, priorities, and
//!   constraints on that rig
//! - [`world`]: deterministic [`CharacterWorld`](motive_animation::CharacterWorld)
//!   implementations

pub mod rig;
pub mod samples;
pub mod world;

pub use rig::{Rig, humanoid};
pub use world::{FlatGround, VolumeWorld};

/// `true` when `a` and `b` differ by at most `eps` in every component.
#[must_use]
pub fn approx_vec3(a: glam::Vec3, b: glam::Vec3, eps: f32) -> bool {
    (a - b).abs().max_element() <= eps
}

/// Rotation equality up to sign.
#[must_use]
pub fn approx_quat(a: glam::Quat, b: glam::Quat, eps: f32) -> bool {
    a.dot(b).abs() >= 1.0 - eps
}
