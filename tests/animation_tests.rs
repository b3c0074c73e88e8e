//! Curve Tests
//!
//! Tests for:
//! - Linear, step, and spline sampling of position and rotation curves
//! - Exact key values at key times
//! - Cursor reuse across forward and backward seeks
//! - Synthetic loop keys derived from asset loop points

use glam::{Quat, Vec3};

use motive::animation::{
    Curve, Interpolatable, InterpolationMode, JointMotion, KeyframeAsset, KeyframeCursor,
    PositionCurve, RotationCurve,
};

const EPSILON: f32 = 1e-5;

fn linear(keys: &[(f32, Vec3)]) -> PositionCurve {
    Curve::from_keys(keys, InterpolationMode::Linear).unwrap()
}

// ============================================================================
// Linear
// ============================================================================

#[test]
fn linear_midpoint_of_unit_slide() {
    let curve = linear(&[(0.0, Vec3::ZERO), (1.0, Vec3::X)]);
    let v = curve.value_at(0.5, 1.0).unwrap();
    assert!(v.abs_diff_eq(Vec3::new(0.5, 0.0, 0.0), EPSILON), "got {v}");
}

#[test]
fn linear_returns_key_values_exactly_at_key_times() {
    let keys = [
        (0.0, Vec3::new(0.1, 0.2, 0.3)),
        (0.37, Vec3::new(-4.0, 1.5, 9.0)),
        (0.81, Vec3::new(2.25, -3.0, 0.5)),
        (1.0, Vec3::new(7.0, 7.0, 7.0)),
    ];
    let curve = linear(&keys);
    let mut cursor = KeyframeCursor::default();
    for (time, value) in keys {
        assert_eq!(curve.value_at(time, 1.0), Some(value));
        assert_eq!(curve.value_with_cursor(time, 1.0, &mut cursor), Some(value));
    }
}

#[test]
fn linear_clamps_outside_keys_without_loop_keys() {
    let curve = linear(&[(0.2, Vec3::ONE), (0.6, Vec3::ZERO)]);
    assert_eq!(curve.value_at(0.0, 1.0), Some(Vec3::ONE));
    assert_eq!(curve.value_at(0.9, 1.0), Some(Vec3::ZERO));
}

#[test]
fn linear_rotation_stays_normalized() {
    let curve: RotationCurve = Curve::from_keys(
        &[(0.0, Quat::IDENTITY), (1.0, Quat::from_rotation_z(1.2))],
        InterpolationMode::Linear,
    )
    .unwrap();
    for step in 0..=10 {
        let q = curve.value_at(step as f32 * 0.1, 1.0).unwrap();
        assert!((q.length() - 1.0).abs() < EPSILON);
    }
    let mid = curve.value_at(0.5, 1.0).unwrap();
    assert!(mid.abs_diff_eq(Quat::from_rotation_z(0.6), 1e-3));
}

// ============================================================================
// Step
// ============================================================================

#[test]
fn step_is_constant_between_keys_and_changes_at_key_times() {
    let a = Vec3::new(1.0, 0.0, 0.0);
    let b = Vec3::new(0.0, 2.0, 0.0);
    let c = Vec3::new(0.0, 0.0, 3.0);
    let curve = Curve::from_keys(&[(0.0, a), (1.0, b), (2.0, c)], InterpolationMode::Step).unwrap();

    for t in [0.0, 0.25, 0.5, 0.999] {
        assert_eq!(curve.value_at(t, 2.0), Some(a), "t = {t}");
    }
    for t in [1.0, 1.5, 1.999] {
        assert_eq!(curve.value_at(t, 2.0), Some(b), "t = {t}");
    }
    assert_eq!(curve.value_at(2.0, 2.0), Some(c));
}

// ============================================================================
// Spline
// ============================================================================

#[test]
fn spline_passes_through_keys() {
    let keys = [
        (0.0, Vec3::ZERO),
        (0.5, Vec3::new(1.0, 2.0, 0.0)),
        (1.0, Vec3::new(0.0, 1.0, 1.0)),
    ];
    let curve = Curve::from_keys(&keys, InterpolationMode::Spline).unwrap();
    for (time, value) in keys {
        assert!(curve.value_at(time, 1.0).unwrap().abs_diff_eq(value, EPSILON));
    }
}

#[test]
fn spline_reproduces_evenly_spaced_linear_motion() {
    let keys: Vec<(f32, Vec3)> = (0..4).map(|i| (i as f32, Vec3::X * i as f32)).collect();
    let curve = Curve::from_keys(&keys, InterpolationMode::Spline).unwrap();
    for t in [0.25, 1.5, 2.75] {
        let v = curve.value_at(t, 3.0).unwrap();
        assert!(v.abs_diff_eq(Vec3::X * t, 1e-4), "t = {t}: {v}");
    }
}

#[test]
fn spline_rotation_is_unit_length() {
    let curve: RotationCurve = Curve::from_keys(
        &[
            (0.0, Quat::IDENTITY),
            (0.5, Quat::from_rotation_x(0.8)),
            (1.0, -Quat::from_rotation_x(1.4)),
        ],
        InterpolationMode::Spline,
    )
    .unwrap();
    for step in 0..=20 {
        let q = curve.value_at(step as f32 * 0.05, 1.0).unwrap();
        assert!((q.length() - 1.0).abs() < 1e-4);
    }
}

// ============================================================================
// Cursor
// ============================================================================

#[test]
fn cursor_handles_long_forward_and_backward_jumps() {
    let keys: Vec<(f32, Vec3)> = (0..64).map(|i| (i as f32 * 0.1, Vec3::Y * i as f32)).collect();
    let curve = linear(&keys);
    let mut cursor = KeyframeCursor::default();

    for t in [0.05, 5.05, 0.15, 3.35, 3.45, 6.25] {
        let a = curve.value_with_cursor(t, 6.3, &mut cursor).unwrap();
        let b = curve.value_at(t, 6.3).unwrap();
        assert!(a.abs_diff_eq(b, EPSILON), "t = {t}");
    }
}

// ============================================================================
// Loop keys
// ============================================================================

#[test]
fn looping_asset_derives_loop_keys() {
    let curve = linear(&[(0.25, Vec3::ZERO), (0.75, Vec3::new(2.0, 0.0, 0.0))]);
    let joint = JointMotion::new("root").with_position(curve);
    let mut asset = KeyframeAsset::new(1.0, vec![joint]);
    assert!(!asset.joints()[0].position.has_loop_keys());

    asset.set_loop(true);
    let position = &asset.joints()[0].position;
    assert!(position.has_loop_keys());

    // Between the last key and the duration the curve heads back toward
    // its value at the loop-in point.
    let v = position.value_at(0.875, 1.0).unwrap();
    assert!(v.abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), EPSILON), "got {v}");

    asset.set_loop(false);
    assert!(!asset.joints()[0].position.has_loop_keys());
}

#[test]
fn interpolatable_vec3_linear_endpoints() {
    let a = Vec3::new(1.0, 2.0, 3.0);
    let b = Vec3::new(-2.0, 0.5, 8.0);
    assert_eq!(Vec3::interpolate_linear(a, b, 0.0), a);
    assert!(Vec3::interpolate_linear(a, b, 1.0).abs_diff_eq(b, EPSILON));
}
