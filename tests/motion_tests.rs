//! Motion Playback Tests
//!
//! Tests for:
//! - KeyframeMotion lifecycle (Uninitialized → Ready → Active → Inactive)
//! - Ease-in/ease-out weights and stop times
//! - Loop time mapping and loop counting
//! - MotionController hold/retry, priority blending, and rebinding

use std::sync::Arc;

use glam::{Quat, Vec3};

use motive::animation::{
    AssetLookup, EmptyWorld, InitContext, InitStatus, JointPriority, KeyframeMotion, Motion,
    MotionController, MotionEvent, MotionState,
};
use motive::assets::KeyframeCache;
use motive::{AssetId, AssetStatus, LoadTicket, Skeleton};
use motive_dev_utils::rig::{self, KNEE, PELVIS, Rig};
use motive_dev_utils::{approx_quat, approx_vec3, humanoid, samples};

const EPSILON: f32 = 1e-4;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn initialized(cache: &KeyframeCache, skeleton: &Skeleton, id: AssetId) -> KeyframeMotion {
    let mut motion = KeyframeMotion::new(id);
    let status = motion.initialize(&InitContext {
        assets: cache,
        skeleton,
    });
    assert_eq!(status, InitStatus::Success);
    motion
}

fn knee_rotation(skeleton: &Skeleton, rig: &Rig) -> Quat {
    skeleton.local_transform(rig.knee).unwrap().rotation
}

// ============================================================================
// State machine
// ============================================================================

#[test]
fn transition_table() {
    use MotionEvent as E;
    use MotionState as S;
    assert_eq!(S::Uninitialized.transition(E::Initialized), S::Ready);
    assert_eq!(S::Uninitialized.transition(E::Activated), S::Uninitialized);
    assert_eq!(S::Uninitialized.transition(E::Deactivated), S::Inactive);
    assert_eq!(S::Ready.transition(E::Activated), S::Active);
    assert_eq!(S::Active.transition(E::Completed), S::Inactive);
    assert_eq!(S::Active.transition(E::Deactivated), S::Inactive);
    assert_eq!(S::Inactive.transition(E::Activated), S::Active);
    assert_eq!(S::Ready.transition(E::Completed), S::Ready);
}

#[test]
fn initialize_reports_hold_then_success() {
    let cache = KeyframeCache::new();
    let (skeleton, _) = humanoid();
    let id = AssetId::from_name("slide");
    let mut motion = KeyframeMotion::new(id);
    let ctx = InitContext {
        assets: &cache,
        skeleton: &skeleton,
    };

    cache.mark_pending(id);
    assert_eq!(motion.initialize(&ctx), InitStatus::Hold);
    assert_eq!(motion.state(), MotionState::Uninitialized);
    assert!(!motion.activate());

    cache.add_asset(id, samples::pelvis_slide(1.0));
    assert_eq!(motion.initialize(&ctx), InitStatus::Success);
    assert_eq!(motion.state(), MotionState::Ready);
    assert!(motion.activate());
    assert_eq!(motion.state(), MotionState::Active);
}

#[test]
fn initialize_fails_for_unknown_or_corrupt_assets() {
    let cache = KeyframeCache::new();
    let (skeleton, _) = humanoid();
    let ctx = InitContext {
        assets: &cache,
        skeleton: &skeleton,
    };

    let mut unknown = KeyframeMotion::new(AssetId::from_name("missing"));
    assert_eq!(unknown.initialize(&ctx), InitStatus::Failure);
    assert_eq!(unknown.state(), MotionState::Uninitialized);

    let corrupt_id = AssetId::from_name("corrupt");
    cache.record_failure(corrupt_id, AssetStatus::Corrupt);
    assert_eq!(cache.status(corrupt_id), AssetStatus::Corrupt);
    let mut corrupt = KeyframeMotion::new(corrupt_id);
    assert_eq!(corrupt.initialize(&ctx), InitStatus::Failure);
}

#[test]
fn load_ticket_status_is_preferred_over_cache_status() {
    let cache = KeyframeCache::new();
    let (skeleton, _) = humanoid();
    let id = AssetId::from_name("ticketed");
    let ticket = Arc::new(LoadTicket::new(id, AssetStatus::Pending));
    let mut motion = KeyframeMotion::new(id);
    motion.attach_load_ticket(Arc::clone(&ticket));
    let ctx = InitContext {
        assets: &cache,
        skeleton: &skeleton,
    };

    assert_eq!(cache.status(id), AssetStatus::Undefined);
    assert_eq!(motion.initialize(&ctx), InitStatus::Hold);

    ticket.set_status(AssetStatus::FetchFailed);
    assert_eq!(motion.initialize(&ctx), InitStatus::Failure);
}

// ============================================================================
// Time mapping
// ============================================================================

#[test]
fn ease_weights_ramp_in_and_out() {
    let cache = KeyframeCache::new();
    let (skeleton, _) = humanoid();
    let id = AssetId::from_name("eased");
    let mut asset = samples::pelvis_slide(1.0);
    asset.set_ease_in(0.2);
    asset.set_ease_out(0.2);
    cache.add_asset(id, asset);

    let motion = initialized(&cache, &skeleton, id);
    assert!(approx(motion.ease_weight(0.1), 0.5));
    assert!(approx(motion.ease_weight(0.5), 1.0));
    assert!(approx(motion.ease_weight(0.9), 0.5));
    assert!(approx(motion.ease_weight(1.0), 0.0));
}

#[test]
fn non_looping_time_clamps_and_reports_completion() {
    let cache = KeyframeCache::new();
    let (skeleton, _) = humanoid();
    let id = AssetId::from_name("slide");
    cache.add_asset(id, samples::pelvis_slide(1.0));

    let motion = initialized(&cache, &skeleton, id);
    assert_eq!(motion.effective_time(0.4), (0.4, false));
    assert_eq!(motion.effective_time(1.0), (1.0, true));
    assert_eq!(motion.effective_time(3.0), (1.0, true));
}

#[test]
fn looping_time_plays_intro_then_wraps_seamlessly() {
    let cache = KeyframeCache::new();
    let (skeleton, _) = humanoid();
    let id = AssetId::from_name("walk");
    cache.add_asset(id, samples::walk_cycle());
    let motion = initialized(&cache, &skeleton, id);
    let asset = cache.get_asset(id).unwrap();

    // Intro plays once from zero.
    let (t, done) = motion.effective_time(0.3);
    assert!(approx(t, 0.3) && !done);

    let eps = 0.05;
    let (after_out, _) = motion.effective_time(asset.loop_out() + eps);
    let (after_in, _) = motion.effective_time(asset.loop_in() + eps);
    assert!(approx(after_out, after_in));

    for joint in asset.joints() {
        if let (Some(a), Some(b)) = (
            joint.rotation.value_at(after_out, asset.duration()),
            joint.rotation.value_at(after_in, asset.duration()),
        ) {
            assert!(approx_quat(a, b, 1e-5), "joint {}", joint.name);
        }
    }
}

#[test]
fn loop_count_and_last_looped_time_advance() {
    let cache = KeyframeCache::new();
    let (mut skeleton, _) = humanoid();
    let id = AssetId::from_name("walk");
    cache.add_asset(id, samples::walk_cycle());

    let mut controller = MotionController::new();
    let key = controller.add_motion(KeyframeMotion::new(id));
    assert_eq!(controller.start_motion(key, 0.0, &cache, &skeleton), InitStatus::Success);

    for now in [0.4, 1.2, 1.6, 2.0, 2.7] {
        controller.update(now, &mut skeleton, &cache, &EmptyWorld);
    }
    let motion = controller.motion_as::<KeyframeMotion>(key).unwrap();
    assert_eq!(motion.loop_count(), 2);
    assert!(approx(motion.last_looped_time(), 2.7));
    assert!(approx(motion.last_update_time(), 2.7));
    assert!(controller.is_active(key));
}

// ============================================================================
// Controller
// ============================================================================

#[test]
fn controller_writes_keyframed_pose() {
    let cache = KeyframeCache::new();
    let (mut skeleton, rig) = humanoid();
    let id = AssetId::from_name("slide");
    cache.add_asset(id, samples::pelvis_slide(1.0));

    let mut controller = MotionController::new();
    let key = controller.add_motion(KeyframeMotion::new(id));
    controller.start_motion(key, 0.0, &cache, &skeleton);
    controller.update(0.5, &mut skeleton, &cache, &EmptyWorld);

    let pelvis = skeleton.local_transform(rig.pelvis).unwrap();
    assert!(approx_vec3(pelvis.position, Vec3::new(0.5, 1.0, 0.0), EPSILON));
    // Children follow through the refreshed world transforms.
    let hip = skeleton.world_position(rig.hip).unwrap();
    assert!(approx_vec3(hip, Vec3::new(0.6, 1.0, 0.0), EPSILON));
    assert_eq!(skeleton.find_joint(PELVIS), Some(rig.pelvis));
}

#[test]
fn controller_completes_non_looping_motion() {
    let cache = KeyframeCache::new();
    let (mut skeleton, rig) = humanoid();
    let id = AssetId::from_name("slide");
    cache.add_asset(id, samples::pelvis_slide(1.0));

    let mut controller = MotionController::new();
    let key = controller.add_motion(KeyframeMotion::new(id));
    controller.start_motion(key, 10.0, &cache, &skeleton);

    controller.update(10.5, &mut skeleton, &cache, &EmptyWorld);
    assert!(controller.is_active(key));

    controller.update(11.0, &mut skeleton, &cache, &EmptyWorld);
    assert!(!controller.is_active(key));
    assert_eq!(controller.motion(key).unwrap().state(), MotionState::Inactive);
    // The final tick still lands on the last key.
    let pelvis = skeleton.local_transform(rig.pelvis).unwrap();
    assert!(approx_vec3(pelvis.position, Vec3::new(1.0, 1.0, 0.0), EPSILON));

    // Nothing contributes any more: the rest pose comes back.
    controller.update(11.5, &mut skeleton, &cache, &EmptyWorld);
    let pelvis = skeleton.local_transform(rig.pelvis).unwrap();
    assert!(approx_vec3(pelvis.position, Vec3::new(0.0, 1.0, 0.0), EPSILON));
}

#[test]
fn controller_holds_until_asset_arrives() {
    let cache = KeyframeCache::new();
    let (mut skeleton, rig) = humanoid();
    let id = AssetId::from_name("late");
    cache.mark_pending(id);

    let mut controller = MotionController::new();
    let key = controller.add_motion(KeyframeMotion::new(id));
    assert_eq!(controller.start_motion(key, 0.0, &cache, &skeleton), InitStatus::Hold);
    assert!(controller.is_held(key));

    controller.update(0.1, &mut skeleton, &cache, &EmptyWorld);
    assert!(controller.is_held(key));
    assert!(!controller.is_active(key));

    cache.add_asset(id, samples::pelvis_slide(1.0));
    controller.update(0.2, &mut skeleton, &cache, &EmptyWorld);
    assert!(!controller.is_held(key));
    assert!(controller.is_active(key));

    // Started at 0.2, so local time 0.5 arrives at 0.7.
    controller.update(0.7, &mut skeleton, &cache, &EmptyWorld);
    let pelvis = skeleton.local_transform(rig.pelvis).unwrap();
    assert!(approx_vec3(pelvis.position, Vec3::new(0.5, 1.0, 0.0), EPSILON));
}

#[test]
fn deactivating_an_unloaded_motion_makes_it_inactive() {
    let cache = KeyframeCache::new();
    let (skeleton, _) = humanoid();
    let id = AssetId::from_name("late");
    let ctx = InitContext {
        assets: &cache,
        skeleton: &skeleton,
    };

    let mut motion = KeyframeMotion::new(id);
    assert_eq!(motion.initialize(&ctx), InitStatus::Failure);
    motion.deactivate();
    assert_eq!(motion.state(), MotionState::Inactive);
    // Still no asset, so it cannot play.
    assert!(!motion.activate());
    assert_eq!(motion.state(), MotionState::Inactive);

    // Once the asset shows up the motion initializes and plays.
    cache.add_asset(id, samples::pelvis_slide(1.0));
    assert_eq!(motion.initialize(&ctx), InitStatus::Success);
    assert!(motion.activate());
    assert_eq!(motion.state(), MotionState::Active);
}

#[test]
fn controller_drops_hold_when_load_fails() {
    let cache = KeyframeCache::new();
    let (mut skeleton, _) = humanoid();
    let id = AssetId::from_name("doomed");
    cache.mark_pending(id);

    let mut controller = MotionController::new();
    let key = controller.add_motion(KeyframeMotion::new(id));
    controller.start_motion(key, 0.0, &cache, &skeleton);
    cache.record_failure(id, AssetStatus::FetchFailed);

    controller.update(0.1, &mut skeleton, &cache, &EmptyWorld);
    assert!(!controller.is_held(key));
    assert!(!controller.is_active(key));
    assert_eq!(controller.motion(key).unwrap().state(), MotionState::Uninitialized);
}

#[test]
fn higher_priority_overrides_lower() {
    let cache = KeyframeCache::new();
    let (mut skeleton, rig) = humanoid();
    let low = AssetId::from_name("low");
    let high = AssetId::from_name("high");
    cache.add_asset(low, samples::knee_bend(-0.5, JointPriority::Low));
    cache.add_asset(high, samples::knee_bend(0.5, JointPriority::High));

    let mut controller = MotionController::new();
    // Start order must not matter.
    let h = controller.add_motion(KeyframeMotion::new(high));
    let l = controller.add_motion(KeyframeMotion::new(low));
    controller.start_motion(h, 0.0, &cache, &skeleton);
    controller.start_motion(l, 0.0, &cache, &skeleton);
    controller.update(0.5, &mut skeleton, &cache, &EmptyWorld);

    assert!(approx_quat(knee_rotation(&skeleton, &rig), rig::swing(0.5), EPSILON));
}

#[test]
fn equal_priority_averages() {
    let cache = KeyframeCache::new();
    let (mut skeleton, rig) = humanoid();
    let a = AssetId::from_name("a");
    let b = AssetId::from_name("b");
    cache.add_asset(a, samples::knee_bend(0.2, JointPriority::Medium));
    cache.add_asset(b, samples::knee_bend(0.6, JointPriority::Medium));

    let mut controller = MotionController::new();
    for id in [a, b] {
        let key = controller.add_motion(KeyframeMotion::new(id));
        controller.start_motion(key, 0.0, &cache, &skeleton);
    }
    controller.update(0.5, &mut skeleton, &cache, &EmptyWorld);

    assert!(approx_quat(knee_rotation(&skeleton, &rig), rig::swing(0.4), EPSILON));
}

#[test]
fn easing_in_higher_priority_fades_over_lower() {
    let cache = KeyframeCache::new();
    let (mut skeleton, rig) = humanoid();
    let base = AssetId::from_name("base");
    let overlay = AssetId::from_name("overlay");
    cache.add_asset(base, samples::knee_bend(0.0, JointPriority::Low));
    let mut fading = samples::knee_bend(0.8, JointPriority::High);
    fading.set_ease_in(1.0);
    cache.add_asset(overlay, fading);

    let mut controller = MotionController::new();
    for id in [base, overlay] {
        let key = controller.add_motion(KeyframeMotion::new(id));
        controller.start_motion(key, 0.0, &cache, &skeleton);
    }
    controller.update(0.5, &mut skeleton, &cache, &EmptyWorld);

    assert!(approx_quat(knee_rotation(&skeleton, &rig), rig::swing(0.4), EPSILON));
}

#[test]
fn stop_motion_eases_out_then_completes() {
    let cache = KeyframeCache::new();
    let (mut skeleton, _) = humanoid();
    let id = AssetId::from_name("walk");
    cache.add_asset(id, samples::walk_cycle());

    let mut controller = MotionController::new();
    let key = controller.add_motion(KeyframeMotion::new(id));
    controller.start_motion(key, 0.0, &cache, &skeleton);
    controller.update(1.0, &mut skeleton, &cache, &EmptyWorld);

    assert!(controller.stop_motion(key, 1.0));
    let motion = controller.motion_as::<KeyframeMotion>(key).unwrap();
    let stop = motion.stop_time().unwrap();
    assert!(approx(stop, 1.2));
    assert!(approx(motion.ease_weight(1.1), 0.5));

    controller.update(1.1, &mut skeleton, &cache, &EmptyWorld);
    assert!(controller.is_active(key));
    controller.update(1.25, &mut skeleton, &cache, &EmptyWorld);
    assert!(!controller.is_active(key));

    // A finished motion can be started again.
    assert_eq!(controller.start_motion(key, 2.0, &cache, &skeleton), InitStatus::Success);
    assert!(controller.is_active(key));
    let motion = controller.motion_as::<KeyframeMotion>(key).unwrap();
    assert!(motion.stop_time().is_none());
}

#[test]
fn topology_change_triggers_rebind() {
    let cache = KeyframeCache::new();
    let (mut skeleton, rig) = humanoid();
    let id = AssetId::from_name("bend");
    cache.add_asset(id, samples::knee_bend(0.7, JointPriority::Low));

    let mut controller = MotionController::new();
    let key = controller.add_motion(KeyframeMotion::new(id));
    controller.start_motion(key, 0.0, &cache, &skeleton);
    controller.update(0.1, &mut skeleton, &cache, &EmptyWorld);
    assert!(approx_quat(knee_rotation(&skeleton, &rig), rig::swing(0.7), EPSILON));

    assert!(skeleton.rename_joint(rig.knee, "knee_left"));
    controller.update(0.2, &mut skeleton, &cache, &EmptyWorld);
    assert!(approx_quat(knee_rotation(&skeleton, &rig), Quat::IDENTITY, EPSILON));
    let motion = controller.motion_as::<KeyframeMotion>(key).unwrap();
    assert_eq!(motion.bindings().resolved_count(), 0);
    assert!(controller.is_active(key));

    assert!(skeleton.rename_joint(rig.knee, KNEE));
    controller.update(0.3, &mut skeleton, &cache, &EmptyWorld);
    assert!(approx_quat(knee_rotation(&skeleton, &rig), rig::swing(0.7), EPSILON));
}

#[test]
fn cache_lookup_is_shared_with_motions() {
    let cache = KeyframeCache::new();
    let (skeleton, _) = humanoid();
    let id = AssetId::from_name("shared");
    cache.add_asset(id, samples::pelvis_slide(2.0));

    let motion = initialized(&cache, &skeleton, id);
    let held = Arc::clone(motion.asset().unwrap());
    cache.remove_asset(id);
    assert!(AssetLookup::asset(&cache, id).is_none());
    assert_eq!(held.duration(), 2.0);
    assert_eq!(motion.duration(), 2.0);
}
