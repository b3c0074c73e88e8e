//! Keyframe Motion
//!
//! Plays one [`KeyframeAsset`] on one skeleton: binds joint names, keeps
//! per-curve cursors, maps controller time to animation time (looping or
//! clamped), computes the ease weight, deposits the pose, and runs the
//! asset's constraints.

use std::sync::Arc;

use motive_core::{
    AnimationError, AssetId, AssetStatus, BoundingBox, JointHandle, LoadTicket, Skeleton,
    UnsolvableReason,
};
use smallvec::SmallVec;

use crate::asset::{ChannelUsage, HandPose, JointPriority, KeyframeAsset, MAX_CHAIN_LENGTH};
use crate::binding::JointBindings;
use crate::constraint::{ConstraintSolver, JointConstraint};
use crate::curve::KeyframeCursor;
use crate::motion::{InitContext, InitStatus, Motion, MotionContext, MotionEvent, MotionState};
use crate::settings::MotionSettings;

/// Cursors for the position, rotation, and scale curves of one joint.
#[derive(Debug, Clone, Copy, Default)]
struct JointCursors {
    position: KeyframeCursor,
    rotation: KeyframeCursor,
    scale: KeyframeCursor,
}

#[derive(Debug)]
pub struct KeyframeMotion {
    id: AssetId,
    state: MotionState,
    settings: MotionSettings,
    asset: Option<Arc<KeyframeAsset>>,
    load_ticket: Option<Arc<LoadTicket>>,
    bindings: JointBindings,
    cursors: Vec<JointCursors>,
    constraints: Vec<JointConstraint>,
    solver: ConstraintSolver,

    current_time: f32,
    last_update_time: f32,
    last_looped_time: f32,
    loop_count: u32,
    stop_time: Option<f32>,
    ease_weight: f32,
}

impl KeyframeMotion {
    #[must_use]
    pub fn new(id: AssetId) -> Self {
        Self::with_settings(id, MotionSettings::default())
    }

    #[must_use]
    pub fn with_settings(id: AssetId, settings: MotionSettings) -> Self {
        Self {
            id,
            state: MotionState::Uninitialized,
            settings,
            asset: None,
            load_ticket: None,
            bindings: JointBindings::default(),
            cursors: Vec::new(),
            constraints: Vec::new(),
            solver: ConstraintSolver::new(settings.solver),
            current_time: 0.0,
            last_update_time: 0.0,
            last_looped_time: 0.0,
            loop_count: 0,
            stop_time: None,
            ease_weight: 0.0,
        }
    }

    /// Watches a load started on this motion's behalf. Initialization reads
    /// the ticket's status instead of asking the cache.
    pub fn attach_load_ticket(&mut self, ticket: Arc<LoadTicket>) {
        if ticket.id() == self.id {
            self.load_ticket = Some(ticket);
        } else {
            log::warn!("ignoring load ticket for {} on motion {}", ticket.id(), self.id);
        }
    }

    #[inline]
    #[must_use]
    pub fn asset_id(&self) -> AssetId {
        self.id
    }

    #[must_use]
    pub fn asset(&self) -> Option<&Arc<KeyframeAsset>> {
        self.asset.as_ref()
    }

    #[must_use]
    pub fn settings(&self) -> &MotionSettings {
        &self.settings
    }

    /// Animation time of the last update, after loop wrap or clamp.
    #[must_use]
    pub fn current_time(&self) -> f32 {
        self.current_time
    }

    #[must_use]
    pub fn last_update_time(&self) -> f32 {
        self.last_update_time
    }

    /// Controller time at which playback last wrapped.
    #[must_use]
    pub fn last_looped_time(&self) -> f32 {
        self.last_looped_time
    }

    #[must_use]
    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    #[must_use]
    pub fn stop_time(&self) -> Option<f32> {
        self.stop_time
    }

    /// Ease weight of the last update.
    #[must_use]
    pub fn current_ease_weight(&self) -> f32 {
        self.ease_weight
    }

    #[must_use]
    pub fn constraints(&self) -> &[JointConstraint] {
        &self.constraints
    }

    #[must_use]
    pub fn bindings(&self) -> &JointBindings {
        &self.bindings
    }

    #[must_use]
    pub fn hand_pose(&self) -> HandPose {
        self.asset.as_ref().map(|a| a.hand_pose()).unwrap_or_default()
    }

    #[must_use]
    pub fn emote(&self) -> Option<AssetId> {
        self.asset.as_ref().and_then(|a| a.emote())
    }

    #[must_use]
    pub fn pelvis_bbox(&self) -> Option<&BoundingBox> {
        self.asset.as_ref().map(|a| a.pelvis_bbox())
    }

    /// Maps seconds since activation to animation time.
    ///
    /// Looping assets play `[0, loop_out)` once, then repeat
    /// `[loop_in, loop_out)`. Others clamp to `[0, duration]`. The flag is
    /// `true` once a non-looping motion has reached its end.
    #[must_use]
    pub fn effective_time(&self, time: f32) -> (f32, bool) {
        let Some(asset) = &self.asset else {
            return (0.0, true);
        };
        let duration = asset.duration();
        let time = time.max(0.0);

        if asset.is_looping() {
            let span = asset.loop_out() - asset.loop_in();
            if time < asset.loop_out() || span <= f32::EPSILON {
                return (time.min(asset.loop_out().max(asset.loop_in())), false);
            }
            let wrapped = (time - asset.loop_out()).rem_euclid(span);
            return (asset.loop_in() + wrapped, false);
        }

        if time >= duration {
            (duration, true)
        } else {
            (time, false)
        }
    }

    /// Ease weight at `time` seconds since activation.
    ///
    /// Ramps up over the asset's ease-in, and down over its ease-out ending
    /// at the stop time, or at the duration for non-looping assets.
    #[must_use]
    pub fn ease_weight(&self, time: f32) -> f32 {
        let Some(asset) = &self.asset else {
            return 0.0;
        };

        let ease_in = asset.ease_in();
        let fade_in = if ease_in > 0.0 {
            (time / ease_in).clamp(0.0, 1.0)
        } else {
            1.0
        };

        let end = self
            .stop_time
            .or_else(|| (!asset.is_looping()).then_some(asset.duration()));
        let ease_out = asset.ease_out();
        let fade_out = match end {
            Some(end) if ease_out > 0.0 => ((end - time) / ease_out).clamp(0.0, 1.0),
            Some(end) if time > end => 0.0,
            _ => 1.0,
        };

        fade_in * fade_out
    }

    fn loop_count_at(asset: &KeyframeAsset, time: f32) -> u32 {
        let span = asset.loop_out() - asset.loop_in();
        if !asset.is_looping() || span <= f32::EPSILON || time < asset.loop_out() {
            return 0;
        }
        ((time - asset.loop_out()) / span).floor() as u32 + 1
    }

    fn bind(&mut self, asset: &Arc<KeyframeAsset>, skeleton: &Skeleton) {
        let (bindings, errors) = JointBindings::bind(asset, skeleton);
        for error in &errors {
            log::warn!("motion {}: {error}", self.id);
        }
        log::debug!(
            "motion {} bound {}/{} joints (skeleton v{})",
            self.id,
            bindings.resolved_count(),
            bindings.len(),
            skeleton.version()
        );
        self.bindings = bindings;
        self.cursors = vec![JointCursors::default(); asset.joints().len()];
    }

    fn chain_handles(&self, chain: &[usize]) -> Option<SmallVec<[JointHandle; MAX_CHAIN_LENGTH]>> {
        chain.iter().map(|&i| self.bindings.handle(i)).collect()
    }
}

/// Resolved blend priority of each chain joint.
fn chain_priorities(
    asset: &KeyframeAsset,
    chain: &[usize],
) -> SmallVec<[JointPriority; MAX_CHAIN_LENGTH]> {
    let base = asset.priority();
    chain
        .iter()
        .map(|&j| asset.joints().get(j).map_or(base, |joint| joint.priority.resolve(base)))
        .collect()
}

impl Motion for KeyframeMotion {
    fn initialize(&mut self, ctx: &InitContext<'_>) -> InitStatus {
        if self.asset.is_some() {
            return InitStatus::Success;
        }

        if let Some(asset) = ctx.assets.asset(self.id) {
            self.bind(&asset, ctx.skeleton);
            self.constraints = (0..asset.constraints().len()).map(JointConstraint::new).collect();
            self.asset = Some(asset);
            self.load_ticket = None;
            self.state = self.state.transition(MotionEvent::Initialized);
            return InitStatus::Success;
        }

        let status = self
            .load_ticket
            .as_ref()
            .map_or_else(|| ctx.assets.status(self.id), |t| t.status());

        match status {
            AssetStatus::NeedsFetch | AssetStatus::Pending => InitStatus::Hold,
            other => {
                log::warn!("motion {} cannot initialize: asset status {other:?}", self.id);
                self.state = self.state.transition(MotionEvent::InitializeFailed);
                InitStatus::Failure
            }
        }
    }

    fn activate(&mut self) -> bool {
        if self.asset.is_none() {
            return false;
        }
        let next = self.state.transition(MotionEvent::Activated);
        if next != MotionState::Active {
            return false;
        }
        self.state = next;
        self.current_time = 0.0;
        self.last_update_time = 0.0;
        self.last_looped_time = 0.0;
        self.loop_count = 0;
        self.stop_time = None;
        self.ease_weight = 0.0;
        self.cursors.iter_mut().for_each(|c| *c = JointCursors::default());
        self.constraints.iter_mut().for_each(JointConstraint::reset);
        true
    }

    fn update(&mut self, time: f32, ctx: &mut MotionContext<'_>) -> bool {
        if self.state != MotionState::Active {
            return false;
        }
        let Some(asset) = self.asset.clone() else {
            return false;
        };

        if self.bindings.is_stale(ctx.skeleton) {
            self.bind(&asset, ctx.skeleton);
        }

        let (local, clamped) = self.effective_time(time);
        let loops = Self::loop_count_at(&asset, time);
        if loops > self.loop_count {
            self.loop_count = loops;
            self.last_looped_time = time;
        }

        let weight = self.ease_weight(time);
        self.ease_weight = weight;
        self.current_time = local;
        self.last_update_time = time;

        let duration = asset.duration();
        let base = asset.priority();
        for (index, joint) in asset.joints().iter().enumerate() {
            let Some(handle) = self.bindings.handle(index) else {
                continue;
            };
            let cursors = &mut self.cursors[index];
            let priority = joint.priority.resolve(base);

            if joint.usage.contains(ChannelUsage::POSITION)
                && let Some(v) = joint
                    .position
                    .value_with_cursor(local, duration, &mut cursors.position)
            {
                ctx.pose.blend_position(handle, priority, weight, v);
            }
            if joint.usage.contains(ChannelUsage::ROTATION)
                && let Some(q) = joint
                    .rotation
                    .value_with_cursor(local, duration, &mut cursors.rotation)
            {
                ctx.pose.blend_rotation(handle, priority, weight, q);
            }
            if joint.usage.contains(ChannelUsage::SCALE)
                && let Some(s) = joint.scale.value_with_cursor(local, duration, &mut cursors.scale)
            {
                ctx.pose.blend_scale(handle, priority, weight, s);
            }
        }

        let stopped = self.stop_time.is_some_and(|stop| time >= stop);
        if clamped || stopped {
            log::debug!("motion {} completed at t={time:.3}", self.id);
            self.state = self.state.transition(MotionEvent::Completed);
            return false;
        }
        true
    }

    fn apply_constraints(&mut self, _time: f32, ctx: &mut MotionContext<'_>) {
        if self.state != MotionState::Active || !self.settings.constraints_enabled {
            return;
        }
        let Some(asset) = self.asset.clone() else {
            return;
        };

        for i in 0..self.constraints.len() {
            let shared = &asset.constraints()[self.constraints[i].shared_index()];
            let priorities = chain_priorities(&asset, &shared.chain);
            let result = match self.chain_handles(&shared.chain) {
                Some(chain) => self.solver.solve(
                    &mut self.constraints[i],
                    shared,
                    &chain,
                    &priorities,
                    self.current_time,
                    self.ease_weight,
                    ctx,
                ),
                None => Err(AnimationError::ConstraintUnsolvable(UnsolvableReason::UnboundJoint)),
            };

            let error = result.err();
            if self.constraints[i].record_error(error.clone())
                && let Some(error) = error
            {
                log::warn!("motion {} constraint {i}: {error}", self.id);
            }
        }
    }

    fn deactivate(&mut self) {
        self.state = self.state.transition(MotionEvent::Deactivated);
        for constraint in &mut self.constraints {
            constraint.reset();
        }
    }

    fn state(&self) -> MotionState {
        self.state
    }

    fn priority(&self) -> JointPriority {
        self.asset
            .as_ref()
            .map_or(JointPriority::Low, |a| a.priority())
    }

    fn duration(&self) -> f32 {
        self.asset.as_ref().map_or(0.0, |a| a.duration())
    }

    fn ease_in_duration(&self) -> f32 {
        self.asset.as_ref().map_or(0.0, |a| a.ease_in())
    }

    fn ease_out_duration(&self) -> f32 {
        self.asset.as_ref().map_or(0.0, |a| a.ease_out())
    }

    fn is_looping(&self) -> bool {
        self.asset.as_ref().is_some_and(|a| a.is_looping())
    }

    fn set_stop_time(&mut self, time: f32) {
        self.stop_time = Some(time);
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
