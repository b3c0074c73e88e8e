//! Motion Controller
//!
//! Owns the motions playing on one character and runs each tick in two
//! phases:
//!
//! 1. every active motion deposits its keyframed pose into the shared
//!    [`PoseBuffer`]; the buffer is applied and world transforms refreshed,
//! 2. every motion still active runs its constraints against that pose; the
//!    buffer, now carrying rotation overrides, is applied again.
//!
//! Motions whose asset is still loading are held and retried each tick.

use slotmap::{SlotMap, new_key_type};

use motive_core::Skeleton;

use crate::motion::{AssetLookup, InitContext, InitStatus, Motion, MotionContext, MotionState};
use crate::pose::PoseBuffer;
use crate::world::CharacterWorld;

new_key_type! {
    pub struct MotionKey;
}

struct MotionSlot {
    motion: Box<dyn Motion>,
    /// Controller time the motion was activated at.
    start_time: f32,
    /// Start was requested while the asset was still loading.
    held: bool,
}

impl MotionSlot {
    fn local_time(&self, now: f32) -> f32 {
        now - self.start_time
    }
}

#[derive(Default)]
pub struct MotionController {
    motions: SlotMap<MotionKey, MotionSlot>,
    pose: PoseBuffer,
    ticked: Vec<MotionKey>,
}

impl MotionController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_motion(&mut self, motion: impl Motion + 'static) -> MotionKey {
        self.motions.insert(MotionSlot {
            motion: Box::new(motion),
            start_time: 0.0,
            held: false,
        })
    }

    pub fn remove_motion(&mut self, key: MotionKey) -> Option<Box<dyn Motion>> {
        self.motions.remove(key).map(|slot| slot.motion)
    }

    #[must_use]
    pub fn motion(&self, key: MotionKey) -> Option<&dyn Motion> {
        self.motions.get(key).map(|slot| slot.motion.as_ref())
    }

    /// Downcasts a motion to its concrete type.
    #[must_use]
    pub fn motion_as<T: 'static>(&self, key: MotionKey) -> Option<&T> {
        self.motions.get(key)?.motion.as_any().downcast_ref::<T>()
    }

    pub fn motion_as_mut<T: 'static>(&mut self, key: MotionKey) -> Option<&mut T> {
        self.motions.get_mut(key)?.motion.as_any_mut().downcast_mut::<T>()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.motions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.motions.is_empty()
    }

    #[must_use]
    pub fn is_active(&self, key: MotionKey) -> bool {
        self.motions
            .get(key)
            .is_some_and(|slot| slot.motion.state() == MotionState::Active)
    }

    /// The motion's start is waiting on an asset load.
    #[must_use]
    pub fn is_held(&self, key: MotionKey) -> bool {
        self.motions.get(key).is_some_and(|slot| slot.held)
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.motions
            .values()
            .filter(|slot| slot.motion.state() == MotionState::Active)
            .count()
    }

    /// Pose buffer of the last tick.
    #[must_use]
    pub fn pose(&self) -> &PoseBuffer {
        &self.pose
    }

    /// Initializes (if needed) and activates a motion at controller time `now`.
    ///
    /// A motion waiting on its asset returns [`InitStatus::Hold`] and starts
    /// on the first tick after the asset arrives.
    pub fn start_motion(
        &mut self,
        key: MotionKey,
        now: f32,
        assets: &dyn AssetLookup,
        skeleton: &Skeleton,
    ) -> InitStatus {
        let Some(slot) = self.motions.get_mut(key) else {
            return InitStatus::Failure;
        };

        let ctx = InitContext { assets, skeleton };
        let status = slot.motion.initialize(&ctx);
        match status {
            InitStatus::Success => {
                slot.held = false;
                if slot.motion.activate() {
                    slot.start_time = now;
                } else {
                    log::warn!("motion could not be activated");
                    return InitStatus::Failure;
                }
            }
            InitStatus::Hold => slot.held = true,
            InitStatus::Failure => slot.held = false,
        }
        status
    }

    /// Schedules an ease-out ending now plus the motion's ease-out duration.
    pub fn stop_motion(&mut self, key: MotionKey, now: f32) -> bool {
        let Some(slot) = self.motions.get_mut(key) else {
            return false;
        };
        slot.held = false;
        if slot.motion.state() != MotionState::Active {
            return false;
        }
        let stop = slot.local_time(now) + slot.motion.ease_out_duration();
        slot.motion.set_stop_time(stop);
        true
    }

    /// Stops a motion immediately, without easing out.
    pub fn deactivate_motion(&mut self, key: MotionKey) {
        if let Some(slot) = self.motions.get_mut(key) {
            slot.held = false;
            slot.motion.deactivate();
        }
    }

    /// Advances every motion to controller time `now` and writes the
    /// resulting pose into `skeleton`.
    pub fn update(
        &mut self,
        now: f32,
        skeleton: &mut Skeleton,
        assets: &dyn AssetLookup,
        world: &dyn CharacterWorld,
    ) {
        self.retry_held(now, assets, skeleton);

        self.pose.begin_tick();
        self.ticked.clear();

        let mut ctx = MotionContext {
            skeleton,
            pose: &mut self.pose,
            world,
        };

        for (key, slot) in &mut self.motions {
            if slot.motion.state() != MotionState::Active {
                continue;
            }
            let time = slot.local_time(now);
            if slot.motion.update(time, &mut ctx) {
                self.ticked.push(key);
            } else {
                slot.motion.deactivate();
            }
        }

        Self::write_pose(&mut ctx);

        for &key in &self.ticked {
            if let Some(slot) = self.motions.get_mut(key) {
                let time = slot.local_time(now);
                slot.motion.apply_constraints(time, &mut ctx);
            }
        }

        Self::write_pose(&mut ctx);
    }

    fn retry_held(&mut self, now: f32, assets: &dyn AssetLookup, skeleton: &Skeleton) {
        let held: Vec<MotionKey> = self
            .motions
            .iter()
            .filter(|(_, slot)| slot.held)
            .map(|(key, _)| key)
            .collect();
        for key in held {
            if self.start_motion(key, now, assets, skeleton) == InitStatus::Success {
                log::debug!("held motion started at t={now:.3}");
            }
        }
    }

    fn write_pose(ctx: &mut MotionContext<'_>) {
        ctx.skeleton.reset_to_rest();
        ctx.pose.apply(ctx.skeleton);
        ctx.skeleton.update_world_transforms();
    }
}
