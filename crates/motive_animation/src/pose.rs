//! Pose Buffer
//!
//! Motions never write the skeleton directly. Each tick they deposit
//! `(priority, weight, value)` contributions per joint channel here, and the
//! buffer resolves them in one place:
//!
//! 1. Contributions are grouped by priority, lowest first.
//! 2. Each group's weighted average is blended over the result of the groups
//!    below it, by the group's total weight clamped to 1.
//! 3. Constraint rotation overrides replace the resolved rotation, unless a
//!    higher-priority motion keyframes that rotation.
//!
//! The result does not depend on the order motions were updated in.
//! Channels nobody touched keep the joint's rest value.

use bitflags::bitflags;
use glam::{Quat, Vec3};
use motive_core::{JointHandle, Skeleton, Transform};
use slotmap::SecondaryMap;
use smallvec::SmallVec;

use crate::asset::JointPriority;
use crate::values::Interpolatable;

bitflags! {
    /// Which channels of a joint were written this tick.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Touched: u8 {
        const POSITION   = 1 << 0;
        const ROTATION   = 1 << 1;
        const SCALE      = 1 << 2;
        /// Rotation was overridden by a constraint.
        const CONSTRAINT = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy)]
struct Contribution<T> {
    priority: JointPriority,
    weight: f32,
    value: T,
}

type Contributions<T> = SmallVec<[Contribution<T>; 2]>;

#[derive(Debug, Clone, Default)]
struct JointSlot {
    position: Contributions<Vec3>,
    rotation: Contributions<Quat>,
    scale: Contributions<Vec3>,
    rotation_override: Option<Contribution<Quat>>,
    touched: Touched,
}

#[derive(Debug, Default)]
pub struct PoseBuffer {
    slots: SecondaryMap<JointHandle, JointSlot>,
}

impl PoseBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every contribution from the previous tick.
    pub fn begin_tick(&mut self) {
        self.slots.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of joints with at least one contribution.
    #[must_use]
    pub fn touched_joint_count(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn touched(&self, joint: JointHandle) -> Touched {
        self.slots.get(joint).map(|s| s.touched).unwrap_or_default()
    }

    pub fn blend_position(
        &mut self,
        joint: JointHandle,
        priority: JointPriority,
        weight: f32,
        value: Vec3,
    ) {
        if let Some(slot) = self.slot(joint, weight) {
            slot.position.push(Contribution { priority, weight, value });
            slot.touched |= Touched::POSITION;
        }
    }

    pub fn blend_rotation(
        &mut self,
        joint: JointHandle,
        priority: JointPriority,
        weight: f32,
        value: Quat,
    ) {
        if let Some(slot) = self.slot(joint, weight) {
            slot.rotation.push(Contribution { priority, weight, value });
            slot.touched |= Touched::ROTATION;
        }
    }

    pub fn blend_scale(
        &mut self,
        joint: JointHandle,
        priority: JointPriority,
        weight: f32,
        value: Vec3,
    ) {
        if let Some(slot) = self.slot(joint, weight) {
            slot.scale.push(Contribution { priority, weight, value });
            slot.touched |= Touched::SCALE;
        }
    }

    /// Replaces the joint's resolved local rotation outright.
    ///
    /// The override is dropped when a rotation contribution or an earlier
    /// override of higher priority exists for the joint. Returns whether it
    /// was stored.
    pub fn override_rotation(
        &mut self,
        joint: JointHandle,
        priority: JointPriority,
        rotation: Quat,
    ) -> bool {
        let Some(slot) = self.slots.entry(joint).map(|e| e.or_default()) else {
            return false;
        };
        if slot.outranks(priority) {
            return false;
        }
        slot.rotation_override = Some(Contribution {
            priority,
            weight: 1.0,
            value: rotation,
        });
        slot.touched |= Touched::ROTATION | Touched::CONSTRAINT;
        true
    }

    /// Resolved local transform of `joint` over `base`.
    #[must_use]
    pub fn resolve(&self, joint: JointHandle, base: &Transform) -> Transform {
        let Some(slot) = self.slots.get(joint) else {
            return *base;
        };
        Transform {
            position: resolve_channel(base.position, &slot.position),
            rotation: match slot.rotation_override {
                Some(o) if !slot.rotation.iter().any(|c| c.priority > o.priority) => o.value,
                _ => resolve_channel(base.rotation, &slot.rotation),
            },
            scale: resolve_channel(base.scale, &slot.scale),
        }
    }

    /// Writes every touched joint's resolved pose, blended over its rest pose.
    /// Returns the number of joints written.
    pub fn apply(&self, skeleton: &mut Skeleton) -> usize {
        let mut written = 0;
        for (handle, _) in &self.slots {
            if let Some(joint) = skeleton.joint_mut(handle) {
                joint.local = self.resolve(handle, &joint.rest);
                written += 1;
            }
        }
        written
    }

    fn slot(&mut self, joint: JointHandle, weight: f32) -> Option<&mut JointSlot> {
        if weight <= 0.0 || !weight.is_finite() {
            return None;
        }
        self.slots.entry(joint).map(|e| e.or_default())
    }
}

impl JointSlot {
    /// Whether something of higher priority than `priority` already drives
    /// this joint's rotation.
    fn outranks(&self, priority: JointPriority) -> bool {
        self.rotation.iter().any(|c| c.priority > priority)
            || self.rotation_override.is_some_and(|o| o.priority > priority)
    }
}

fn resolve_channel<T: Interpolatable>(base: T, contributions: &[Contribution<T>]) -> T {
    if contributions.is_empty() {
        return base;
    }

    let mut order: SmallVec<[usize; 4]> = (0..contributions.len()).collect();
    order.sort_by_key(|&i| contributions[i].priority);

    let mut result = base;
    let mut start = 0;
    while start < order.len() {
        let priority = contributions[order[start]].priority;
        let end = order[start..]
            .iter()
            .position(|&i| contributions[i].priority != priority)
            .map_or(order.len(), |offset| start + offset);

        let mut average = contributions[order[start]].value;
        let mut total = contributions[order[start]].weight;
        for &i in &order[start + 1..end] {
            let c = &contributions[i];
            total += c.weight;
            average = T::interpolate_linear(average, c.value.align_to(average), c.weight / total);
        }

        result = if total >= 1.0 {
            average
        } else {
            T::interpolate_linear(result, average.align_to(result), total)
        };
        start = end;
    }
    result
}
