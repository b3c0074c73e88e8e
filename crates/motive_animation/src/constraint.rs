//! Chain Constraints
//!
//! Soft IK for chains of up to [`MAX_CHAIN_LENGTH`] joints. Each tick a
//! constraint:
//!
//! 1. finds its source point (effector joint or source volume, plus offset)
//!    and its target (a body volume or the ground),
//! 2. moves the effector goal toward the target by the current weight,
//! 3. spreads the correction along the chain by link-length fraction, then
//!    restores the link lengths with alternating reach passes (effector to
//!    goal, root back in place),
//! 4. turns the solved points into local rotation overrides, root first.
//!
//! The solve is approximate. The distance left between the achieved
//! effector and its goal is kept as a residual for diagnostics. A
//! constraint that cannot be solved leaves the keyframed pose alone.

use glam::{Quat, Vec3};
use motive_core::{AnimationError, JointHandle, Skeleton, UnsolvableReason};
use smallvec::SmallVec;

use crate::asset::{
    ConstraintKind, ConstraintTarget, JointConstraintSharedData, JointPriority, MAX_CHAIN_LENGTH,
};
use crate::motion::MotionContext;
use crate::settings::SolverSettings;
use crate::world::CharacterWorld;

/// Source point plus one point per chain joint.
pub type ChainPoints = SmallVec<[Vec3; MAX_CHAIN_LENGTH + 1]>;

const MIN_CHAIN_LENGTH: f32 = 1e-5;

/// Per-instance state of one constraint.
#[derive(Debug, Clone, Default)]
pub struct JointConstraint {
    shared_index: usize,
    active: bool,
    initialized: bool,
    weight: f32,
    total_length: f32,
    link_lengths: [f32; MAX_CHAIN_LENGTH],
    link_count: usize,
    target_position: Option<Vec3>,
    ground_normal: Option<Vec3>,
    residual: f32,
    last_error: Option<AnimationError>,
}

impl JointConstraint {
    #[must_use]
    pub fn new(shared_index: usize) -> Self {
        Self {
            shared_index,
            ..Self::default()
        }
    }

    /// Index of the shared definition in the asset's constraint list.
    #[inline]
    #[must_use]
    pub fn shared_index(&self) -> usize {
        self.shared_index
    }

    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Effective weight of the last solve.
    #[inline]
    #[must_use]
    pub fn weight(&self) -> f32 {
        self.weight
    }

    #[inline]
    #[must_use]
    pub fn total_length(&self) -> f32 {
        self.total_length
    }

    #[must_use]
    pub fn link_lengths(&self) -> &[f32] {
        &self.link_lengths[..self.link_count]
    }

    /// Share of the total chain length each link accounts for.
    pub fn link_fractions(&self) -> impl Iterator<Item = f32> + '_ {
        let total = self.total_length;
        self.link_lengths().iter().map(move |l| l / total)
    }

    /// Last resolved target, if any.
    #[must_use]
    pub fn target_position(&self) -> Option<Vec3> {
        self.target_position
    }

    /// Ground normal of the last ground sample.
    #[must_use]
    pub fn ground_normal(&self) -> Option<Vec3> {
        self.ground_normal
    }

    /// Distance between the achieved source point and its goal after the
    /// last solve.
    #[must_use]
    pub fn residual(&self) -> f32 {
        self.residual
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&AnimationError> {
        self.last_error.as_ref()
    }

    /// Forgets activation and cached link lengths.
    pub fn reset(&mut self) {
        *self = Self::new(self.shared_index);
    }

    /// Stores `error`, returning `true` when it differs from the previous one.
    pub(crate) fn record_error(&mut self, error: Option<AnimationError>) -> bool {
        let changed = self.last_error != error;
        self.last_error = error;
        changed
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ResolvedTarget {
    Point(Vec3),
    Plane { point: Vec3, normal: Vec3 },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintSolver {
    settings: SolverSettings,
}

impl ConstraintSolver {
    #[must_use]
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Runs one constraint for this tick.
    ///
    /// `chain` holds the skeleton joints named by `shared.chain`, effector
    /// first, and `priorities` the motion's resolved priority for each of
    /// them. Overrides never replace a higher-priority rotation. `time` is
    /// the motion's local time; `motion_weight` its ease weight. Returns
    /// `Ok(true)` when rotation overrides were written.
    pub fn solve(
        &self,
        constraint: &mut JointConstraint,
        shared: &JointConstraintSharedData,
        chain: &[JointHandle],
        priorities: &[JointPriority],
        time: f32,
        motion_weight: f32,
        ctx: &mut MotionContext<'_>,
    ) -> Result<bool, AnimationError> {
        let index = constraint.shared_index;
        let unsolvable = move |reason: UnsolvableReason| {
            log::trace!("constraint {index} unsolvable: {reason}");
            AnimationError::ConstraintUnsolvable(reason)
        };

        if chain.is_empty()
            || chain.len() > MAX_CHAIN_LENGTH
            || !is_parent_chain(ctx.skeleton, chain)
        {
            Self::deactivate_constraint(constraint);
            return Err(unsolvable(UnsolvableReason::BrokenChain));
        }

        ctx.refresh_if_constrained(chain);

        let Some(source) = source_point(shared, chain[0], ctx.skeleton, ctx.world) else {
            Self::deactivate_constraint(constraint);
            return Err(unsolvable(UnsolvableReason::UnboundJoint));
        };

        let target = resolve_target(shared, source, ctx.world);
        let window = shared.weight_at(time);

        let Some(target) = target else {
            Self::deactivate_constraint(constraint);
            return match shared.target {
                // No ground under the character is ordinary.
                ConstraintTarget::Ground => Ok(false),
                ConstraintTarget::Body => Err(unsolvable(UnsolvableReason::TargetUnresolved)),
            };
        };
        if window <= 0.0 {
            Self::deactivate_constraint(constraint);
            return Ok(false);
        }

        let mut points = ChainPoints::new();
        points.push(source);
        for &joint in chain {
            points.push(ctx.skeleton.world_position(joint).unwrap_or_default());
        }

        if !constraint.initialized {
            Self::initialize_constraint(constraint, &points).map_err(unsolvable)?;
        }
        Self::activate_constraint(constraint, window, true);

        let weight = window * motion_weight;
        Ok(self.apply_constraint(constraint, target, &points, chain, priorities, weight, ctx))
    }

    /// Marks `constraint` active when its weight window is open and its
    /// target resolved. Otherwise deactivates it. Returns the new state.
    pub fn activate_constraint(
        constraint: &mut JointConstraint,
        window: f32,
        target_resolved: bool,
    ) -> bool {
        if window > 0.0 && target_resolved {
            if !constraint.active {
                log::debug!("constraint {} activated", constraint.shared_index);
                constraint.active = true;
            }
        } else {
            Self::deactivate_constraint(constraint);
        }
        constraint.active
    }

    pub fn deactivate_constraint(constraint: &mut JointConstraint) {
        constraint.active = false;
        constraint.weight = 0.0;
        constraint.target_position = None;
    }

    /// Captures link lengths from `points` (source point first, chain root
    /// last). Runs once per activation cycle.
    pub fn initialize_constraint(
        constraint: &mut JointConstraint,
        points: &[Vec3],
    ) -> Result<(), UnsolvableReason> {
        let links = points.len().saturating_sub(1).min(MAX_CHAIN_LENGTH);
        let mut total = 0.0;
        for k in 0..links {
            let length = points[k].distance(points[k + 1]);
            constraint.link_lengths[k] = length;
            total += length;
        }
        if total < MIN_CHAIN_LENGTH {
            return Err(UnsolvableReason::ZeroLength);
        }
        constraint.link_count = links;
        constraint.total_length = total;
        constraint.initialized = true;
        Ok(())
    }

    /// Moves the chain toward `target` by `weight` and writes the resulting
    /// rotation overrides. Returns `true` when overrides were written.
    fn apply_constraint(
        &self,
        constraint: &mut JointConstraint,
        target: ResolvedTarget,
        points: &[Vec3],
        chain: &[JointHandle],
        priorities: &[JointPriority],
        weight: f32,
        ctx: &mut MotionContext<'_>,
    ) -> bool {
        let source = points[0];
        let goal = match target {
            ResolvedTarget::Point(point) => {
                constraint.ground_normal = None;
                point
            }
            ResolvedTarget::Plane { point, normal } => {
                constraint.ground_normal = Some(normal);
                let depth = (source - point).dot(normal);
                if depth >= 0.0 {
                    // Already on the allowed side of the plane.
                    constraint.target_position = Some(source);
                    constraint.weight = 0.0;
                    constraint.residual = 0.0;
                    return false;
                }
                source - normal * depth
            }
        };
        constraint.target_position = Some(goal);

        let weight = weight.clamp(0.0, 1.0);
        constraint.weight = weight;
        if weight <= 0.0 {
            return false;
        }

        let root = points[points.len() - 1];
        let reach = goal - root;
        let goal = if reach.length() > constraint.total_length {
            root + reach.normalize_or_zero() * constraint.total_length
        } else {
            goal
        };
        let effector_goal = source.lerp(goal, weight);

        let solved = self.relax_chain(points, effector_goal, constraint.link_lengths());
        let achieved = write_rotations(chain, priorities, points, &solved, ctx);
        constraint.residual = achieved.distance(effector_goal);
        true
    }

    /// Solves chain points for a source point at `goal`.
    ///
    /// The correction is first spread over the inner points by the share of
    /// chain length between each point and the root. Reach passes then pull
    /// the source to `goal` and the root (last point) back to where it was,
    /// restoring `lengths` each time, until the source is within the
    /// convergence distance of the goal.
    #[must_use]
    pub fn relax_chain(&self, points: &[Vec3], goal: Vec3, lengths: &[f32]) -> ChainPoints {
        let mut solved: ChainPoints = points.iter().copied().collect();
        let links = lengths.len();
        if links == 0 || points.len() != links + 1 {
            return solved;
        }

        let total: f32 = lengths.iter().sum();
        let fixup = goal - points[0];
        if total > MIN_CHAIN_LENGTH {
            let mut remaining = total;
            for k in 1..links {
                remaining -= lengths[k - 1];
                solved[k] += fixup * (remaining / total);
            }
        }

        let root = points[links];
        for _ in 0..self.settings.max_iterations {
            solved[0] = goal;
            for k in 1..=links {
                let dir = (solved[k] - solved[k - 1]).normalize_or_zero();
                solved[k] = solved[k - 1] + dir * lengths[k - 1];
            }
            solved[links] = root;
            for k in (0..links).rev() {
                let dir = (solved[k] - solved[k + 1]).normalize_or_zero();
                solved[k] = solved[k + 1] + dir * lengths[k];
            }
            if solved[0].distance(goal) < self.settings.convergence_epsilon {
                break;
            }
        }
        solved
    }
}

fn is_parent_chain(skeleton: &Skeleton, chain: &[JointHandle]) -> bool {
    chain.iter().all(|&j| skeleton.joint(j).is_some())
        && chain.windows(2).all(|pair| skeleton.parent(pair[0]) == Some(pair[1]))
}

fn source_point(
    shared: &JointConstraintSharedData,
    effector: JointHandle,
    skeleton: &Skeleton,
    world: &dyn CharacterWorld,
) -> Option<Vec3> {
    if !shared.source_volume.is_empty()
        && let Some(volume) = world.volume_transform(&shared.source_volume)
    {
        return Some(volume.transform_point3(shared.source_offset));
    }
    skeleton
        .world_matrix(effector)
        .map(|m| m.transform_point3(shared.source_offset))
}

fn resolve_target(
    shared: &JointConstraintSharedData,
    source: Vec3,
    world: &dyn CharacterWorld,
) -> Option<ResolvedTarget> {
    match shared.target {
        ConstraintTarget::Body => {
            let volume = world.volume_transform(&shared.target_volume)?;
            let point = volume.transform_point3(shared.target_offset);
            match shared.kind {
                ConstraintKind::Point => Some(ResolvedTarget::Point(point)),
                ConstraintKind::Plane => {
                    let normal = volume.transform_vector3(shared.target_dir).try_normalize()?;
                    Some(ResolvedTarget::Plane { point, normal })
                }
            }
        }
        ConstraintTarget::Ground => {
            let contact = world.ground_at(source)?;
            let point = contact.position + shared.target_offset;
            match shared.kind {
                ConstraintKind::Point => Some(ResolvedTarget::Point(point)),
                ConstraintKind::Plane => Some(ResolvedTarget::Plane {
                    point,
                    normal: contact.normal.try_normalize()?,
                }),
            }
        }
    }
}

/// Rotates each chain joint, root first, so its child point lines up with
/// the solved one, and records the result as local rotation overrides.
/// A joint whose override is refused keeps its rotation, and the joints
/// below it are solved from there. Returns where the source point ends up.
fn write_rotations(
    chain: &[JointHandle],
    priorities: &[JointPriority],
    points: &[Vec3],
    solved: &[Vec3],
    ctx: &mut MotionContext<'_>,
) -> Vec3 {
    let n = chain.len();
    let mut current: ChainPoints = points.iter().copied().collect();
    let mut world_rotations: SmallVec<[Quat; MAX_CHAIN_LENGTH]> = chain
        .iter()
        .map(|&j| ctx.skeleton.world_rotation(j).unwrap_or(Quat::IDENTITY))
        .collect();
    let root_parent = ctx.skeleton.parent_world_rotation(chain[n - 1]);

    for k in (1..=n).rev() {
        let pivot = current[k];
        let from = (current[k - 1] - pivot).try_normalize();
        let to = (solved[k - 1] - pivot).try_normalize();
        let delta = match (from, to) {
            (Some(from), Some(to)) => Quat::from_rotation_arc(from, to),
            _ => Quat::IDENTITY,
        };

        let parent_world = if k == n { root_parent } else { world_rotations[k] };
        let world = (delta * world_rotations[k - 1]).normalize();
        let local = (parent_world.inverse() * world).normalize();
        let priority = priorities.get(k - 1).copied().unwrap_or_default();
        if !ctx.pose.override_rotation(chain[k - 1], priority, local) {
            log::trace!("rotation override of chain joint {} refused", k - 1);
            continue;
        }
        for point in &mut current[..k] {
            *point = pivot + delta * (*point - pivot);
        }
        for rotation in &mut world_rotations[..k] {
            *rotation = (delta * *rotation).normalize();
        }
    }

    current[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relax_chain_keeps_root_and_reaches_goal() {
        let solver = ConstraintSolver::default();
        // Slightly bent, so the solve knows which way the middle joint folds.
        let points = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.5, 0.05),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let lengths = [points[0].distance(points[1]), points[1].distance(points[2])];
        let goal = Vec3::new(0.0, 0.2, 0.0);
        let solved = solver.relax_chain(&points, goal, &lengths);

        assert!(solved[0].distance(goal) < 1e-3);
        assert_eq!(solved[2], points[2]);
        assert!((solved[0].distance(solved[1]) - lengths[0]).abs() < 1e-4);
        assert!((solved[1].distance(solved[2]) - lengths[1]).abs() < 1e-4);
        // The middle joint folded further forward.
        assert!(solved[1].z > 0.05);
    }

    #[test]
    fn test_zero_length_chain_rejected() {
        let mut c = JointConstraint::new(0);
        let err = ConstraintSolver::initialize_constraint(&mut c, &[Vec3::ONE, Vec3::ONE]);
        assert_eq!(err, Err(UnsolvableReason::ZeroLength));
        assert!(!c.is_initialized());
    }

    #[test]
    fn test_link_fractions_sum_to_one() {
        let mut c = JointConstraint::new(0);
        ConstraintSolver::initialize_constraint(
            &mut c,
            &[Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 4.0, 0.0)],
        )
        .unwrap();
        assert_eq!(c.link_lengths(), &[1.0, 3.0]);
        let fractions: Vec<f32> = c.link_fractions().collect();
        assert!((fractions.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!((fractions[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_activation_follows_window_and_target() {
        let mut c = JointConstraint::new(0);
        assert!(!ConstraintSolver::activate_constraint(&mut c, 0.0, true));
        assert!(!ConstraintSolver::activate_constraint(&mut c, 0.5, false));
        assert!(ConstraintSolver::activate_constraint(&mut c, 0.5, true));
        assert!(c.is_active());

        ConstraintSolver::deactivate_constraint(&mut c);
        assert!(!c.is_active());
        assert_eq!(c.weight(), 0.0);
        assert!(c.target_position().is_none());
    }
}
