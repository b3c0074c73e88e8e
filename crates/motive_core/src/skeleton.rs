//! Skeleton Hierarchy
//!
//! A named joint tree with rest pose, current local pose, and cached world
//! transforms.
//!
//! Joints live in a `SlotMap`, so a [`JointHandle`] stays valid (or reports
//! itself gone) across topology edits. Every structural edit bumps
//! [`Skeleton::version`]; motions compare it against the version they bound
//! against and rebind when it moved.
//!
//! World transforms are refreshed by [`Skeleton::update_world_transforms`],
//! which walks joints in breadth-first order so that every parent is
//! finished before its children.

use glam::{Affine3A, Quat, Vec3};
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use crate::transform::Transform;

new_key_type! {
    /// Stable handle to a joint in a [`Skeleton`].
    pub struct JointHandle;
}

#[derive(Debug, Clone)]
pub struct Joint {
    name: String,
    parent: Option<JointHandle>,
    children: Vec<JointHandle>,
    /// Bind pose. Motions blend against this.
    pub rest: Transform,
    /// Current local pose.
    pub local: Transform,
    world_matrix: Affine3A,
    world_rotation: Quat,
}

impl Joint {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<JointHandle> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[JointHandle] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.world_matrix
    }

    #[inline]
    #[must_use]
    pub fn world_position(&self) -> Vec3 {
        self.world_matrix.translation.into()
    }

    /// Accumulated rotation, ignoring scale.
    #[inline]
    #[must_use]
    pub fn world_rotation(&self) -> Quat {
        self.world_rotation
    }
}

#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    joints: SlotMap<JointHandle, Joint>,
    by_name: FxHashMap<String, JointHandle>,
    roots: Vec<JointHandle>,
    /// Breadth-first order, parents before children.
    order: Vec<JointHandle>,
    version: u64,
}

impl Skeleton {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Topology stamp, bumped whenever joints are added, removed, or renamed.
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Adds a joint under `parent` (or as a root).
    ///
    /// Returns `None` if the name is taken or the parent handle is stale.
    pub fn add_joint(
        &mut self,
        name: impl Into<String>,
        parent: Option<JointHandle>,
        rest: Transform,
    ) -> Option<JointHandle> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            log::warn!("skeleton already has a joint named '{name}'");
            return None;
        }
        if let Some(p) = parent
            && !self.joints.contains_key(p)
        {
            log::warn!("parent of joint '{name}' is not in the skeleton");
            return None;
        }

        let handle = self.joints.insert(Joint {
            name: name.clone(),
            parent,
            children: Vec::new(),
            rest,
            local: rest,
            world_matrix: Affine3A::IDENTITY,
            world_rotation: Quat::IDENTITY,
        });

        match parent {
            Some(p) => self.joints[p].children.push(handle),
            None => self.roots.push(handle),
        }
        self.by_name.insert(name, handle);
        self.topology_changed();
        Some(handle)
    }

    /// Removes a joint and its whole subtree. Returns the number removed.
    pub fn remove_joint(&mut self, handle: JointHandle) -> usize {
        let Some(joint) = self.joints.get(handle) else {
            return 0;
        };

        match joint.parent {
            Some(p) => {
                if let Some(parent) = self.joints.get_mut(p) {
                    parent.children.retain(|&c| c != handle);
                }
            }
            None => self.roots.retain(|&r| r != handle),
        }

        let mut stack = vec![handle];
        let mut removed = 0;
        while let Some(h) = stack.pop() {
            if let Some(joint) = self.joints.remove(h) {
                self.by_name.remove(&joint.name);
                stack.extend(joint.children);
                removed += 1;
            }
        }

        self.topology_changed();
        log::debug!("skeleton: removed {removed} joints");
        removed
    }

    /// Renames a joint. Fails if `new_name` is already used.
    pub fn rename_joint(&mut self, handle: JointHandle, new_name: impl Into<String>) -> bool {
        let new_name = new_name.into();
        if self.by_name.contains_key(&new_name) {
            return false;
        }
        let Some(joint) = self.joints.get_mut(handle) else {
            return false;
        };
        let old = std::mem::replace(&mut joint.name, new_name.clone());
        self.by_name.remove(&old);
        self.by_name.insert(new_name, handle);
        self.topology_changed();
        true
    }

    #[inline]
    #[must_use]
    pub fn find_joint(&self, name: &str) -> Option<JointHandle> {
        self.by_name.get(name).copied()
    }

    #[inline]
    #[must_use]
    pub fn joint(&self, handle: JointHandle) -> Option<&Joint> {
        self.joints.get(handle)
    }

    #[inline]
    pub fn joint_mut(&mut self, handle: JointHandle) -> Option<&mut Joint> {
        self.joints.get_mut(handle)
    }

    #[inline]
    #[must_use]
    pub fn parent(&self, handle: JointHandle) -> Option<JointHandle> {
        self.joints.get(handle).and_then(|j| j.parent)
    }

    #[inline]
    #[must_use]
    pub fn roots(&self) -> &[JointHandle] {
        &self.roots
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointHandle, &Joint)> {
        self.joints.iter()
    }

    #[must_use]
    pub fn local_transform(&self, handle: JointHandle) -> Option<Transform> {
        self.joints.get(handle).map(|j| j.local)
    }

    pub fn set_local_transform(&mut self, handle: JointHandle, transform: Transform) -> bool {
        match self.joints.get_mut(handle) {
            Some(joint) => {
                joint.local = transform;
                true
            }
            None => false,
        }
    }

    /// Copies every joint's rest pose into its local pose.
    pub fn reset_to_rest(&mut self) {
        for joint in self.joints.values_mut() {
            joint.local = joint.rest;
        }
    }

    #[must_use]
    pub fn world_matrix(&self, handle: JointHandle) -> Option<Affine3A> {
        self.joints.get(handle).map(|j| j.world_matrix)
    }

    #[must_use]
    pub fn world_position(&self, handle: JointHandle) -> Option<Vec3> {
        self.joints.get(handle).map(Joint::world_position)
    }

    #[must_use]
    pub fn world_rotation(&self, handle: JointHandle) -> Option<Quat> {
        self.joints.get(handle).map(Joint::world_rotation)
    }

    /// World rotation of the joint's parent, identity for roots.
    #[must_use]
    pub fn parent_world_rotation(&self, handle: JointHandle) -> Quat {
        self.parent(handle)
            .and_then(|p| self.world_rotation(p))
            .unwrap_or(Quat::IDENTITY)
    }

    /// Recomputes world transforms from local poses, parents first.
    pub fn update_world_transforms(&mut self) {
        for i in 0..self.order.len() {
            let handle = self.order[i];
            let (parent_matrix, parent_rotation) = match self.joints[handle].parent {
                Some(p) => {
                    let parent = &self.joints[p];
                    (parent.world_matrix, parent.world_rotation)
                }
                None => (Affine3A::IDENTITY, Quat::IDENTITY),
            };

            let joint = &mut self.joints[handle];
            joint.world_matrix = parent_matrix * joint.local.to_affine();
            joint.world_rotation = (parent_rotation * joint.local.rotation).normalize();
        }
    }

    fn topology_changed(&mut self) {
        self.version = self.version.wrapping_add(1);
        self.rebuild_order();
    }

    fn rebuild_order(&mut self) {
        self.order.clear();
        self.order.extend_from_slice(&self.roots);
        let mut cursor = 0;
        while cursor < self.order.len() {
            let handle = self.order[cursor];
            if let Some(joint) = self.joints.get(handle) {
                self.order.extend_from_slice(&joint.children);
            }
            cursor += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn chain() -> (Skeleton, JointHandle, JointHandle, JointHandle) {
        let mut sk = Skeleton::new();
        let root = sk
            .add_joint("root", None, Transform::from_position(Vec3::new(0.0, 1.0, 0.0)))
            .unwrap();
        let mid = sk
            .add_joint("mid", Some(root), Transform::from_position(Vec3::new(0.0, -0.5, 0.0)))
            .unwrap();
        let tip = sk
            .add_joint("tip", Some(mid), Transform::from_position(Vec3::new(0.0, -0.5, 0.0)))
            .unwrap();
        (sk, root, mid, tip)
    }

    #[test]
    fn test_world_transforms_follow_parents() {
        let (mut sk, root, _, tip) = chain();
        sk.update_world_transforms();
        assert!(sk.world_position(tip).unwrap().abs_diff_eq(Vec3::ZERO, EPSILON));

        let mut t = sk.local_transform(root).unwrap();
        t.rotation = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        sk.set_local_transform(root, t);
        sk.update_world_transforms();
        // Chain now points along +X from (0, 1, 0).
        assert!(
            sk.world_position(tip)
                .unwrap()
                .abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), EPSILON)
        );
        assert!(sk.world_rotation(tip).unwrap().abs_diff_eq(t.rotation, EPSILON));
    }

    #[test]
    fn test_version_bumps_on_topology_change() {
        let (mut sk, _, mid, _) = chain();
        let v = sk.version();
        assert_eq!(sk.remove_joint(mid), 2);
        assert!(sk.version() > v);
        assert!(sk.find_joint("tip").is_none());
        assert_eq!(sk.len(), 1);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let (mut sk, root, _, _) = chain();
        assert!(sk.add_joint("mid", Some(root), Transform::IDENTITY).is_none());
        assert!(!sk.rename_joint(root, "tip"));
        assert!(sk.rename_joint(root, "pelvis"));
        assert_eq!(sk.find_joint("pelvis"), Some(root));
    }
}
