use motive_core::{AnimationError, JointHandle, Skeleton};

use crate::asset::KeyframeAsset;

/// Resolution of an asset's joint names to skeleton joints.
///
/// Remembers the skeleton version it was built against, so a motion can
/// tell when joints were added, removed, or renamed and rebind.
#[derive(Debug, Clone, Default)]
pub struct JointBindings {
    handles: Vec<Option<JointHandle>>,
    skeleton_version: Option<u64>,
}

impl JointBindings {
    /// Resolves every joint of `asset` by name.
    ///
    /// Unresolved joints are reported and left unbound; they are skipped
    /// during playback.
    pub fn bind(asset: &KeyframeAsset, skeleton: &Skeleton) -> (Self, Vec<AnimationError>) {
        let mut errors = Vec::new();
        let handles = asset
            .joints()
            .iter()
            .map(|joint| {
                let handle = skeleton.find_joint(&joint.name);
                if handle.is_none() {
                    errors.push(AnimationError::JointUnresolved(joint.name.clone()));
                }
                handle
            })
            .collect();

        (
            Self {
                handles,
                skeleton_version: Some(skeleton.version()),
            },
            errors,
        )
    }

    /// The skeleton's topology moved since binding.
    #[inline]
    #[must_use]
    pub fn is_stale(&self, skeleton: &Skeleton) -> bool {
        self.skeleton_version != Some(skeleton.version())
    }

    /// Skeleton joint driven by the asset joint at `index`.
    #[inline]
    #[must_use]
    pub fn handle(&self, index: usize) -> Option<JointHandle> {
        self.handles.get(index).copied().flatten()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.handles.iter().filter(|h| h.is_some()).count()
    }
}
