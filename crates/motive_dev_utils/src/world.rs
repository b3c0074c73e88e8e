use glam::{Affine3A, Vec3};
use motive_animation::{CharacterWorld, GroundContact};
use rustc_hash::FxHashMap;

/// Infinite horizontal ground at `height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatGround {
    pub height: f32,
}

impl FlatGround {
    #[must_use]
    pub fn new(height: f32) -> Self {
        Self { height }
    }
}

impl CharacterWorld for FlatGround {
    fn ground_at(&self, position: Vec3) -> Option<GroundContact> {
        Some(GroundContact {
            position: Vec3::new(position.x, self.height, position.z),
            normal: Vec3::Y,
        })
    }
}

/// Named collision volumes with fixed world transforms, optionally over
/// flat ground.
#[derive(Debug, Clone, Default)]
pub struct VolumeWorld {
    volumes: FxHashMap<String, Affine3A>,
    ground: Option<FlatGround>,
}

impl VolumeWorld {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_volume(mut self, name: impl Into<String>, transform: Affine3A) -> Self {
        self.volumes.insert(name.into(), transform);
        self
    }

    #[must_use]
    pub fn with_ground(mut self, height: f32) -> Self {
        self.ground = Some(FlatGround::new(height));
        self
    }
}

impl CharacterWorld for VolumeWorld {
    fn ground_at(&self, position: Vec3) -> Option<GroundContact> {
        self.ground.and_then(|g| g.ground_at(position))
    }

    fn volume_transform(&self, name: &str) -> Option<Affine3A> {
        self.volumes.get(name).copied()
    }
}
