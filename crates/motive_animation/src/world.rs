use glam::{Affine3A, Vec3};

/// Ground sample under a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundContact {
    pub position: Vec3,
    /// Unit surface normal.
    pub normal: Vec3,
}

/// What the character's surroundings can tell a constraint.
///
/// Both queries may answer `None`; the constraint then stays inactive for
/// the tick and the keyframed pose is left untouched.
pub trait CharacterWorld {
    /// Ground directly under `position`.
    fn ground_at(&self, _position: Vec3) -> Option<GroundContact> {
        None
    }

    /// World transform of a named collision volume on the character.
    fn volume_transform(&self, _name: &str) -> Option<Affine3A> {
        None
    }
}

/// A world with neither ground nor collision volumes.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyWorld;

impl CharacterWorld for EmptyWorld {}
