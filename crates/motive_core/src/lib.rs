//! Motive Core
//!
//! Shared foundation for the Motive animation crates:
//!
//! - [`skeleton`]: named joint hierarchy with rest pose and forward kinematics
//! - [`transform`]: local position/rotation/scale
//! - [`bounds`]: axis-aligned boxes
//! - [`id`]: asset identifiers, load status, and load tickets
//! - [`errors`]: the error enums every crate returns

pub mod bounds;
pub mod errors;
pub mod id;
pub mod skeleton;
pub mod transform;

pub use bounds::BoundingBox;
pub use errors::{AnimationError, AssetError, DecodeError, Error, Result, UnsolvableReason};
pub use id::{AssetId, AssetStatus, LoadTicket};
pub use skeleton::{Joint, JointHandle, Skeleton};
pub use transform::Transform;
