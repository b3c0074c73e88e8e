//! Motive Assets
//!
//! Getting [`KeyframeAsset`](motive_animation::KeyframeAsset)s from storage
//! into memory:
//!
//! - [`codec`]: the versioned little-endian binary format
//! - [`cache`]: [`KeyframeCache`], the shared id → asset registry
//! - [`fetch`]: [`AssetFetcher`] backends (filesystem, memory)
//! - [`loader`]: [`KeyframeLoader`], asynchronous fetch + decode on tokio

pub mod cache;
pub mod codec;
pub mod fetch;
pub mod loader;
pub mod settings;

pub use cache::{AssetSummary, KeyframeCache};
pub use codec::{
    KEYFRAME_MOTION_SUBVERSION, KEYFRAME_MOTION_VERSION, deserialize, deserialize_from_slice,
    encoded_size, serialize, serialize_to_vec,
};
pub use fetch::{AssetFetcher, FileFetcher, MemoryFetcher};
pub use loader::{KeyframeLoader, LoadCompletion};
pub use settings::{DecodeLimits, LoaderSettings};
