//! Keyframe Cache
//!
//! Registry of decoded [`KeyframeAsset`]s keyed by [`AssetId`], together
//! with the load status of every id it has heard about.
//!
//! The cache is an explicitly constructed object shared through `Arc`.
//! Every method takes `&self`: a single coarse lock guards the maps so the
//! loader's completion tasks can install assets while simulation ticks read.
//! Readers receive an `Arc` clone, so eviction never invalidates an asset a
//! motion is still playing.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Serialize;

use motive_animation::{AssetLookup, JointPriority, KeyframeAsset};
use motive_core::{AssetId, AssetStatus};

use crate::codec;

#[derive(Default)]
struct CacheInner {
    assets: FxHashMap<AssetId, Arc<KeyframeAsset>>,
    statuses: FxHashMap<AssetId, AssetStatus>,
}

#[derive(Default)]
pub struct KeyframeCache {
    inner: RwLock<CacheInner>,
}

/// One row of [`KeyframeCache::dump_diagnostics`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetSummary {
    pub id: AssetId,
    pub joint_count: usize,
    pub constraint_count: usize,
    pub duration: f32,
    pub looping: bool,
    pub priority: JointPriority,
    pub encoded_size: usize,
    pub key_count: usize,
}

impl AssetSummary {
    fn new(id: AssetId, asset: &KeyframeAsset) -> Self {
        Self {
            id,
            joint_count: asset.joints().len(),
            constraint_count: asset.constraints().len(),
            duration: asset.duration(),
            looping: asset.is_looping(),
            priority: asset.priority(),
            encoded_size: codec::encoded_size(asset),
            key_count: asset.key_count(),
        }
    }
}

impl KeyframeCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `asset` under `id`, replacing any previous entry.
    ///
    /// Returns the replaced asset. Replacement never merges joint data.
    pub fn add_asset(
        &self,
        id: AssetId,
        asset: impl Into<Arc<KeyframeAsset>>,
    ) -> Option<Arc<KeyframeAsset>> {
        let mut guard = self.inner.write();
        guard.statuses.insert(id, AssetStatus::Loaded);
        let previous = guard.assets.insert(id, asset.into());
        log::debug!(
            "cache: {} {id}",
            if previous.is_some() { "replaced" } else { "added" }
        );
        previous
    }

    /// Shared reference to a cached asset. Never starts a load.
    #[must_use]
    pub fn get_asset(&self, id: AssetId) -> Option<Arc<KeyframeAsset>> {
        self.inner.read().assets.get(&id).cloned()
    }

    /// Evicts `id`. Holders of an earlier `Arc` keep their copy alive.
    pub fn remove_asset(&self, id: AssetId) -> Option<Arc<KeyframeAsset>> {
        let mut guard = self.inner.write();
        guard.statuses.remove(&id);
        let removed = guard.assets.remove(&id);
        if removed.is_some() {
            log::debug!("cache: removed {id}");
        }
        removed
    }

    /// Evicts every asset and forgets every status. Returns the number of
    /// assets evicted.
    pub fn flush(&self) -> usize {
        let mut guard = self.inner.write();
        let count = guard.assets.len();
        guard.assets.clear();
        guard.statuses.clear();
        log::debug!("cache: flushed {count} assets");
        count
    }

    #[must_use]
    pub fn status(&self, id: AssetId) -> AssetStatus {
        self.inner
            .read()
            .statuses
            .get(&id)
            .copied()
            .unwrap_or_default()
    }

    /// Marks `id` as being fetched.
    ///
    /// Returns `false` (and changes nothing) when the asset is already
    /// loaded or already pending.
    pub fn mark_pending(&self, id: AssetId) -> bool {
        let mut guard = self.inner.write();
        if guard.assets.contains_key(&id) {
            return false;
        }
        let status = guard.statuses.entry(id).or_default();
        if *status == AssetStatus::Pending {
            return false;
        }
        *status = AssetStatus::Pending;
        true
    }

    /// Records a failed load. The asset map is left untouched so a
    /// previously loaded version stays available.
    pub fn record_failure(&self, id: AssetId, status: AssetStatus) {
        debug_assert!(status.is_failure());
        let mut guard = self.inner.write();
        if guard.assets.contains_key(&id) {
            log::warn!("cache: load of {id} failed ({status:?}); keeping the cached version");
            return;
        }
        guard.statuses.insert(id, status);
    }

    #[must_use]
    pub fn contains(&self, id: AssetId) -> bool {
        self.inner.read().assets.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().assets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().assets.is_empty()
    }

    /// Ids of every cached asset, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<AssetId> {
        let mut ids: Vec<AssetId> = self.inner.read().assets.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// One summary per cached asset, sorted by id.
    #[must_use]
    pub fn dump_diagnostics(&self) -> Vec<AssetSummary> {
        let mut rows: Vec<AssetSummary> = {
            let guard = self.inner.read();
            guard
                .assets
                .iter()
                .map(|(id, asset)| AssetSummary::new(*id, asset))
                .collect()
        };
        rows.sort_unstable_by_key(|row| row.id);
        rows
    }

    pub fn log_diagnostics(&self) {
        let rows = self.dump_diagnostics();
        log::info!("keyframe cache: {} assets", rows.len());
        for row in &rows {
            log::info!(
                "  {} joints={} constraints={} duration={:.3}s loop={} priority={:?} bytes={} keys={}",
                row.id,
                row.joint_count,
                row.constraint_count,
                row.duration,
                row.looping,
                row.priority,
                row.encoded_size,
                row.key_count,
            );
        }
    }

    /// Diagnostics as a pretty-printed JSON array.
    pub fn summary_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.dump_diagnostics())
    }
}

impl AssetLookup for KeyframeCache {
    fn asset(&self, id: AssetId) -> Option<Arc<KeyframeAsset>> {
        self.get_asset(id)
    }

    fn status(&self, id: AssetId) -> AssetStatus {
        KeyframeCache::status(self, id)
    }
}
