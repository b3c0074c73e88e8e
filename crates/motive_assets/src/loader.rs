//! Asynchronous Keyframe Loading
//!
//! [`KeyframeLoader::request`] is fire-and-forget: it hands back a
//! [`LoadTicket`] immediately and performs the fetch on the tokio runtime.
//! Decoding runs on the blocking pool. When a load finishes the completion
//! handler:
//!
//! 1. installs the asset in the [`KeyframeCache`] or records the failure,
//! 2. updates every ticket whose owner is still alive,
//! 3. publishes a [`LoadCompletion`] on a `flume` channel.
//!
//! The loader only keeps `Weak` ticket references, so a requester cancels
//! by dropping its ticket. Nothing here blocks waiting on a load.

use std::sync::{Arc, Weak};

use futures::future::join_all;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;

use motive_core::{AssetError, AssetId, AssetStatus, LoadTicket};

use crate::cache::KeyframeCache;
use crate::codec;
use crate::fetch::AssetFetcher;
use crate::settings::LoaderSettings;

/// Outcome of one finished load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadCompletion {
    pub id: AssetId,
    /// `Loaded`, `FetchFailed`, or `Corrupt`.
    pub status: AssetStatus,
    pub error: Option<String>,
}

struct LoaderShared {
    cache: Arc<KeyframeCache>,
    pending: Mutex<FxHashMap<AssetId, Vec<Weak<LoadTicket>>>>,
    sender: flume::Sender<LoadCompletion>,
    settings: LoaderSettings,
}

impl LoaderShared {
    fn complete(&self, id: AssetId, fetched: anyhow::Result<Vec<u8>>) -> LoadCompletion {
        let decoded = fetched
            .map_err(|err| AssetError::FetchFailed {
                id,
                reason: format!("{err:#}"),
            })
            .and_then(|bytes| codec::deserialize_from_slice(&bytes, &self.settings.decode_limits));

        let (status, error) = match decoded {
            Ok(asset) => {
                self.cache.add_asset(id, asset);
                (AssetStatus::Loaded, None)
            }
            Err(err) => {
                let status = match err {
                    AssetError::Corrupt(_) => AssetStatus::Corrupt,
                    AssetError::FetchFailed { .. } | AssetError::NotFound(_) => {
                        AssetStatus::FetchFailed
                    }
                };
                log::warn!("load of {id} failed: {err}");
                self.cache.record_failure(id, status);
                (status, Some(err.to_string()))
            }
        };

        let waiters = self.pending.lock().remove(&id).unwrap_or_default();
        for waiter in waiters {
            match waiter.upgrade() {
                Some(ticket) => ticket.set_status(status),
                None => log::trace!("load of {id}: requester dropped its ticket"),
            }
        }

        let completion = LoadCompletion { id, status, error };
        if self.sender.send(completion.clone()).is_err() {
            log::trace!("load of {id}: no completion listener");
        }
        completion
    }
}

pub struct KeyframeLoader<F: AssetFetcher> {
    shared: Arc<LoaderShared>,
    fetcher: Arc<F>,
    runtime: Handle,
    completions: flume::Receiver<LoadCompletion>,
}

impl<F: AssetFetcher> KeyframeLoader<F> {
    pub fn new(
        cache: Arc<KeyframeCache>,
        fetcher: F,
        runtime: Handle,
        settings: LoaderSettings,
    ) -> Self {
        let (sender, completions) = flume::unbounded();
        Self {
            shared: Arc::new(LoaderShared {
                cache,
                pending: Mutex::default(),
                sender,
                settings,
            }),
            fetcher: Arc::new(fetcher),
            runtime,
            completions,
        }
    }

    #[inline]
    pub fn cache(&self) -> &Arc<KeyframeCache> {
        &self.shared.cache
    }

    #[inline]
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    #[inline]
    pub fn settings(&self) -> &LoaderSettings {
        &self.shared.settings
    }

    /// Requests `id` and returns a ticket to poll.
    ///
    /// A cached asset yields a ticket that is already `Loaded`. A request
    /// for an id that is already in flight joins that fetch.
    pub fn request(&self, id: AssetId) -> Arc<LoadTicket> {
        let ticket = {
            let mut pending = self.shared.pending.lock();
            if self.shared.cache.contains(id) {
                return Arc::new(LoadTicket::new(id, AssetStatus::Loaded));
            }
            let ticket = Arc::new(LoadTicket::new(id, AssetStatus::Pending));
            if let Some(waiters) = pending.get_mut(&id) {
                waiters.push(Arc::downgrade(&ticket));
                log::trace!("load of {id}: joined pending request");
                return ticket;
            }
            pending.insert(id, vec![Arc::downgrade(&ticket)]);
            ticket
        };

        self.shared.cache.mark_pending(id);
        log::debug!("load of {id}: fetching");

        let shared = Arc::clone(&self.shared);
        let fetcher = Arc::clone(&self.fetcher);
        self.runtime.spawn(async move {
            let fetched = fetcher.fetch(id).await;
            let decode = tokio::task::spawn_blocking(move || shared.complete(id, fetched));
            if let Err(err) = decode.await {
                log::error!("load of {id}: completion task failed: {err}");
            }
        });

        ticket
    }

    /// Fetches and decodes `id`, resolving once the cache is updated.
    pub async fn load(&self, id: AssetId) -> LoadCompletion {
        if self.shared.cache.contains(id) {
            return LoadCompletion {
                id,
                status: AssetStatus::Loaded,
                error: None,
            };
        }
        self.shared.cache.mark_pending(id);
        let fetched = self.fetcher.fetch(id).await;
        let shared = Arc::clone(&self.shared);
        match tokio::task::spawn_blocking(move || shared.complete(id, fetched)).await {
            Ok(completion) => completion,
            Err(err) => LoadCompletion {
                id,
                status: AssetStatus::FetchFailed,
                error: Some(err.to_string()),
            },
        }
    }

    /// Loads every id concurrently.
    pub async fn load_all(&self, ids: &[AssetId]) -> Vec<LoadCompletion> {
        join_all(ids.iter().map(|&id| self.load(id))).await
    }

    /// Completion handler for bytes delivered by an external transport.
    pub fn complete(&self, id: AssetId, fetched: anyhow::Result<Vec<u8>>) -> LoadCompletion {
        self.shared.complete(id, fetched)
    }

    /// Receiver of every finished load, for the simulation thread.
    #[inline]
    pub fn completions(&self) -> &flume::Receiver<LoadCompletion> {
        &self.completions
    }

    pub fn drain_completions(&self) -> Vec<LoadCompletion> {
        self.completions.try_iter().collect()
    }

    /// Ids with a fetch in flight.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.pending.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryFetcher;
    use motive_animation::{JointMotion, KeyframeAsset};

    fn loader() -> KeyframeLoader<MemoryFetcher> {
        KeyframeLoader::new(
            Arc::new(KeyframeCache::new()),
            MemoryFetcher::new(),
            Handle::current(),
            LoaderSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_load_installs_and_publishes() {
        let loader = loader();
        let id = AssetId::from_name("idle");
        let asset = KeyframeAsset::new(0.5, vec![JointMotion::new("root")]);
        loader.fetcher().insert(id, codec::serialize_to_vec(&asset).unwrap());

        let completion = loader.load(id).await;
        assert_eq!(completion.status, AssetStatus::Loaded);
        assert_eq!(loader.cache().status(id), AssetStatus::Loaded);
        assert_eq!(loader.drain_completions(), vec![completion]);

        // Cached ids short-circuit without publishing.
        let again = loader.load(id).await;
        assert_eq!(again.status, AssetStatus::Loaded);
        assert!(loader.drain_completions().is_empty());
    }

    #[tokio::test]
    async fn test_failed_load_clears_pending() {
        let loader = loader();
        let id = AssetId::from_name("missing");
        let completion = loader.load(id).await;
        assert_eq!(completion.status, AssetStatus::FetchFailed);
        assert!(completion.error.is_some());
        assert_eq!(loader.pending_count(), 0);
        assert_eq!(loader.cache().status(id), AssetStatus::FetchFailed);
    }
}
