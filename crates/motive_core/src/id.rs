//! Asset identity and load status.

use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 128-bit identifier of a keyframe asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(Uuid);

impl AssetId {
    /// The nil id. Used on the wire to mean "no asset".
    pub const NIL: AssetId = AssetId(Uuid::nil());

    /// Generates a random id.
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Deterministic id derived from a name, stable across runs.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    #[inline]
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 16] {
        *self.0.as_bytes()
    }

    #[inline]
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl From<Uuid> for AssetId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Where an asset is in its load lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AssetStatus {
    /// Never requested, or removed from the cache.
    #[default]
    Undefined,
    /// Known to be needed but no fetch has been issued.
    NeedsFetch,
    /// A fetch is in flight.
    Pending,
    /// Decoded and registered in the cache.
    Loaded,
    /// The fetcher reported an error.
    FetchFailed,
    /// The bytes arrived but failed to decode.
    Corrupt,
}

impl AssetStatus {
    /// The request has finished, successfully or not.
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AssetStatus::Loaded | AssetStatus::FetchFailed | AssetStatus::Corrupt
        )
    }

    #[inline]
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, AssetStatus::FetchFailed | AssetStatus::Corrupt)
    }

    /// A result is still expected to arrive.
    #[inline]
    #[must_use]
    pub fn is_waiting(self) -> bool {
        matches!(self, AssetStatus::NeedsFetch | AssetStatus::Pending)
    }
}

/// Handle a requester keeps while a load is in flight.
///
/// The loader only holds a `Weak` reference to each ticket. Dropping the last
/// `Arc` is how a requester cancels interest: completions for dead tickets
/// are skipped.
#[derive(Debug)]
pub struct LoadTicket {
    id: AssetId,
    status: Mutex<AssetStatus>,
}

impl LoadTicket {
    #[must_use]
    pub fn new(id: AssetId, status: AssetStatus) -> Self {
        Self {
            id,
            status: Mutex::new(status),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> AssetId {
        self.id
    }

    #[must_use]
    pub fn status(&self) -> AssetStatus {
        *self.status.lock()
    }

    pub fn set_status(&self, status: AssetStatus) {
        *self.status.lock() = status;
    }
}
