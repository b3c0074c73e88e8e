//! Error Types
//!
//! This module defines the error types shared by every Motive crate.
//!
//! # Overview
//!
//! The top-level [`Error`] wraps two domain enums:
//! - [`AssetError`]: fetching, decoding, and cache lookups
//! - [`AnimationError`]: joint binding and constraint solving
//!
//! Decoding failures carry a precise [`DecodeError`] so callers can tell a
//! version mismatch from a truncated file or an out-of-range index.
//!
//! # Usage
//!
//! ```rust,ignore
//! use motive_core::errors::{AssetError, Result};
//!
//! fn lookup(id: AssetId) -> Result<()> {
//!     Err(AssetError::NotFound(id).into())
//! }
//! ```

use thiserror::Error;

use crate::id::AssetId;

/// The main error type for the Motive engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Asset fetch, decode, or lookup failure.
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// Binding or constraint failure.
    #[error(transparent)]
    Animation(#[from] AnimationError),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Asset Errors
// ============================================================================

/// Errors produced while obtaining a keyframe asset.
#[derive(Error, Debug)]
pub enum AssetError {
    /// The bytes were fetched but could not be decoded.
    #[error("Asset data is corrupt: {0}")]
    Corrupt(#[from] DecodeError),

    /// The fetcher reported a failure.
    #[error("Asset fetch failed for {id}: {reason}")]
    FetchFailed {
        /// Asset that was requested
        id: AssetId,
        /// Fetcher-supplied description
        reason: String,
    },

    /// No asset with this id is cached or pending.
    #[error("Asset not found: {0}")]
    NotFound(AssetId),
}

/// Precise reason a binary keyframe asset was rejected.
///
/// A rejected asset is never partially registered.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error(
        "version mismatch: expected {expected_version}.{expected_subversion}, found {version}.{subversion}"
    )]
    VersionMismatch {
        version: i32,
        subversion: i32,
        expected_version: i32,
        expected_subversion: i32,
    },

    #[error("unexpected end of data")]
    Truncated,

    #[error("joint count {count} exceeds limit {limit}")]
    TooManyJoints { count: usize, limit: usize },

    #[error("joint '{joint}' has {count} keys on one channel (limit {limit})")]
    TooManyKeys {
        joint: String,
        count: usize,
        limit: usize,
    },

    #[error("constraint count {count} exceeds limit {limit}")]
    TooManyConstraints { count: usize, limit: usize },

    #[error("key times not strictly increasing in joint '{joint}' at key {index}")]
    KeyTimesNotIncreasing { joint: String, index: usize },

    #[error("non-finite value in {context}")]
    NonFinite { context: &'static str },

    #[error("{field} must not be negative, found {value}")]
    Negative { field: &'static str, value: f32 },

    #[error("joint '{joint}' has a zero-length rotation key")]
    DegenerateRotation { joint: String },

    #[error("joint '{joint}' usage mask disagrees with {channel} key count")]
    UsageMismatch {
        joint: String,
        channel: &'static str,
    },

    #[error("invalid value {value} for {field}")]
    InvalidEnum { field: &'static str, value: i64 },

    #[error("constraint chain length {0} outside 1..=4")]
    ChainLength(u32),

    #[error("constraint joint index {index} out of range (joint count {joint_count})")]
    JointIndexOutOfRange { index: u32, joint_count: usize },

    #[error("string length {len} exceeds limit {limit}")]
    StringTooLong { len: usize, limit: usize },

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("loop points {loop_in}..{loop_out} outside duration {duration}")]
    LoopPointsOutOfRange {
        loop_in: f32,
        loop_out: f32,
        duration: f32,
    },

    #[error("IO error while decoding: {0}")]
    Io(std::io::Error),
}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            DecodeError::Truncated
        } else {
            DecodeError::Io(err)
        }
    }
}

// ============================================================================
// Animation Errors
// ============================================================================

/// Errors raised while binding a motion or solving a constraint.
///
/// These are recoverable: the affected joint or constraint is skipped and
/// the rest of the motion keeps playing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimationError {
    /// A joint named by an asset does not exist in the skeleton.
    #[error("joint '{0}' not found in skeleton")]
    JointUnresolved(String),

    /// A constraint cannot be solved this tick.
    #[error("constraint unsolvable: {0}")]
    ConstraintUnsolvable(UnsolvableReason),
}

/// Why a constraint was marked unsolvable.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsolvableReason {
    #[error("chain has zero total length")]
    ZeroLength,
    #[error("chain joints are not a contiguous parent chain")]
    BrokenChain,
    #[error("chain joint not bound to the skeleton")]
    UnboundJoint,
    #[error("constraint target could not be resolved")]
    TargetUnresolved,
}

/// Alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
