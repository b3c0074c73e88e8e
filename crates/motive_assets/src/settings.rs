use serde::{Deserialize, Serialize};

/// Upper bounds enforced while decoding untrusted asset bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeLimits {
    pub max_joints: usize,
    pub max_keys_per_curve: usize,
    pub max_constraints: usize,
    pub max_string_len: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_joints: 256,
            max_keys_per_curve: 16384,
            max_constraints: 64,
            max_string_len: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    pub decode_limits: DecodeLimits,
    /// Extension [`FileFetcher`](crate::fetch::FileFetcher) appends to asset ids.
    pub file_extension: String,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            decode_limits: DecodeLimits::default(),
            file_extension: "anim".to_string(),
        }
    }
}
