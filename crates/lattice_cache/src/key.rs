//! Cache key derivation from the logical inputs of a cached operation.

use lattice_common::ContentHash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A content-derived cache key.
///
/// A key hashes the exact set of logical inputs of the cached operation:
/// the operation name, the source text, and whichever option flags affect
/// the output. Two builds with identical inputs derive identical keys,
/// even across process restarts, which is what allows cross-run reuse of
/// the disk layer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(ContentHash);

impl CacheKey {
    /// Derives a key for `operation` over its logical inputs.
    ///
    /// `inputs` must contain every value that affects the operation's
    /// output and nothing else. Option flags are typically rendered as
    /// short stable strings (e.g. `"minify=true"`).
    pub fn derive<'a>(operation: &'a str, inputs: impl IntoIterator<Item = &'a [u8]>) -> Self {
        let mut parts: Vec<&[u8]> = vec![operation.as_bytes()];
        parts.extend(inputs);
        Self(ContentHash::from_parts(parts))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({self})")
    }
}
