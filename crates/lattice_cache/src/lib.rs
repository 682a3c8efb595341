//! Content-addressable cache for deterministic build steps.
//!
//! Keys are hashes of an operation's exact logical inputs, so identical
//! inputs hash identically across processes and cached artifacts can be
//! reused between runs. Values live in a hot in-memory layer backed by an
//! optional on-disk layer; any disk failure degrades the cache to
//! memory-only for the rest of the process and is never fatal to a build.

pub mod artifact;
pub mod error;
pub mod key;
pub mod store;

pub use error::CacheError;
pub use key::CacheKey;
pub use store::ContentCache;
