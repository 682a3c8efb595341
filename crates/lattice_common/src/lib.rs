//! Shared foundational types used across the Lattice compiler toolchain.
//!
//! This crate provides content hashing for cache keys and change detection,
//! path normalization helpers, and common result types.

#![warn(missing_docs)]

pub mod hash;
pub mod paths;
pub mod result;

pub use hash::ContentHash;
pub use paths::{join_normalized, normalize_path, relative_path};
pub use result::{InternalError, LatticeResult};
