//! In-memory, copy-on-write staging layer over the real filesystem.
//!
//! Every read, write, and delete since the last commit is buffered in
//! memory. Nothing touches disk until [`VirtualFs::commit`] flushes the
//! staged operations in a single pass and reports exactly which files and
//! directories were added, updated, or deleted. Disk failures are reported
//! per path and never abort the batch.

pub mod commit;
pub mod vfs;

pub use commit::{CommitError, CommitResults};
pub use vfs::{FileReadResult, VirtualFs};
