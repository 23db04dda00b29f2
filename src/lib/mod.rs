//! Environment file comparison and merging library.
//!
//! This library parses `.env` files into variables that keep the comment
//! block written above them, then either aligns two files by key to show
//! what changed, or merges them under a configurable policy.
//!
//! # Features
//!
//! - **Zero-copy parsing**: Uses `Cow<str>` for efficient string handling
//! - **Comment preservation**: Every variable owns the comment lines above it
//! - **Patch-like diffs**: Keys only found in the new file appear next to
//!   their nearest shared neighbour, and differing comment blocks get a
//!   line-level diff
//! - **Policy driven merges**: Conflict resolution, empty values, keys found
//!   in one file only, comments, sorting and pruning are all configurable
//! - **Optional tracing**: Detailed logging when the `tracing` feature is enabled
//!
//! # Example
//!
//! ```rust
//! use env_diff::diff::{DiffType, diff_env_files};
//! use env_diff::merge::{MergePolicy, merge_env_files};
//!
//! let old = "# Database\nDB_HOST=localhost\n";
//! let new = "# Database\nDB_HOST=db.internal\nDB_PORT=5432\n";
//!
//! let diff = diff_env_files(old, new);
//! assert_eq!(diff[0].diff_type(), DiffType::Changed);
//! assert_eq!(diff[1].diff_type(), DiffType::Added);
//!
//! let merged = merge_env_files(old, new, &MergePolicy::default());
//! assert_eq!(merged.len(), 3);
//! ```

pub mod comment;
pub mod diff;
pub mod files;
pub mod merge;
pub mod parse;
pub mod render;
