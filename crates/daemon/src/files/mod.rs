//! Sandboxed file operations.
//!
//! This module provides the file manager's core:
//! - Path normalization and name grammar ([`guard`])
//! - Directory listing, delete, rename, mkdir and move under one root ([`store`])
//! - Human-readable sizes for listings ([`format`])
//!
//! # Security
//!
//! All locations are relative to a single root. Paths containing `..` are
//! rejected before the filesystem is touched, and with symlink confinement
//! enabled every resolved location must stay under the canonical root.

pub mod format;
pub mod guard;
pub mod store;

pub use format::format_size;
pub use guard::{is_valid_file_name, is_valid_folder_name, GuardError, RelativePath};
pub use store::{EntryKind, FileStore, Moved, StoreError, DEFAULT_DIR_MODE};
