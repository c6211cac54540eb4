//! Filesystem operations confined to a single root directory.
//!
//! [`FileStore`] is the only component that turns a [`RelativePath`] into an
//! absolute OS path. Every location it touches is first checked with
//! [`is_within_root`], and, when symlink confinement is enabled, with
//! [`is_confined`].

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use protocol::{DirEntry, ErrorKind, FileEntry, Listing};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::format::format_size;
use super::guard::{
    is_confined, is_valid_file_name, is_valid_folder_name, is_within_root, RelativePath,
    TargetKind,
};
use crate::i18n::keys;

/// Default permissions for directories created by [`FileStore::mkdir`].
pub const DEFAULT_DIR_MODE: u32 = 0o777;

/// Errors returned by store operations.
///
/// Each variant carries the message key used to build the localized response.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Traversal attempt, or the location is missing or of the wrong kind.
    #[error("invalid path: {path}")]
    InvalidPath { path: String, key: &'static str },

    /// The name fails the folder or file grammar.
    #[error("invalid name: {name:?}")]
    InvalidName { name: String, key: &'static str },

    /// The target does not exist.
    #[error("not found: {path}")]
    NotFound { path: String },

    /// Something already exists at the target.
    #[error("already exists: {path}")]
    AlreadyExists { path: String, key: &'static str },

    /// The operation is not allowed on this target.
    #[error("operation not allowed on {path:?}")]
    InvalidOperation { path: String, key: &'static str },

    /// The OS call failed.
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: String,
        key: &'static str,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn invalid_path(path: impl Into<String>, key: &'static str) -> Self {
        StoreError::InvalidPath {
            path: path.into(),
            key,
        }
    }

    pub(crate) fn invalid_name(name: impl Into<String>, key: &'static str) -> Self {
        StoreError::InvalidName {
            name: name.into(),
            key,
        }
    }

    /// The failure category reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::InvalidPath { .. } => ErrorKind::InvalidPath,
            StoreError::InvalidName { .. } => ErrorKind::InvalidName,
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            StoreError::InvalidOperation { .. } => ErrorKind::InvalidOperation,
            StoreError::Io { .. } => ErrorKind::IoError,
        }
    }

    /// Message key for the localized response.
    pub fn message_key(&self) -> &'static str {
        match self {
            StoreError::InvalidPath { key, .. }
            | StoreError::InvalidName { key, .. }
            | StoreError::AlreadyExists { key, .. }
            | StoreError::InvalidOperation { key, .. }
            | StoreError::Io { key, .. } => key,
            StoreError::NotFound { .. } => keys::FILE_NOT_FOUND,
        }
    }

    /// The path appended to the localized message, if any.
    ///
    /// Only OS failures and collisions name the path they concern.
    pub fn subject(&self) -> Option<&str> {
        match self {
            StoreError::Io { path, .. } | StoreError::AlreadyExists { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Kind of an existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A directory.
    Directory,
    /// Anything that is not a directory.
    File,
}

/// Outcome of a rename or move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Moved {
    /// Location after the operation.
    pub path: RelativePath,
    /// Kind of the entry that was moved.
    pub kind: EntryKind,
}

/// File store rooted at a single absolute directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Absolute root directory.
    root: PathBuf,
    /// Reject locations whose canonical form leaves the root.
    confine_symlinks: bool,
    /// Permissions applied to new directories.
    dir_mode: u32,
}

impl FileStore {
    /// Create a store for `root` with symlink confinement enabled.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            confine_symlinks: true,
            dir_mode: DEFAULT_DIR_MODE,
        }
    }

    /// Set whether locations must stay inside the root after resolving
    /// symlinks.
    ///
    /// When disabled only the string-level `..` check applies, and a symlink
    /// inside the root can reach anything it points to.
    pub fn confine_symlinks(mut self, confine: bool) -> Self {
        self.confine_symlinks = confine;
        self
    }

    /// Set the permission bits applied to directories created by `mkdir`.
    pub fn with_dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = mode;
        self
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` to the kind of entry it names.
    ///
    /// Returns `Ok(None)` when nothing is there, and `InvalidPath` when the
    /// entry exists but resolves outside the root.
    fn locate(&self, path: &RelativePath) -> Result<Option<EntryKind>, StoreError> {
        let relative = path.as_string();
        let kind = if is_within_root(&self.root, &relative, TargetKind::Directory) {
            EntryKind::Directory
        } else if is_within_root(&self.root, &relative, TargetKind::Entry) {
            EntryKind::File
        } else {
            return Ok(None);
        };

        if self.confine_symlinks && !is_confined(&self.root, &path.to_path(&self.root)) {
            warn!(path = %relative, "Rejected location resolving outside root");
            return Err(StoreError::invalid_path(relative, keys::INVALID_PATH));
        }

        Ok(Some(kind))
    }

    /// List the direct children of a directory.
    ///
    /// Entries whose name starts with `.` are skipped, as are children that
    /// vanish or cannot be read between enumeration and stat. Directories and
    /// files are each sorted by name, byte-wise.
    pub fn list(&self, dir: &RelativePath) -> Result<Listing, StoreError> {
        if self.locate(dir)? != Some(EntryKind::Directory) {
            return Err(StoreError::invalid_path(
                dir.as_string(),
                keys::INVALID_FOLDER_NAME,
            ));
        }

        let real_path = dir.to_path(&self.root);
        let entries = fs::read_dir(&real_path).map_err(|source| {
            error!(path = %dir, error = %source, "Failed to read directory");
            StoreError::Io {
                path: dir.as_string(),
                key: keys::UNABLE_TO_LIST,
                source,
            }
        })?;

        let mut listing = Listing::default();

        for entry_result in entries {
            let entry = match entry_result {
                Ok(e) => e,
                Err(_) => continue,
            };

            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    debug!(name = ?raw, "Skipping entry with non UTF-8 name");
                    continue;
                }
            };

            if name.starts_with('.') {
                continue;
            }

            // Follows symlinks; a dangling link or a vanished entry is skipped.
            let metadata = match fs::metadata(entry.path()) {
                Ok(m) => m,
                Err(_) => continue,
            };

            let is_symlink = entry
                .file_type()
                .map(|t| t.is_symlink())
                .unwrap_or(false);
            if is_symlink && self.confine_symlinks && !is_confined(&self.root, &entry.path()) {
                debug!(name = %name, "Skipping symlink resolving outside root");
                continue;
            }

            let path = dir.join(&name).as_string();
            let modified = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0);

            if metadata.is_dir() {
                listing.dirs.push(DirEntry {
                    name,
                    path,
                    modified,
                });
            } else {
                let size = metadata.len();
                listing.files.push(FileEntry {
                    name,
                    path,
                    modified,
                    size,
                    size_label: format_size(size),
                });
            }
        }

        listing.dirs.sort_by(|a, b| a.name.cmp(&b.name));
        listing.files.sort_by(|a, b| a.name.cmp(&b.name));

        debug!(
            path = %dir,
            dirs = listing.dirs.len(),
            files = listing.files.len(),
            "Listed directory"
        );
        Ok(listing)
    }

    /// Delete exactly one file. Directories are refused.
    pub fn remove(&self, path: &RelativePath) -> Result<(), StoreError> {
        match self.locate(path)? {
            Some(EntryKind::Directory) => {
                return Err(StoreError::InvalidOperation {
                    path: path.as_string(),
                    key: keys::UNABLE_TO_DELETE_FOLDERS,
                });
            }
            Some(EntryKind::File) => {}
            None => {
                return Err(StoreError::NotFound {
                    path: path.as_string(),
                });
            }
        }

        fs::remove_file(path.to_path(&self.root)).map_err(|source| {
            error!(path = %path, error = %source, "Failed to delete file");
            StoreError::Io {
                path: path.as_string(),
                key: keys::UNABLE_TO_DELETE,
                source,
            }
        })?;

        info!(path = %path, "Deleted file");
        Ok(())
    }

    /// Replace the last segment of `path` with `new_name`.
    ///
    /// Directories must get a valid folder name, files a valid file name. The
    /// parent segments are carried over unchanged.
    pub fn rename(&self, path: &RelativePath, new_name: &str) -> Result<Moved, StoreError> {
        if path.is_root() {
            return Err(StoreError::invalid_path("", keys::UNABLE_TO_MODIFY_ROOT));
        }

        let kind = match self.locate(path)? {
            Some(EntryKind::Directory) => {
                if !is_valid_folder_name(new_name) {
                    return Err(StoreError::invalid_name(new_name, keys::INVALID_FOLDER_NAME));
                }
                EntryKind::Directory
            }
            Some(EntryKind::File) => {
                if !is_valid_file_name(new_name) {
                    return Err(StoreError::invalid_name(new_name, keys::INVALID_FILE_NAME));
                }
                EntryKind::File
            }
            None => {
                return Err(StoreError::NotFound {
                    path: path.as_string(),
                });
            }
        };

        let new_path = path.with_leaf(new_name);
        if new_path != *path {
            self.ensure_vacant(&new_path, path, keys::UNABLE_TO_RENAME)?;
            self.os_rename(path, &new_path, keys::UNABLE_TO_RENAME)?;
        }

        info!(from = %path, to = %new_path, "Renamed entry");
        Ok(Moved {
            path: new_path,
            kind,
        })
    }

    /// Create a directory. The parent must exist; the leaf must be a valid
    /// folder name and nothing may exist at the target yet.
    pub fn mkdir(&self, path: &RelativePath) -> Result<RelativePath, StoreError> {
        let Some(leaf) = path.leaf() else {
            return Err(StoreError::invalid_name("", keys::INVALID_FOLDER_NAME));
        };

        let parent = path.parent();
        if self.locate(&parent)? != Some(EntryKind::Directory) {
            return Err(StoreError::invalid_path(
                parent.as_string(),
                keys::INVALID_LOCATION,
            ));
        }

        if !is_valid_folder_name(leaf) {
            return Err(StoreError::invalid_name(leaf, keys::INVALID_FOLDER_NAME));
        }

        let real_path = path.to_path(&self.root);
        if fs::symlink_metadata(&real_path).is_ok() {
            return Err(StoreError::AlreadyExists {
                path: path.as_string(),
                key: keys::FOLDER_ALREADY_EXISTS,
            });
        }

        if let Err(source) = fs::create_dir(&real_path) {
            if source.kind() == io::ErrorKind::AlreadyExists {
                return Err(StoreError::AlreadyExists {
                    path: path.as_string(),
                    key: keys::FOLDER_ALREADY_EXISTS,
                });
            }
            error!(path = %path, error = %source, "Failed to create directory");
            return Err(StoreError::Io {
                path: path.as_string(),
                key: keys::UNABLE_TO_CREATE_FOLDER,
                source,
            });
        }

        // Applied explicitly so the process umask does not narrow it.
        if let Err(e) = fs::set_permissions(&real_path, fs::Permissions::from_mode(self.dir_mode))
        {
            warn!(path = %path, error = %e, "Failed to set directory permissions");
        }

        info!(path = %path, mode = %format!("{:o}", self.dir_mode), "Created directory");
        Ok(path.clone())
    }

    /// Move `path` into `folder`, keeping its name.
    pub fn move_into(
        &self,
        path: &RelativePath,
        folder: &RelativePath,
    ) -> Result<Moved, StoreError> {
        if path.is_root() {
            return Err(StoreError::InvalidOperation {
                path: String::new(),
                key: keys::UNABLE_TO_MODIFY_ROOT,
            });
        }

        let kind = self.locate(path)?.ok_or_else(|| StoreError::NotFound {
            path: path.as_string(),
        })?;

        if self.locate(folder)? != Some(EntryKind::Directory) {
            return Err(StoreError::invalid_path(
                folder.as_string(),
                keys::INVALID_LOCATION,
            ));
        }

        if kind == EntryKind::Directory && folder.starts_with(path) {
            return Err(StoreError::InvalidOperation {
                path: path.as_string(),
                key: keys::UNABLE_TO_MOVE_INTO_ITSELF,
            });
        }

        // The leaf exists because the root was rejected above.
        let leaf = path.leaf().unwrap_or_default();
        let new_path = folder.join(leaf);
        if fs::symlink_metadata(new_path.to_path(&self.root)).is_ok() {
            return Err(StoreError::AlreadyExists {
                path: new_path.as_string(),
                key: keys::ALREADY_EXISTS,
            });
        }

        self.os_rename(path, &new_path, keys::UNABLE_TO_MOVE)?;

        info!(from = %path, to = %new_path, "Moved entry");
        Ok(Moved {
            path: new_path,
            kind,
        })
    }

    /// Refuse to clobber an existing entry; `rename(2)` would silently
    /// replace it.
    ///
    /// The check and the rename are separate syscalls. An entry created at
    /// `target` between the two is still replaced.
    fn ensure_vacant(
        &self,
        target: &RelativePath,
        source: &RelativePath,
        key: &'static str,
    ) -> Result<(), StoreError> {
        if fs::symlink_metadata(target.to_path(&self.root)).is_ok() {
            return Err(StoreError::Io {
                path: source.as_string(),
                key,
                source: io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} already exists", target),
                ),
            });
        }
        Ok(())
    }

    fn os_rename(
        &self,
        from: &RelativePath,
        to: &RelativePath,
        key: &'static str,
    ) -> Result<(), StoreError> {
        fs::rename(from.to_path(&self.root), to.to_path(&self.root)).map_err(|source| {
            error!(from = %from, to = %to, error = %source, "Rename failed");
            StoreError::Io {
                path: from.as_string(),
                key,
                source,
            }
        })
    }
}
