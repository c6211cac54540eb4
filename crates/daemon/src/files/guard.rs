//! Path and name validation for the sandboxed root.
//!
//! Every caller-supplied location goes through [`RelativePath::parse`] before
//! it reaches the filesystem, and every name that will be created on disk goes
//! through [`is_valid_folder_name`] or [`is_valid_file_name`].
//!
//! # Security
//!
//! Traversal is rejected at the string level: any path containing `..`
//! anywhere is refused, even when `..` is part of a longer segment. This check
//! alone does not follow symlinks; [`is_confined`] adds the canonical
//! containment check used when symlink confinement is enabled.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors produced while parsing a relative path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GuardError {
    /// The path contains `..`.
    #[error("path traversal detected: {0}")]
    Traversal(String),

    /// The path contains a NUL byte.
    #[error("path contains a NUL byte")]
    NulByte,
}

/// The kind of entry a location is expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// An existing directory.
    Directory,
    /// Any existing entry (file, directory, or other).
    Entry,
}

/// Check that `relative` names an existing entry of `kind` under `root`.
///
/// Leading and trailing slashes are ignored. Any occurrence of `..` fails the
/// check before the filesystem is consulted. Symlinks are followed when
/// testing the kind, so this alone does not prove containment.
pub fn is_within_root(root: &Path, relative: &str, kind: TargetKind) -> bool {
    let trimmed = relative.trim_matches('/');
    if trimmed.contains("..") {
        return false;
    }

    let target = root.join(trimmed);
    match kind {
        TargetKind::Directory => target.is_dir(),
        TargetKind::Entry => target.exists(),
    }
}

/// Check that `target` resolves, after following symlinks, to a location
/// inside `root`.
///
/// Returns false when either path cannot be canonicalized.
pub fn is_confined(root: &Path, target: &Path) -> bool {
    let Ok(root_canonical) = fs::canonicalize(root) else {
        return false;
    };
    match fs::canonicalize(target) {
        Ok(canonical) => canonical.starts_with(&root_canonical),
        Err(_) => false,
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-')
}

fn is_extension_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-')
}

/// Folder names: one or more of `[A-Za-z0-9 _-]`.
pub fn is_valid_folder_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_name_char)
}

/// File names: a folder-name base, one dot, and an extension of
/// `[A-Za-z0-9_-]`.
///
/// The name is split at its last dot and each half is checked on its own.
/// Since the base alphabet has no dot, a name with more than one dot always
/// fails.
pub fn is_valid_file_name(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((base, extension)) => {
            is_valid_folder_name(base)
                && !extension.is_empty()
                && extension.chars().all(is_extension_char)
        }
        None => false,
    }
}

/// A normalized location under the root.
///
/// Stored as a list of non-empty segments, none of which is `.` or contains
/// `..`. The empty path is the root itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RelativePath {
    segments: Vec<String>,
}

impl RelativePath {
    /// The root itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a caller-supplied, already decoded path.
    ///
    /// Empty segments and `.` segments are dropped, so `"/docs//./a.txt/"`
    /// becomes `docs/a.txt`.
    pub fn parse(raw: &str) -> Result<Self, GuardError> {
        if raw.contains("..") {
            return Err(GuardError::Traversal(raw.to_string()));
        }
        if raw.contains('\0') {
            return Err(GuardError::NulByte);
        }

        let segments = raw
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .map(str::to_string)
            .collect();

        Ok(Self { segments })
    }

    /// Whether this is the root itself.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The final segment, or `None` for the root.
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Everything but the final segment. The root is its own parent.
    pub fn parent(&self) -> RelativePath {
        let mut segments = self.segments.clone();
        segments.pop();
        Self { segments }
    }

    /// Append a single segment.
    ///
    /// The caller is responsible for validating `name`.
    pub fn join(&self, name: &str) -> RelativePath {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self { segments }
    }

    /// Replace the final segment, keeping the parent segments unchanged.
    pub fn with_leaf(&self, name: &str) -> RelativePath {
        self.parent().join(name)
    }

    /// Whether `self` is `other` or lies underneath it.
    pub fn starts_with(&self, other: &RelativePath) -> bool {
        self.segments.starts_with(&other.segments)
    }

    /// Slash-separated form with no leading or trailing slash.
    pub fn as_string(&self) -> String {
        self.segments.join("/")
    }

    /// The absolute location of this path under `root`.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in &self.segments {
            path.push(segment);
        }
        path
    }
}

impl std::fmt::Display for RelativePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn create_test_structure(dir: &Path) {
        fs::create_dir_all(dir.join("docs/report")).unwrap();
        fs::write(dir.join("docs/a.txt"), "Hello").unwrap();
    }

    #[test]
    fn test_within_root_directory() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());

        assert!(is_within_root(temp_dir.path(), "docs", TargetKind::Directory));
        assert!(is_within_root(temp_dir.path(), "/docs/report/", TargetKind::Directory));
        assert!(is_within_root(temp_dir.path(), "", TargetKind::Directory));
        assert!(!is_within_root(temp_dir.path(), "docs/a.txt", TargetKind::Directory));
        assert!(!is_within_root(temp_dir.path(), "missing", TargetKind::Directory));
    }

    #[test]
    fn test_within_root_entry() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());

        assert!(is_within_root(temp_dir.path(), "docs/a.txt", TargetKind::Entry));
        assert!(is_within_root(temp_dir.path(), "docs", TargetKind::Entry));
        assert!(!is_within_root(temp_dir.path(), "docs/b.txt", TargetKind::Entry));
    }

    #[test]
    fn test_within_root_rejects_any_double_dot() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());
        fs::create_dir_all(temp_dir.path().join("a..b")).unwrap();

        for candidate in ["..", "../", "docs/..", "docs/../docs", "a..b", "/..", "x/../../etc"] {
            assert!(
                !is_within_root(temp_dir.path(), candidate, TargetKind::Directory),
                "{candidate} should be rejected"
            );
            assert!(!is_within_root(temp_dir.path(), candidate, TargetKind::Entry));
        }
    }

    #[test]
    fn test_within_root_ignores_symlinks() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        symlink(outside.path(), temp_dir.path().join("escape")).unwrap();

        // The string-level check alone accepts the link.
        assert!(is_within_root(temp_dir.path(), "escape", TargetKind::Directory));
        assert!(!is_confined(temp_dir.path(), &temp_dir.path().join("escape")));
    }

    #[test]
    fn test_is_confined() {
        let temp_dir = TempDir::new().unwrap();
        create_test_structure(temp_dir.path());
        symlink(
            temp_dir.path().join("docs/a.txt"),
            temp_dir.path().join("link.txt"),
        )
        .unwrap();

        assert!(is_confined(temp_dir.path(), &temp_dir.path().join("docs")));
        assert!(is_confined(temp_dir.path(), &temp_dir.path().join("link.txt")));
        assert!(is_confined(temp_dir.path(), temp_dir.path()));
        assert!(!is_confined(temp_dir.path(), &temp_dir.path().join("missing")));
    }

    #[test]
    fn test_folder_names() {
        for name in ["docs", "My Folder", "a_b-c", "2024", " ", "Z"] {
            assert!(is_valid_folder_name(name), "{name:?} should be valid");
        }
        for name in ["", "a.b", "a/b", "..", "naïve", "tab\there", "semi;colon", "back\\slash"] {
            assert!(!is_valid_folder_name(name), "{name:?} should be invalid");
        }
    }

    #[test]
    fn test_file_names() {
        for name in ["a.txt", "My Report.pdf", "x-y_z.tar_gz", "1.2", "photo.JPG"] {
            assert!(is_valid_file_name(name), "{name:?} should be valid");
        }
        for name in [
            "a..txt", "noext", "a.b.c", ".txt", "a.", "a.t xt", "a/b.txt", "", ".", "é.txt",
        ] {
            assert!(!is_valid_file_name(name), "{name:?} should be invalid");
        }
    }

    #[test]
    fn test_parse_normalizes() {
        let path = RelativePath::parse("/docs//./report/").unwrap();
        assert_eq!(path.segments(), ["docs", "report"]);
        assert_eq!(path.as_string(), "docs/report");
        assert_eq!(path.leaf(), Some("report"));
        assert_eq!(path.parent().as_string(), "docs");
    }

    #[test]
    fn test_parse_root() {
        for raw in ["", "/", "//", "./", "."] {
            let path = RelativePath::parse(raw).unwrap();
            assert!(path.is_root(), "{raw:?} should be the root");
            assert_eq!(path.leaf(), None);
        }
        assert!(RelativePath::root().parent().is_root());
    }

    #[test]
    fn test_parse_rejects_traversal() {
        assert_eq!(
            RelativePath::parse("docs/../etc"),
            Err(GuardError::Traversal("docs/../etc".to_string()))
        );
        assert!(RelativePath::parse("a..b").is_err());
        assert_eq!(RelativePath::parse("a\0b"), Err(GuardError::NulByte));
    }

    #[test]
    fn test_with_leaf_keeps_parent() {
        let path = RelativePath::parse("docs/report").unwrap();
        assert_eq!(path.with_leaf("report2").as_string(), "docs/report2");

        let top = RelativePath::parse("report").unwrap();
        assert_eq!(top.with_leaf("report2").as_string(), "report2");
    }

    #[test]
    fn test_starts_with() {
        let docs = RelativePath::parse("docs").unwrap();
        let nested = RelativePath::parse("docs/report").unwrap();
        let sibling = RelativePath::parse("docs2").unwrap();

        assert!(nested.starts_with(&docs));
        assert!(docs.starts_with(&docs));
        assert!(!sibling.starts_with(&docs));
        assert!(docs.starts_with(&RelativePath::root()));
    }

    #[test]
    fn test_to_path() {
        let root = Path::new("/srv/files");
        let path = RelativePath::parse("docs/a.txt").unwrap();
        assert_eq!(path.to_path(root), PathBuf::from("/srv/files/docs/a.txt"));
        assert_eq!(RelativePath::root().to_path(root), PathBuf::from("/srv/files"));
    }
}
