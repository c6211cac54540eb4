//! Localized messages for file manager responses.
//!
//! Messages are identified by their English text, which doubles as the
//! fallback when a catalog has no entry. A catalog is a flat TOML table:
//!
//! ```toml
//! "File deleted." = "Fichier supprimé."
//! "File not found" = "Fichier introuvable"
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use thiserror::Error;

/// Message keys used in responses.
pub mod keys {
    pub const INVALID_FOLDER_NAME: &str = "Invalid folder name";
    pub const INVALID_FILE_NAME: &str = "Invalid file name";
    pub const INVALID_LOCATION: &str = "Invalid location";
    pub const INVALID_PATH: &str = "Invalid path";
    pub const FILE_NOT_FOUND: &str = "File not found";
    pub const UNABLE_TO_DELETE_FOLDERS: &str = "Unable to delete folders";
    pub const UNABLE_TO_DELETE: &str = "Unable to delete";
    pub const UNABLE_TO_RENAME: &str = "Unable to rename";
    pub const UNABLE_TO_LIST: &str = "Unable to read folder";
    pub const UNABLE_TO_CREATE_FOLDER: &str = "Unable to create folder";
    pub const UNABLE_TO_MOVE: &str = "Unable to move";
    pub const UNABLE_TO_MOVE_INTO_ITSELF: &str = "Unable to move a folder into itself";
    pub const UNABLE_TO_MODIFY_ROOT: &str = "Unable to modify the root folder";
    pub const FOLDER_ALREADY_EXISTS: &str = "Folder already exists";
    pub const ALREADY_EXISTS: &str = "A file or folder with that name already exists";
    pub const UNKNOWN_COMMAND: &str = "Unknown command";
    pub const MISSING_PARAMETER: &str = "Missing parameter";

    pub const FILE_DELETED: &str = "File deleted.";
    pub const FILE_RENAMED: &str = "File renamed.";
    pub const FOLDER_RENAMED: &str = "Folder renamed.";
    pub const FOLDER_CREATED: &str = "Folder created.";
    pub const FILE_MOVED: &str = "File moved.";
    pub const FOLDER_MOVED: &str = "Folder moved.";
}

/// Something that can turn a message key into display text.
pub trait Translator: Send + Sync {
    /// Translate a message key. Unknown keys should come back unchanged.
    fn translate(&self, key: &str) -> String;
}

/// Errors loading a message catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The catalog file is not a flat table of strings.
    #[error("invalid catalog {path}: {message}")]
    Parse { path: String, message: String },
}

/// A message catalog backed by a key/value table.
///
/// The empty catalog returns every key unchanged.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    messages: HashMap<String, String>,
}

impl Catalog {
    /// A catalog that returns keys unchanged.
    pub fn english() -> Self {
        Self::default()
    }

    /// Build a catalog from key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            messages: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse a catalog from TOML text.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let messages: HashMap<String, String> = toml::from_str(toml_str)?;
        Ok(Self { messages })
    }

    /// Load a catalog file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let catalog = Self::from_toml(&contents).map_err(|e| CatalogError::Parse {
            path: path.display().to_string(),
            message: e.message().to_string(),
        })?;

        tracing::debug!(
            path = %path.display(),
            entries = catalog.len(),
            "Loaded message catalog"
        );
        Ok(catalog)
    }

    /// Number of translated messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the catalog has no translations.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Translator for Catalog {
    fn translate(&self, key: &str) -> String {
        self.messages
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}
