//! File manager dispatcher.
//!
//! [`FileManagerService`] receives a typed [`Command`], validates its paths,
//! runs the matching [`FileStore`] operation and shapes the outcome into an
//! [`Envelope`]. Failures never escape as errors: every one of them is turned
//! into a failure envelope with a localized message.
//!
//! Stringly callers (form handlers, query strings) use
//! [`FileManagerService::dispatch_raw`], which parses the command name into
//! [`CommandName`] and percent-decodes the path first.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use percent_encoding::percent_decode_str;
use protocol::messages::{DropRequest, ListRequest, MkdirRequest, RemoveRequest, RenameRequest};
use protocol::{Ack, Command, Envelope, ErrorKind, Payload};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::files::{EntryKind, FileStore, GuardError, RelativePath, StoreError};
use crate::i18n::{keys, Catalog, Translator};

/// Parameter carrying the new leaf name for `mv`.
pub const PARAM_RENAME: &str = "rename";
/// Parameter carrying the destination folder for `drop`.
pub const PARAM_FOLDER: &str = "folder";

/// Supported command names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandName {
    List,
    Remove,
    Rename,
    Mkdir,
    Drop,
}

impl CommandName {
    /// Build a typed command from a decoded path and the request parameters.
    ///
    /// Returns the name of the missing parameter on failure.
    fn into_command(
        self,
        path: String,
        params: &HashMap<String, String>,
    ) -> std::result::Result<Command, &'static str> {
        let param = |name: &'static str| params.get(name).cloned().ok_or(name);

        Ok(match self {
            CommandName::List => Command::List(ListRequest { path }),
            CommandName::Remove => Command::Remove(RemoveRequest { path }),
            CommandName::Rename => Command::Rename(RenameRequest {
                path,
                new_name: param(PARAM_RENAME)?,
            }),
            CommandName::Mkdir => Command::Mkdir(MkdirRequest { path }),
            CommandName::Drop => Command::Drop(DropRequest {
                path,
                folder: param(PARAM_FOLDER)?,
            }),
        })
    }
}

impl FromStr for CommandName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ls" => Ok(CommandName::List),
            "rm" => Ok(CommandName::Remove),
            "mv" => Ok(CommandName::Rename),
            "mkdir" => Ok(CommandName::Mkdir),
            "drop" => Ok(CommandName::Drop),
            other => Err(other.to_string()),
        }
    }
}

/// Decode a path received in URL form encoding. `+` decodes to a space.
pub fn decode_path(raw: &str) -> Option<String> {
    let plus_decoded = raw.replace('+', " ");
    percent_decode_str(&plus_decoded)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Dispatches file manager commands against a [`FileStore`].
#[derive(Clone)]
pub struct FileManagerService {
    store: FileStore,
    translator: Arc<dyn Translator>,
}

impl FileManagerService {
    /// Create a service over `store` using `translator` for messages.
    pub fn new(store: FileStore, translator: Arc<dyn Translator>) -> Self {
        Self { store, translator }
    }

    /// Build the service described by `config`.
    ///
    /// Creates the root directory if it does not exist yet and loads the
    /// message catalog when one is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let root = &config.files.root;
        if !root.exists() {
            std::fs::create_dir_all(root)
                .with_context(|| format!("Failed to create root directory: {}", root.display()))?;
            info!(root = %root.display(), "Created root directory");
        }

        let catalog = match &config.i18n.catalog {
            Some(path) => Catalog::load(path)
                .with_context(|| format!("Failed to load message catalog: {}", path.display()))?,
            None => Catalog::english(),
        };

        let store = FileStore::new(root)
            .confine_symlinks(config.files.confine_symlinks)
            .with_dir_mode(config.files.dir_mode);

        Ok(Self::new(store, Arc::new(catalog)))
    }

    /// The root directory all commands are confined to.
    pub fn root(&self) -> &Path {
        self.store.root()
    }

    /// Execute a command.
    pub fn dispatch(&self, command: &Command) -> Envelope {
        debug!(command = command.name(), path = command.path(), "Dispatching file command");

        let result = match command {
            Command::List(req) => self.handle_list(req),
            Command::Remove(req) => self.handle_remove(req),
            Command::Rename(req) => self.handle_rename(req),
            Command::Mkdir(req) => self.handle_mkdir(req),
            Command::Drop(req) => self.handle_drop(req),
        };

        match result {
            Ok(payload) => Envelope::success(payload),
            Err(e) => {
                debug!(command = command.name(), error = %e, "File command failed");
                self.failure(&e)
            }
        }
    }

    /// Execute a command given by name, with a URL-encoded path.
    ///
    /// `params` supplies `rename` for `mv` and `folder` for `drop`; its values
    /// are expected to be decoded already.
    pub fn dispatch_raw(
        &self,
        command_name: &str,
        raw_path: &str,
        params: &HashMap<String, String>,
    ) -> Envelope {
        let name = match command_name.parse::<CommandName>() {
            Ok(name) => name,
            Err(unknown) => {
                warn!(command = %unknown, "Unknown file command");
                return self.message_failure(
                    ErrorKind::InvalidOperation,
                    keys::UNKNOWN_COMMAND,
                    Some(unknown.as_str()),
                );
            }
        };

        let Some(path) = decode_path(raw_path) else {
            return self.message_failure(ErrorKind::InvalidPath, keys::INVALID_PATH, None);
        };

        match name.into_command(path, params) {
            Ok(command) => self.dispatch(&command),
            Err(missing) => {
                self.message_failure(ErrorKind::InvalidName, keys::MISSING_PARAMETER, Some(missing))
            }
        }
    }

    fn handle_list(&self, req: &ListRequest) -> Result<Payload, StoreError> {
        let path = parse_path(&req.path, keys::INVALID_FOLDER_NAME)?;
        Ok(Payload::Listing(self.store.list(&path)?))
    }

    fn handle_remove(&self, req: &RemoveRequest) -> Result<Payload, StoreError> {
        let path = parse_path(&req.path, keys::INVALID_PATH)?;
        self.store.remove(&path)?;
        Ok(self.ack(keys::FILE_DELETED, &path))
    }

    fn handle_rename(&self, req: &RenameRequest) -> Result<Payload, StoreError> {
        let path = parse_path(&req.path, keys::INVALID_PATH)?;
        let moved = self.store.rename(&path, &req.new_name)?;
        let key = match moved.kind {
            EntryKind::Directory => keys::FOLDER_RENAMED,
            EntryKind::File => keys::FILE_RENAMED,
        };
        Ok(self.ack(key, &moved.path))
    }

    fn handle_mkdir(&self, req: &MkdirRequest) -> Result<Payload, StoreError> {
        let path = parse_path(&req.path, keys::INVALID_LOCATION)?;
        let created = self.store.mkdir(&path)?;
        Ok(self.ack(keys::FOLDER_CREATED, &created))
    }

    fn handle_drop(&self, req: &DropRequest) -> Result<Payload, StoreError> {
        let path = parse_path(&req.path, keys::INVALID_PATH)?;
        let folder = parse_path(&req.folder, keys::INVALID_LOCATION)?;
        let moved = self.store.move_into(&path, &folder)?;
        let key = match moved.kind {
            EntryKind::Directory => keys::FOLDER_MOVED,
            EntryKind::File => keys::FILE_MOVED,
        };
        Ok(self.ack(key, &moved.path))
    }

    fn ack(&self, key: &str, path: &RelativePath) -> Payload {
        Payload::Ack(Ack {
            msg: self.translator.translate(key),
            data: path.as_string(),
        })
    }

    fn failure(&self, error: &StoreError) -> Envelope {
        self.message_failure(error.kind(), error.message_key(), error.subject())
    }

    fn message_failure(&self, kind: ErrorKind, key: &str, subject: Option<&str>) -> Envelope {
        let message = self.translator.translate(key);
        let message = match subject {
            Some(subject) => format!("{} {}", message, subject),
            None => message,
        };
        Envelope::failure(kind, message)
    }
}

fn parse_path(raw: &str, key: &'static str) -> Result<RelativePath, StoreError> {
    RelativePath::parse(raw).map_err(|e| {
        if let GuardError::Traversal(_) = e {
            warn!(path = %raw, "Rejected path traversal attempt");
        }
        StoreError::invalid_path(raw, key)
    })
}
