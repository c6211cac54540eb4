//! Protocol message definitions for Rootbox.
//!
//! This module defines the request and response types exchanged between the
//! file manager service and its callers. All messages are serialized as JSON.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Request wrapper carrying a single file manager command.
///
/// The wrapper provides versioning and a caller-chosen sequence number that
/// is echoed back with the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Protocol version for compatibility checking.
    pub version: u8,
    /// Sequence number for matching responses to requests.
    pub sequence: u64,
    /// The command to execute.
    pub command: Command,
}

impl Request {
    /// Create a new request with the current protocol version.
    pub fn new(sequence: u64, command: Command) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            sequence,
            command,
        }
    }

    /// Parse a request from JSON, rejecting unknown protocol versions.
    pub fn from_json(json: &str) -> Result<Self> {
        let request: Request = serde_json::from_str(json)?;
        if request.version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion {
                expected: PROTOCOL_VERSION,
                got: request.version,
            });
        }
        Ok(request)
    }

    /// Serialize the request to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// The closed set of file manager commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Command {
    /// List the direct children of a directory.
    List(ListRequest),
    /// Delete a single file.
    Remove(RemoveRequest),
    /// Replace the last segment of a path.
    Rename(RenameRequest),
    /// Create a directory.
    Mkdir(MkdirRequest),
    /// Move an entry into another folder.
    Drop(DropRequest),
}

impl Command {
    /// Short command name, as used by the HTTP-style routes.
    pub fn name(&self) -> &'static str {
        match self {
            Command::List(_) => "ls",
            Command::Remove(_) => "rm",
            Command::Rename(_) => "mv",
            Command::Mkdir(_) => "mkdir",
            Command::Drop(_) => "drop",
        }
    }

    /// The primary path argument of the command.
    pub fn path(&self) -> &str {
        match self {
            Command::List(req) => &req.path,
            Command::Remove(req) => &req.path,
            Command::Rename(req) => &req.path,
            Command::Mkdir(req) => &req.path,
            Command::Drop(req) => &req.path,
        }
    }

    /// Whether the command changes the filesystem.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Command::List(_))
    }
}

/// Request to list a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ListRequest {
    /// Directory to list, relative to the root. Empty lists the root.
    #[serde(default)]
    pub path: String,
}

/// Request to delete a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveRequest {
    /// File to delete, relative to the root.
    pub path: String,
}

/// Request to rename a file or directory in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRequest {
    /// Existing entry, relative to the root.
    pub path: String,
    /// New leaf name.
    pub new_name: String,
}

/// Request to create a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MkdirRequest {
    /// Parent path plus the new folder name.
    pub path: String,
}

/// Request to move an entry into a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropRequest {
    /// Entry being moved, relative to the root.
    pub path: String,
    /// Destination folder, relative to the root. Empty means the root.
    pub folder: String,
}

// ============================================================================
// Responses
// ============================================================================

/// Uniform response shape returned for every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Whether the command succeeded.
    pub success: bool,
    /// Payload on success.
    pub data: Option<Payload>,
    /// Human-readable, localized message on failure.
    pub error: Option<String>,
    /// Failure category for programmatic handling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorKind>,
}

impl Envelope {
    /// Build a success envelope.
    pub fn success(data: Payload) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            code: None,
        }
    }

    /// Build a failure envelope.
    pub fn failure(code: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            code: Some(code),
        }
    }

    /// Returns the listing payload, if any.
    pub fn listing(&self) -> Option<&Listing> {
        match &self.data {
            Some(Payload::Listing(listing)) => Some(listing),
            _ => None,
        }
    }

    /// Returns the acknowledgement payload, if any.
    pub fn ack(&self) -> Option<&Ack> {
        match &self.data {
            Some(Payload::Ack(ack)) => Some(ack),
            _ => None,
        }
    }

    /// Serialize the envelope to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Success payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// Directory listing.
    Listing(Listing),
    /// Confirmation of a mutation.
    Ack(Ack),
}

/// Directory listing, directories and files reported separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Listing {
    /// Subdirectories sorted by name.
    pub dirs: Vec<DirEntry>,
    /// Files sorted by name.
    pub files: Vec<FileEntry>,
}

/// Confirmation of a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Localized confirmation message.
    pub msg: String,
    /// The affected path after the operation.
    pub data: String,
}

/// A directory in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Path relative to the root.
    pub path: String,
    /// Last modified timestamp (Unix epoch seconds).
    pub modified: u64,
}

/// A file in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Path relative to the root.
    pub path: String,
    /// Last modified timestamp (Unix epoch seconds).
    pub modified: u64,
    /// Size in bytes.
    pub size: u64,
    /// Human-readable size, e.g. "2 KB".
    pub size_label: String,
}

/// Failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Traversal attempt or a missing/wrong-kind target location.
    InvalidPath,
    /// A name that fails the folder or file grammar.
    InvalidName,
    /// Target does not exist.
    NotFound,
    /// Something already exists at the target location.
    AlreadyExists,
    /// Request is well-formed but not allowed.
    InvalidOperation,
    /// Underlying OS failure.
    IoError,
}
