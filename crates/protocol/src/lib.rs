//! # Rootbox Protocol Library
//!
//! Wire types for the Rootbox sandboxed file manager.
//!
//! ## Overview
//!
//! - **Requests**: a versioned [`Request`] wrapping one [`Command`]
//!   (`ls`, `rm`, `mv`, `mkdir`, `drop`)
//! - **Responses**: the uniform [`Envelope`] `{success, data, error}`
//!   carrying either a [`Listing`] or an [`Ack`]
//! - **Errors**: the [`ErrorKind`] taxonomy reported with failures
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{Command, Request};
//! use protocol::messages::MkdirRequest;
//!
//! let request = Request::new(1, Command::Mkdir(MkdirRequest {
//!     path: "docs/newfolder".to_string(),
//! }));
//! let json = request.to_json().unwrap();
//! assert_eq!(Request::from_json(&json).unwrap(), request);
//! ```
//!
//! ## Modules
//!
//! - [`messages`]: Protocol message definitions
//! - [`error`]: Error types

pub mod error;
pub mod messages;

pub use error::{ProtocolError, Result};
pub use messages::{
    Ack, Command, DirEntry, Envelope, ErrorKind, FileEntry, Listing, Payload, Request,
    PROTOCOL_VERSION,
};
