//! Unix Domain Socket IPC module for CLI-daemon communication.
//!
//! The daemon exposes the file manager to local processes over a Unix Domain
//! Socket. Filesystem permissions on the socket directory decide who may
//! connect.
//!
//! ## Overview
//!
//! The IPC system uses a JSON newline-delimited protocol. Each message is a
//! single JSON object followed by a newline. File commands travel as
//! [`protocol::Request`] values inside [`IpcRequest::File`] and come back as
//! an [`protocol::Envelope`] inside [`IpcResponse::File`].
//!
//! ## Socket Path
//!
//! - Primary: `$XDG_RUNTIME_DIR/rootbox/daemon.sock`
//! - Fallback: `/tmp/rootbox-$UID/daemon.sock`
//!
//! ## Example
//!
//! ```rust,no_run
//! use daemon::ipc::{IpcClient, get_socket_path};
//! use protocol::{Command, Request};
//! use protocol::messages::ListRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = IpcClient::connect(&get_socket_path()).await?;
//!
//!     let envelope = client
//!         .file(Request::new(1, Command::List(ListRequest::default())))
//!         .await?;
//!     println!("{}", envelope.to_json()?);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod messages;
mod server;

pub use client::IpcClient;
pub use messages::{IpcRequest, IpcResponse};
pub use server::{IpcConnection, IpcError, IpcServer};

use std::path::PathBuf;

/// Get the socket path for IPC communication.
///
/// ## Path Resolution
///
/// 1. If `$XDG_RUNTIME_DIR` is set: `$XDG_RUNTIME_DIR/rootbox/daemon.sock`
/// 2. Otherwise: `/tmp/rootbox-$UID/daemon.sock`
pub fn get_socket_path() -> PathBuf {
    use std::os::unix::fs::MetadataExt;

    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join("rootbox").join("daemon.sock")
    } else {
        // Get UID by checking metadata of a file we own
        let uid = std::fs::metadata("/proc/self")
            .map(|m| m.uid())
            .unwrap_or(0);

        PathBuf::from(format!("/tmp/rootbox-{}", uid)).join("daemon.sock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_get_socket_path_with_xdg_runtime_dir() {
        let original = std::env::var("XDG_RUNTIME_DIR").ok();

        std::env::set_var("XDG_RUNTIME_DIR", "/run/user/1000");
        let path = get_socket_path();
        assert_eq!(path, PathBuf::from("/run/user/1000/rootbox/daemon.sock"));

        match original {
            Some(val) => std::env::set_var("XDG_RUNTIME_DIR", val),
            None => std::env::remove_var("XDG_RUNTIME_DIR"),
        }
    }

    #[test]
    #[serial]
    fn test_get_socket_path_without_xdg_runtime_dir() {
        let original = std::env::var("XDG_RUNTIME_DIR").ok();

        std::env::remove_var("XDG_RUNTIME_DIR");
        let path = get_socket_path();
        assert!(path.to_str().unwrap().starts_with("/tmp/rootbox-"));
        assert!(path.to_str().unwrap().ends_with("/daemon.sock"));

        if let Some(val) = original {
            std::env::set_var("XDG_RUNTIME_DIR", val);
        }
    }

    #[test]
    #[serial]
    fn test_socket_path_ends_with_sock() {
        let path = get_socket_path();
        assert!(path.extension().map(|e| e == "sock").unwrap_or(false));
    }
}
