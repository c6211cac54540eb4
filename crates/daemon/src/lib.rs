//! # Rootbox Daemon Library
//!
//! This crate provides a file manager confined to a single root directory,
//! and the daemon that serves it to local clients.
//!
//! ## Overview
//!
//! - **Path Guard**: traversal checks, path normalization and the folder and
//!   file name grammars
//! - **File Store**: list, delete, rename, mkdir and move under the root
//! - **Service**: typed command dispatch shaping every outcome into an
//!   [`protocol::Envelope`]
//! - **Daemon**: a Unix socket server running commands concurrently
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                 Daemon Orchestrator                   │
//! │   IpcServer ──► connection tasks ──► spawn_blocking   │
//! └──────────────────────────┬────────────────────────────┘
//!                            │
//!               ┌────────────▼────────────┐
//!               │   FileManagerService    │──► Translator
//!               └────────────┬────────────┘
//!                            │
//!               ┌────────────▼────────────┐
//!               │   FileStore + guard     │──► filesystem (root)
//!               └─────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use daemon::files::FileStore;
//! use daemon::i18n::Catalog;
//! use daemon::service::FileManagerService;
//! use protocol::messages::MkdirRequest;
//! use protocol::Command;
//!
//! let service = FileManagerService::new(
//!     FileStore::new("/srv/files"),
//!     Arc::new(Catalog::english()),
//! );
//!
//! let envelope = service.dispatch(&Command::Mkdir(MkdirRequest {
//!     path: "docs/newfolder".to_string(),
//! }));
//! assert!(envelope.success);
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`files`]: Path validation and filesystem operations
//! - [`service`]: Command dispatch and response shaping
//! - [`i18n`]: Message keys and catalogs
//! - [`ipc`]: Unix socket server and client
//! - [`orchestrator`]: Main daemon coordinator

pub mod config;
pub mod files;
pub mod i18n;
pub mod ipc;
pub mod orchestrator;
pub mod service;

// Re-export protocol for convenience
pub use protocol;

pub use config::Config;
pub use files::{FileStore, RelativePath, StoreError};
pub use i18n::{Catalog, Translator};
pub use orchestrator::{DaemonOrchestrator, OrchestratorEvent, OrchestratorState};
pub use service::{CommandName, FileManagerService};
