//! End-to-end integration tests for Rootbox.
//!
//! These tests verify complete flows work correctly:
//! - File commands through the service
//! - Confinement of every command to the root
//! - The daemon serving commands over its socket

use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;
use std::sync::Arc;

use daemon::config::Config;
use daemon::files::{is_valid_file_name, is_valid_folder_name, FileStore};
use daemon::i18n::Catalog;
use daemon::ipc::{IpcClient, IpcResponse};
use daemon::orchestrator::{DaemonOrchestrator, OrchestratorState};
use daemon::service::FileManagerService;
use protocol::messages::{DropRequest, ListRequest, MkdirRequest, RemoveRequest, RenameRequest};
use protocol::{Command, Envelope, ErrorKind, Request};
use tempfile::TempDir;

/// Create a root with `docs/report/` and `docs/a.txt`.
fn create_test_root() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join("docs/report")).unwrap();
    fs::write(temp_dir.path().join("docs/a.txt"), "Hello").unwrap();
    temp_dir
}

fn create_service(root: &Path) -> FileManagerService {
    FileManagerService::new(FileStore::new(root), Arc::new(Catalog::english()))
}

fn list(service: &FileManagerService, path: &str) -> Envelope {
    service.dispatch(&Command::List(ListRequest {
        path: path.to_string(),
    }))
}

fn names(envelope: &Envelope) -> (Vec<String>, Vec<String>) {
    let listing = envelope.listing().expect("listing payload");
    (
        listing.dirs.iter().map(|d| d.name.clone()).collect(),
        listing.files.iter().map(|f| f.name.clone()).collect(),
    )
}

// =============================================================================
// Service Tests
// =============================================================================

#[test]
fn test_list_sorts_dirs_and_files_separately() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("b.txt"), "b").unwrap();
    fs::write(temp_dir.path().join("a.txt"), "a").unwrap();
    fs::create_dir(temp_dir.path().join("Z")).unwrap();

    let service = create_service(temp_dir.path());
    let (dirs, files) = names(&list(&service, ""));

    assert_eq!(dirs, ["Z"]);
    assert_eq!(files, ["a.txt", "b.txt"]);
}

#[test]
fn test_list_twice_is_identical() {
    let temp_dir = create_test_root();
    let service = create_service(temp_dir.path());

    assert_eq!(list(&service, "docs"), list(&service, "docs"));
}

#[test]
fn test_remove_directory_is_refused() {
    let temp_dir = create_test_root();
    let service = create_service(temp_dir.path());

    let envelope = service.dispatch(&Command::Remove(RemoveRequest {
        path: "docs/report".to_string(),
    }));

    assert!(!envelope.success);
    assert_eq!(envelope.code, Some(ErrorKind::InvalidOperation));
    assert!(temp_dir.path().join("docs/report").is_dir());
}

#[test]
fn test_rename_directory() {
    let temp_dir = create_test_root();
    let service = create_service(temp_dir.path());

    let envelope = service.dispatch(&Command::Rename(RenameRequest {
        path: "docs/report".to_string(),
        new_name: "report2".to_string(),
    }));

    assert!(envelope.success);
    assert_eq!(envelope.ack().unwrap().data, "docs/report2");
    assert!(!temp_dir.path().join("docs/report").exists());
    assert!(temp_dir.path().join("docs/report2").is_dir());
}

#[test]
fn test_mkdir_then_already_exists() {
    let temp_dir = create_test_root();
    let service = create_service(temp_dir.path());
    let command = Command::Mkdir(MkdirRequest {
        path: "docs/newfolder".to_string(),
    });

    let first = service.dispatch(&command);
    assert!(first.success);
    assert_eq!(first.ack().unwrap().data, "docs/newfolder");

    let second = service.dispatch(&command);
    assert_eq!(second.code, Some(ErrorKind::AlreadyExists));
}

#[test]
fn test_full_workflow() {
    let temp_dir = create_test_root();
    let service = create_service(temp_dir.path());

    let steps = [
        Command::Mkdir(MkdirRequest {
            path: "archive".to_string(),
        }),
        Command::Rename(RenameRequest {
            path: "docs/a.txt".to_string(),
            new_name: "notes.md".to_string(),
        }),
        Command::Drop(DropRequest {
            path: "docs/notes.md".to_string(),
            folder: "archive".to_string(),
        }),
    ];
    for step in &steps {
        let envelope = service.dispatch(step);
        assert!(envelope.success, "{} failed: {:?}", step.name(), envelope.error);
    }

    let (dirs, files) = names(&list(&service, "archive"));
    assert!(dirs.is_empty());
    assert_eq!(files, ["notes.md"]);

    let envelope = service.dispatch(&Command::Remove(RemoveRequest {
        path: "archive/notes.md".to_string(),
    }));
    assert_eq!(envelope.ack().unwrap().msg, "File deleted.");

    let (_, files) = names(&list(&service, "archive"));
    assert!(files.is_empty());
}

#[test]
fn test_raw_dispatch_flow() {
    let temp_dir = create_test_root();
    let service = create_service(temp_dir.path());
    let no_params = HashMap::new();

    let envelope = service.dispatch_raw("mkdir", "docs%2FMy+Photos", &no_params);
    assert_eq!(envelope.ack().unwrap().data, "docs/My Photos");

    let params = HashMap::from([("folder".to_string(), "docs/My Photos".to_string())]);
    let envelope = service.dispatch_raw("drop", "docs/a.txt", &params);
    assert_eq!(envelope.ack().unwrap().data, "docs/My Photos/a.txt");

    let envelope = service.dispatch_raw("ls", "docs/My%20Photos", &no_params);
    let (_, files) = names(&envelope);
    assert_eq!(files, ["a.txt"]);
}

// =============================================================================
// Confinement Tests
// =============================================================================

#[test]
fn test_traversal_never_leaves_root() {
    let temp_dir = create_test_root();
    let root = temp_dir.path().join("docs");
    let service = create_service(&root);
    let victim = temp_dir.path().join("victim.txt");
    fs::write(&victim, "keep").unwrap();

    let attempts = ["..", "../", "/../victim.txt", "report/../../victim.txt", "a..b"];
    for attempt in attempts {
        let commands = [
            Command::List(ListRequest {
                path: attempt.to_string(),
            }),
            Command::Remove(RemoveRequest {
                path: attempt.to_string(),
            }),
            Command::Rename(RenameRequest {
                path: attempt.to_string(),
                new_name: "owned.txt".to_string(),
            }),
            Command::Mkdir(MkdirRequest {
                path: format!("{}/evil", attempt),
            }),
            Command::Drop(DropRequest {
                path: "a.txt".to_string(),
                folder: attempt.to_string(),
            }),
        ];

        for command in &commands {
            let envelope = service.dispatch(command);
            assert!(!envelope.success, "{} {:?} succeeded", command.name(), attempt);
            assert_eq!(envelope.code, Some(ErrorKind::InvalidPath));
        }
    }

    assert_eq!(fs::read_to_string(&victim).unwrap(), "keep");
    assert!(!temp_dir.path().join("evil").exists());
    assert!(root.join("a.txt").exists());
}

#[test]
fn test_symlink_escape_is_rejected() {
    let temp_dir = create_test_root();
    let outside = TempDir::new().unwrap();
    fs::write(outside.path().join("secret.txt"), "secret").unwrap();
    symlink(outside.path(), temp_dir.path().join("docs/escape")).unwrap();

    let service = create_service(temp_dir.path());

    let (dirs, _) = names(&list(&service, "docs"));
    assert_eq!(dirs, ["report"]);

    let envelope = list(&service, "docs/escape");
    assert_eq!(envelope.code, Some(ErrorKind::InvalidPath));

    let envelope = service.dispatch(&Command::Remove(RemoveRequest {
        path: "docs/escape/secret.txt".to_string(),
    }));
    assert_eq!(envelope.code, Some(ErrorKind::InvalidPath));
    assert!(outside.path().join("secret.txt").exists());
}

#[test]
fn test_name_grammar() {
    for name in ["docs", "My Folder", "a_b-c"] {
        assert!(is_valid_folder_name(name));
    }
    for name in ["a.b", "", "ü"] {
        assert!(!is_valid_folder_name(name));
    }
    assert!(is_valid_file_name("report.pdf"));
    assert!(!is_valid_file_name("a..txt"));
    assert!(!is_valid_file_name("noext"));
}

// =============================================================================
// Daemon Tests
// =============================================================================

fn create_daemon_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.files.root = temp_dir.path().join("root");
    config.daemon.socket_path = Some(temp_dir.path().join("daemon.sock"));
    config
}

#[tokio::test]
async fn test_daemon_serves_file_commands() {
    let temp_dir = TempDir::new().unwrap();
    let config = create_daemon_config(&temp_dir);

    let mut orchestrator = DaemonOrchestrator::new(config).unwrap();
    orchestrator.start().await.unwrap();

    let mut client = IpcClient::connect(orchestrator.socket_path()).await.unwrap();

    let envelope = client
        .file(Request::new(
            1,
            Command::Mkdir(MkdirRequest {
                path: "docs".to_string(),
            }),
        ))
        .await
        .unwrap();
    assert!(envelope.success);

    let envelope = client
        .file(Request::new(
            2,
            Command::Remove(RemoveRequest {
                path: "docs".to_string(),
            }),
        ))
        .await
        .unwrap();
    assert_eq!(envelope.code, Some(ErrorKind::InvalidOperation));
    assert!(temp_dir.path().join("root/docs").is_dir());

    orchestrator.stop().await.unwrap();
    assert_eq!(orchestrator.state().await, OrchestratorState::Stopped);
}

#[tokio::test]
async fn test_daemon_concurrent_clients() {
    let temp_dir = TempDir::new().unwrap();
    let config = create_daemon_config(&temp_dir);

    let mut orchestrator = DaemonOrchestrator::new(config).unwrap();
    orchestrator.start().await.unwrap();
    let socket_path = orchestrator.socket_path().to_path_buf();

    let mut handles = Vec::new();
    for i in 0..8u64 {
        let socket_path = socket_path.clone();
        handles.push(tokio::spawn(async move {
            let mut client = IpcClient::connect(&socket_path).await.unwrap();
            client
                .file(Request::new(
                    i,
                    Command::Mkdir(MkdirRequest {
                        path: format!("folder{}", i),
                    }),
                ))
                .await
                .unwrap()
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().success);
    }

    let mut client = IpcClient::connect(&socket_path).await.unwrap();
    let envelope = client
        .file(Request::new(100, Command::List(ListRequest::default())))
        .await
        .unwrap();
    assert_eq!(envelope.listing().unwrap().dirs.len(), 8);

    match client.status().await.unwrap() {
        IpcResponse::Status { requests, .. } => assert_eq!(requests, 9),
        other => panic!("Expected Status response, got {:?}", other),
    }

    orchestrator.stop().await.unwrap();
}

#[tokio::test]
async fn test_daemon_survives_malformed_request() {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::UnixStream;

    let temp_dir = TempDir::new().unwrap();
    let config = create_daemon_config(&temp_dir);

    let mut orchestrator = DaemonOrchestrator::new(config).unwrap();
    orchestrator.start().await.unwrap();

    let stream = UnixStream::connect(orchestrator.socket_path()).await.unwrap();
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);

    write_half.write_all(b"not json\n\"Ping\"\n").await.unwrap();
    write_half.flush().await.unwrap();

    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    let response: IpcResponse = serde_json::from_str(line.trim()).unwrap();
    assert!(matches!(response, IpcResponse::Error { .. }));

    line.clear();
    reader.read_line(&mut line).await.unwrap();
    let response: IpcResponse = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(response, IpcResponse::Pong);

    orchestrator.stop().await.unwrap();
}
