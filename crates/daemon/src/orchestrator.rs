//! Daemon orchestrator for wiring together all components.
//!
//! This module provides the `DaemonOrchestrator` that builds the file manager
//! service from the configuration, binds the control socket and serves every
//! client connection on its own task until shutdown.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use protocol::{ProtocolError, PROTOCOL_VERSION};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::ipc::{get_socket_path, IpcConnection, IpcError, IpcRequest, IpcResponse, IpcServer};
use crate::service::FileManagerService;

/// Daemon orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// Initial state, not started.
    Stopped,
    /// Starting up, binding the socket.
    Starting,
    /// Running and accepting connections.
    Running,
    /// Shutting down gracefully.
    ShuttingDown,
}

/// Events emitted by the orchestrator.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    /// Orchestrator state changed.
    StateChanged(OrchestratorState),
    /// A client connected to the control socket.
    ClientConnected,
    /// A client disconnected.
    ClientDisconnected,
    /// A client asked the daemon to stop.
    StopRequested,
    /// Error occurred.
    Error { message: String },
}

/// Counters reported by `Status`.
#[derive(Debug)]
struct DaemonStats {
    started_at: Instant,
    requests: AtomicU64,
}

impl DaemonStats {
    fn new() -> Self {
        Self {
            started_at: Instant::now(),
            requests: AtomicU64::new(0),
        }
    }
}

/// State shared by every connection task.
#[derive(Clone)]
struct ConnectionContext {
    service: Arc<FileManagerService>,
    stats: Arc<DaemonStats>,
    shutdown_token: CancellationToken,
    event_tx: broadcast::Sender<OrchestratorEvent>,
}

/// Daemon orchestrator that manages all subsystems.
pub struct DaemonOrchestrator {
    /// Control socket location.
    socket_path: PathBuf,
    /// Current state.
    state: Arc<RwLock<OrchestratorState>>,
    /// The file manager all requests are dispatched to.
    service: Arc<FileManagerService>,
    /// Uptime and request counters.
    stats: Arc<DaemonStats>,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
    /// Event sender.
    event_tx: broadcast::Sender<OrchestratorEvent>,
    /// The accept loop, while running.
    accept_task: Option<JoinHandle<()>>,
}

impl DaemonOrchestrator {
    /// Creates a new daemon orchestrator.
    pub fn new(config: Config) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let service = FileManagerService::from_config(&config)?;
        let socket_path = config
            .daemon
            .socket_path
            .clone()
            .unwrap_or_else(get_socket_path);

        let (event_tx, _) = broadcast::channel(256);

        info!(
            root = %service.root().display(),
            socket = %socket_path.display(),
            confine_symlinks = config.files.confine_symlinks,
            "Daemon orchestrator initialized"
        );

        Ok(Self {
            socket_path,
            state: Arc::new(RwLock::new(OrchestratorState::Stopped)),
            service: Arc::new(service),
            stats: Arc::new(DaemonStats::new()),
            shutdown_token: CancellationToken::new(),
            event_tx,
            accept_task: None,
        })
    }

    /// Returns the current state.
    pub async fn state(&self) -> OrchestratorState {
        *self.state.read().await
    }

    /// Returns a receiver for orchestrator events.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.event_tx.subscribe()
    }

    /// Starts serving the control socket.
    pub async fn start(&mut self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state != OrchestratorState::Stopped {
                anyhow::bail!("Orchestrator is already running");
            }
            *state = OrchestratorState::Starting;
        }
        self.emit_event(OrchestratorEvent::StateChanged(OrchestratorState::Starting));

        info!("Starting daemon orchestrator...");

        let server = match IpcServer::bind(&self.socket_path).await {
            Ok(server) => server,
            Err(e) => {
                *self.state.write().await = OrchestratorState::Stopped;
                return Err(e).with_context(|| {
                    format!("Failed to bind socket: {}", self.socket_path.display())
                });
            }
        };
        info!(socket = %self.socket_path.display(), "Listening for clients");

        self.stats = Arc::new(DaemonStats::new());
        let context = ConnectionContext {
            service: Arc::clone(&self.service),
            stats: Arc::clone(&self.stats),
            shutdown_token: self.shutdown_token.clone(),
            event_tx: self.event_tx.clone(),
        };
        self.accept_task = Some(tokio::spawn(Self::accept_loop(server, context)));

        {
            let mut state = self.state.write().await;
            *state = OrchestratorState::Running;
        }
        self.emit_event(OrchestratorEvent::StateChanged(OrchestratorState::Running));

        info!("Daemon orchestrator started successfully");
        Ok(())
    }

    /// Accepts clients until shutdown. The socket file is removed when the
    /// server is dropped at the end of the loop.
    async fn accept_loop(server: IpcServer, context: ConnectionContext) {
        loop {
            tokio::select! {
                _ = context.shutdown_token.cancelled() => {
                    debug!("Accept loop received shutdown signal");
                    break;
                }
                accepted = server.accept() => {
                    match accepted {
                        Ok(conn) => {
                            let _ = context.event_tx.send(OrchestratorEvent::ClientConnected);
                            tokio::spawn(Self::handle_connection(conn, context.clone()));
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            let _ = context.event_tx.send(OrchestratorEvent::Error {
                                message: e.to_string(),
                            });
                        }
                    }
                }
            }
        }
    }

    /// Serves one client until it disconnects or the daemon shuts down.
    async fn handle_connection(mut conn: IpcConnection, context: ConnectionContext) {
        loop {
            let request = tokio::select! {
                _ = context.shutdown_token.cancelled() => break,
                request = conn.read_request() => request,
            };

            let response = match request {
                Ok(Some(request)) => Self::handle_request(request, &context).await,
                Ok(None) => break,
                Err(IpcError::Json(e)) => {
                    warn!("Malformed request from client: {}", e);
                    IpcResponse::Error {
                        message: format!("malformed request: {}", e),
                    }
                }
                Err(e) => {
                    debug!("Client connection error: {}", e);
                    break;
                }
            };

            if let Err(e) = conn.send_response(&response).await {
                debug!("Failed to send response: {}", e);
                break;
            }
        }

        let _ = context.event_tx.send(OrchestratorEvent::ClientDisconnected);
    }

    async fn handle_request(request: IpcRequest, context: &ConnectionContext) -> IpcResponse {
        match request {
            IpcRequest::Ping => IpcResponse::Pong,
            IpcRequest::Status => IpcResponse::Status {
                running: !context.shutdown_token.is_cancelled(),
                uptime_secs: context.stats.started_at.elapsed().as_secs(),
                root: context.service.root().display().to_string(),
                requests: context.stats.requests.load(Ordering::Relaxed),
            },
            IpcRequest::Stop => {
                info!("Stop requested over IPC");
                let _ = context.event_tx.send(OrchestratorEvent::StopRequested);
                context.shutdown_token.cancel();
                IpcResponse::Stopping
            }
            IpcRequest::File(request) => {
                if request.version != PROTOCOL_VERSION {
                    let e = ProtocolError::UnsupportedVersion {
                        expected: PROTOCOL_VERSION,
                        got: request.version,
                    };
                    return IpcResponse::Error {
                        message: e.to_string(),
                    };
                }

                context.stats.requests.fetch_add(1, Ordering::Relaxed);
                let sequence = request.sequence;
                if request.command.is_mutation() {
                    info!(
                        sequence,
                        command = request.command.name(),
                        path = request.command.path(),
                        "Applying file change"
                    );
                }
                let service = Arc::clone(&context.service);

                match tokio::task::spawn_blocking(move || service.dispatch(&request.command)).await
                {
                    Ok(envelope) => IpcResponse::File { sequence, envelope },
                    Err(e) => {
                        error!(sequence, "File command task failed: {}", e);
                        IpcResponse::Error {
                            message: format!("file command failed: {}", e),
                        }
                    }
                }
            }
        }
    }

    /// Stops the daemon orchestrator gracefully.
    pub async fn stop(&mut self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state == OrchestratorState::Stopped {
                return Ok(());
            }
            if *state == OrchestratorState::ShuttingDown {
                anyhow::bail!("Orchestrator is already shutting down");
            }
            *state = OrchestratorState::ShuttingDown;
        }
        self.emit_event(OrchestratorEvent::StateChanged(
            OrchestratorState::ShuttingDown,
        ));

        info!("Stopping daemon orchestrator...");

        self.shutdown_token.cancel();

        if let Some(task) = self.accept_task.take() {
            if let Err(e) = task.await {
                warn!("Accept loop ended abnormally: {}", e);
            }
        }

        {
            let mut state = self.state.write().await;
            *state = OrchestratorState::Stopped;
        }
        self.emit_event(OrchestratorEvent::StateChanged(OrchestratorState::Stopped));

        info!("Daemon orchestrator stopped");
        Ok(())
    }

    fn emit_event(&self, event: OrchestratorEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Returns the control socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Returns the file manager service.
    pub fn service(&self) -> &Arc<FileManagerService> {
        &self.service
    }

    /// Returns the number of file commands handled since start.
    pub fn request_count(&self) -> u64 {
        self.stats.requests.load(Ordering::Relaxed)
    }

    /// Returns the shutdown token for external tasks to observe shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }
}
