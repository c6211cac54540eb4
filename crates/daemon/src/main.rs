//! Rootbox Daemon
//!
//! Serves a sandboxed file manager over a local socket, and doubles as its
//! command-line client.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use daemon::config::Config;
use daemon::ipc::{get_socket_path, IpcClient, IpcResponse};
use daemon::orchestrator::{DaemonOrchestrator, OrchestratorEvent};
use daemon::service::FileManagerService;
use protocol::messages::{DropRequest, ListRequest, MkdirRequest, RemoveRequest, RenameRequest};
use protocol::{Command, Envelope, Request};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Rootbox Daemon - sandboxed file manager confined to a single root.
#[derive(Parser, Debug)]
#[command(name = "rootbox")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run file commands in-process instead of through the daemon
    #[arg(long, global = true)]
    pub local: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the daemon.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the Rootbox daemon
    Start,

    /// Stop the running daemon
    Stop {
        /// Timeout in seconds for graceful shutdown (default: 30)
        #[arg(long, default_value = "30")]
        timeout: u64,
    },

    /// Show daemon status
    Status,

    /// List a directory
    Ls {
        /// Directory relative to the root
        #[arg(default_value = "")]
        path: String,
    },

    /// Delete a file
    Rm {
        /// File relative to the root
        path: String,
    },

    /// Rename a file or directory in place
    Mv {
        /// Entry relative to the root
        path: String,
        /// New name for the last path segment
        name: String,
    },

    /// Create a directory
    Mkdir {
        /// New directory relative to the root
        path: String,
    },

    /// Move a file or directory into a folder
    Drop {
        /// Entry relative to the root
        path: String,
        /// Destination folder relative to the root
        folder: String,
    },
}

impl Commands {
    /// The file manager command this subcommand maps to, if any.
    fn file_command(&self) -> Option<Command> {
        Some(match self {
            Commands::Ls { path } => Command::List(ListRequest { path: path.clone() }),
            Commands::Rm { path } => Command::Remove(RemoveRequest { path: path.clone() }),
            Commands::Mv { path, name } => Command::Rename(RenameRequest {
                path: path.clone(),
                new_name: name.clone(),
            }),
            Commands::Mkdir { path } => Command::Mkdir(MkdirRequest { path: path.clone() }),
            Commands::Drop { path, folder } => Command::Drop(DropRequest {
                path: path.clone(),
                folder: folder.clone(),
            }),
            Commands::Start | Commands::Stop { .. } | Commands::Status => return None,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => Config::load(config_path)?,
        None => Config::load_default()?,
    };

    // Apply environment variable overrides
    config.apply_env_overrides();

    let level = if cli.verbose {
        "debug"
    } else {
        config.daemon.log_level.as_str()
    };
    let _log_guard = init_tracing(level, config.daemon.log_dir.as_deref())?;

    if let Some(config_path) = &cli.config {
        tracing::debug!("Using config file: {:?}", config_path);
    }

    // Validate configuration
    config.validate()?;

    let socket_path = config
        .daemon
        .socket_path
        .clone()
        .unwrap_or_else(get_socket_path);

    match cli.command {
        Commands::Start => {
            if daemon_is_running(&socket_path).await {
                eprintln!("Error: Daemon already running at {}", socket_path.display());
                eprintln!();
                eprintln!("To stop the existing daemon, run:");
                eprintln!("  rootbox-daemon stop");
                return Ok(ExitCode::FAILURE);
            }

            let mut orchestrator = DaemonOrchestrator::new(config)?;
            tracing::info!(
                "Starting daemon (root: {})",
                orchestrator.service().root().display()
            );
            run_headless(&mut orchestrator).await?;
        }
        Commands::Stop { timeout } => match graceful_stop_daemon(&socket_path, timeout).await {
            Ok(()) => {
                println!("Daemon stopped successfully");
            }
            Err(e) => {
                eprintln!("Failed to stop daemon: {}", e);
                return Ok(ExitCode::FAILURE);
            }
        },
        Commands::Status => match query_daemon_status(&socket_path).await {
            Ok(status) => {
                println!(
                    "Daemon Status: {}",
                    if status.running { "running" } else { "stopping" }
                );
                println!("  Uptime:   {}", format_duration(status.uptime_secs));
                println!("  Root:     {}", status.root);
                println!("  Requests: {}", status.requests);
            }
            Err(e) => {
                eprintln!("Daemon is not running: {}", e);
                return Ok(ExitCode::FAILURE);
            }
        },
        other => {
            let Some(command) = other.file_command() else {
                anyhow::bail!("Unsupported command: {:?}", other);
            };
            let envelope = if cli.local {
                let service = FileManagerService::from_config(&config)?;
                service.dispatch(&command)
            } else {
                send_file_command(&socket_path, command).await?
            };

            println!("{}", serde_json::to_string_pretty(&envelope)?);
            return Ok(envelope_exit_code(&envelope));
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level`. With a log directory, output goes
/// to a daily rolling file and the returned guard must be held until exit.
fn init_tracing(level: &str, log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "rootbox.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

/// Send one file command to the running daemon.
async fn send_file_command(socket_path: &Path, command: Command) -> anyhow::Result<Envelope> {
    let mut client = IpcClient::connect_with_timeout(socket_path, Duration::from_secs(5))
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "Cannot connect to daemon: {} (use --local to run without it)",
                e
            )
        })?;

    client
        .file(Request::new(1, command))
        .await
        .map_err(|e| anyhow::anyhow!("File command failed: {}", e))
}

/// Whether a daemon answers on the socket.
async fn daemon_is_running(socket_path: &Path) -> bool {
    match IpcClient::connect_with_timeout(socket_path, Duration::from_millis(500)).await {
        Ok(mut client) => client.ping().await.unwrap_or(false),
        Err(_) => false,
    }
}

/// Daemon status information.
struct DaemonStatus {
    running: bool,
    uptime_secs: u64,
    root: String,
    requests: u64,
}

/// Query the daemon status via IPC.
async fn query_daemon_status(socket_path: &Path) -> anyhow::Result<DaemonStatus> {
    let mut client = IpcClient::connect_with_timeout(socket_path, Duration::from_secs(5))
        .await
        .map_err(|e| anyhow::anyhow!("Cannot connect to daemon: {}", e))?;

    let response = client
        .status()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to query status: {}", e))?;

    match response {
        IpcResponse::Status {
            running,
            uptime_secs,
            root,
            requests,
        } => Ok(DaemonStatus {
            running,
            uptime_secs,
            root,
            requests,
        }),
        IpcResponse::Error { message } => {
            anyhow::bail!("Daemon returned error: {}", message)
        }
        _ => anyhow::bail!("Unexpected response from daemon"),
    }
}

/// Gracefully stop the daemon via IPC and wait for it to exit.
async fn graceful_stop_daemon(socket_path: &Path, timeout_secs: u64) -> anyhow::Result<()> {
    let mut client = IpcClient::connect_with_timeout(socket_path, Duration::from_secs(5))
        .await
        .map_err(|_| anyhow::anyhow!("Daemon is not running (cannot connect to socket)"))?;

    println!("Sending shutdown request...");

    client.set_timeout(Duration::from_secs(timeout_secs));
    let response = client
        .stop()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to send stop request: {}", e))?;

    match response {
        IpcResponse::Stopping => {
            println!("Shutdown acknowledged, waiting for daemon to exit...");
        }
        IpcResponse::Error { message } => {
            anyhow::bail!("Daemon returned error: {}", message);
        }
        _ => {
            anyhow::bail!("Unexpected response from daemon");
        }
    }

    // The socket file disappears once the daemon has shut down.
    let start = std::time::Instant::now();
    let timeout = Duration::from_secs(timeout_secs);

    while start.elapsed() < timeout {
        if !socket_path.exists() {
            return Ok(());
        }

        if IpcClient::connect_with_timeout(socket_path, Duration::from_millis(100))
            .await
            .is_err()
        {
            return Ok(());
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    Err(anyhow::anyhow!(
        "Timeout waiting for daemon to exit ({}s)",
        timeout_secs
    ))
}

/// Format a duration in seconds to human-readable format.
/// Exit status for a file command's envelope.
///
/// Returned from `main` rather than passed to `process::exit` so the log
/// guard is dropped and the non-blocking appender flushes.
fn envelope_exit_code(envelope: &Envelope) -> ExitCode {
    if envelope.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Run the daemon until a signal arrives or a client asks it to stop.
async fn run_headless(orchestrator: &mut DaemonOrchestrator) -> anyhow::Result<()> {
    orchestrator.start().await?;

    let mut events = orchestrator.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                OrchestratorEvent::StateChanged(state) => {
                    tracing::info!("Orchestrator state: {:?}", state);
                }
                OrchestratorEvent::ClientConnected => {
                    tracing::debug!("Client connected");
                }
                OrchestratorEvent::ClientDisconnected => {
                    tracing::debug!("Client disconnected");
                }
                OrchestratorEvent::StopRequested => {
                    tracing::info!("Stop requested by client");
                }
                OrchestratorEvent::Error { message } => {
                    tracing::error!("Orchestrator error: {}", message);
                }
            }
        }
    });

    let shutdown_token = orchestrator.shutdown_token();
    tokio::select! {
        result = wait_for_shutdown_signal() => {
            result?;
            tracing::info!("Received shutdown signal");
        }
        _ = shutdown_token.cancelled() => {}
    }

    orchestrator.stop().await?;

    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        }
    }

    Ok(())
}
