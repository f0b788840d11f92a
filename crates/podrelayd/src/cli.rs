//! `podrelayd` command line.
//!
//! ```bash
//! # Start the daemon (foreground)
//! podrelayd start
//!
//! # Stop the running daemon
//! podrelayd stop
//!
//! # Check daemon status
//! podrelayd status
//!
//! # Custom socket and device bridge
//! PODRELAY_SOCKET=/run/podrelay.sock podrelayd start --device /run/bridge.sock
//!
//! # Enable debug logging
//! RUST_LOG=podrelayd=debug podrelayd start
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: graceful shutdown, exit 0

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{self, ExitCode};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use podrelay_device::BridgeDevice;

use crate::config::RelayConfig;
use crate::daemon::{Daemon, EXIT_FAILURE, EXIT_OK};

/// podrelay daemon - relays accessory notifications to local clients
#[derive(Parser, Debug)]
#[command(name = "podrelayd", version, about)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Local socket clients connect to
    #[arg(short, long, global = true)]
    socket: Option<PathBuf>,

    /// Socket of the device protocol bridge
    #[arg(short, long, global = true)]
    device: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon in the foreground
    Start,
    /// Stop the running daemon
    Stop,
    /// Show daemon status
    Status,
}

/// PID file name for the daemon serving `socket`.
///
/// Daemons on different sockets get different PID files, so each socket
/// has its own notion of "already running".
fn pid_file_name(socket: &Path) -> String {
    let key: String = socket
        .to_string_lossy()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    format!("podrelayd-{}.pid", key.trim_matches('_'))
}

/// Returns the path to the PID file.
fn pid_file_path(socket: &Path) -> PathBuf {
    let state_dir = dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("podrelay");
    state_dir.join(pid_file_name(socket))
}

/// Reads the PID from the PID file, if it exists.
fn read_pid(socket: &Path) -> Option<u32> {
    let path = pid_file_path(socket);
    let mut file = File::open(&path).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

/// Writes the current PID to the PID file.
fn write_pid(socket: &Path) -> Result<()> {
    let path = pid_file_path(socket);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create state directory")?;
    }
    let mut file = File::create(&path).context("Failed to create PID file")?;
    write!(file, "{}", process::id()).context("Failed to write PID")?;
    Ok(())
}

fn remove_pid_file(socket: &Path) {
    let _ = fs::remove_file(pid_file_path(socket));
}

/// Checks if a process with the given PID is running.
fn is_process_running(pid: u32) -> bool {
    PathBuf::from(format!("/proc/{pid}")).exists()
}

/// Returns the PID of the daemon serving `socket`, clearing a stale PID file.
fn is_daemon_running(socket: &Path) -> Option<u32> {
    if let Some(pid) = read_pid(socket) {
        if is_process_running(pid) {
            return Some(pid);
        }
        remove_pid_file(socket);
    }
    None
}

/// Sends SIGTERM to the daemon process.
fn stop_daemon(pid: u32) -> Result<()> {
    let Ok(pid) = i32::try_from(pid) else {
        bail!("Invalid PID {}", pid);
    };
    // SAFETY: kill(2) has no memory-safety preconditions
    let result = unsafe { libc::kill(pid, libc::SIGTERM) };
    if result != 0 {
        bail!("Failed to send SIGTERM to process {}", pid);
    }
    Ok(())
}

/// Resolves configuration from file, environment and flags.
fn resolve_config(args: &Args) -> Result<RelayConfig> {
    let mut config = RelayConfig::load(args.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok());
    if let Some(socket) = &args.socket {
        config.socket_path = socket.clone();
    }
    if let Some(device) = &args.device {
        config.device_socket = device.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Entry point of the `podrelayd` binary.
pub fn main() -> ExitCode {
    let args = Args::parse();

    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let result = match args.command.unwrap_or(Command::Start) {
        Command::Start => return start(config),
        Command::Stop => stop(&config),
        Command::Status => status(&config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn start(config: RelayConfig) -> ExitCode {
    let socket = config.socket_path.clone();
    if let Some(pid) = is_daemon_running(&socket) {
        eprintln!("Daemon is already running (PID {pid})");
        eprintln!("Use 'podrelayd stop' to stop it first.");
        return ExitCode::from(crate::daemon::EXIT_ENDPOINT_IN_USE);
    }

    if let Err(e) = write_pid(&socket) {
        eprintln!("Error: {e:#}");
        return ExitCode::from(EXIT_FAILURE);
    }

    let code = run_daemon(config);

    remove_pid_file(&socket);
    code
}

fn stop(config: &RelayConfig) -> Result<u8> {
    let Some(pid) = is_daemon_running(&config.socket_path) else {
        println!("Daemon is not running.");
        return Ok(EXIT_OK);
    };

    println!("Stopping daemon (PID {pid})...");
    stop_daemon(pid)?;

    // Wait for process to exit (up to 5 seconds)
    for _ in 0..50 {
        if !is_process_running(pid) {
            println!("Daemon stopped.");
            return Ok(EXIT_OK);
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    eprintln!("Daemon did not stop within 5 seconds.");
    Ok(EXIT_FAILURE)
}

fn status(config: &RelayConfig) -> Result<u8> {
    let Some(pid) = is_daemon_running(&config.socket_path) else {
        println!("Daemon is not running.");
        return Ok(EXIT_FAILURE);
    };

    println!("Daemon is running (PID {pid})");
    if config.socket_path.exists() {
        println!("Socket: {}", config.socket_path.display());
    }
    Ok(EXIT_OK)
}

/// Runs the daemon (async entry point).
#[tokio::main]
async fn run_daemon(config: RelayConfig) -> ExitCode {
    if let Err(e) = init_logging() {
        eprintln!("Error: failed to initialise logging: {e}");
        return ExitCode::from(EXIT_FAILURE);
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "podrelay daemon starting"
    );

    let device = Arc::new(BridgeDevice::new(&config.device_socket));

    let daemon = match Daemon::start(&config, device).await {
        Ok(daemon) => daemon,
        Err(e) => {
            error!(error = %e, "Startup failed");
            return ExitCode::from(e.exit_code());
        }
    };

    let _signals = match daemon.coordinator().spawn_signal_listener() {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "Failed to install signal handlers");
            daemon.coordinator().initiate();
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    info!(socket = %config.socket_path.display(), "Relay ready");
    daemon.run().await;

    ExitCode::from(EXIT_OK)
}

/// Default log directives, used when `RUST_LOG` is unset or invalid.
const DEFAULT_LOG_FILTER: &str = "podrelayd=info,podrelay_device=info";

fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn init_logging() -> Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(rust_log.as_deref()))
        .try_init()
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(())
}
