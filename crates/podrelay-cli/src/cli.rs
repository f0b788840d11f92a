//! The `podrelay` command line.
//!
//! ```text
//! podrelay watch                    # print pushed notifications
//! podrelay send "04 00 04 00 09 00" # forward raw bytes to the device
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use podrelay_protocol::{PushMessage, DEFAULT_SOCKET_PATH};

use crate::client::{parse_hex_command, RelayClient};

/// Client for the podrelay daemon
#[derive(Parser, Debug)]
#[command(name = "podrelay")]
#[command(about = "Watch headphone notifications and send device commands")]
#[command(version)]
struct Args {
    /// Daemon socket path
    #[arg(long, short = 's', global = true, env = "PODRELAY_SOCKET", default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every notification the daemon pushes, until it disconnects
    Watch,
    /// Send a hex-encoded command to the device
    Send {
        /// Command bytes, e.g. "04 00 04 00 09 00 0d 01"
        hex: String,
    },
}

/// Entry point for the `podrelay` binary.
pub fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Watch => watch(&args.socket).await,
        Command::Send { hex } => send(&args.socket, &hex).await,
    }
}

async fn watch(socket: &Path) -> Result<()> {
    let mut client = RelayClient::connect(socket).await?;
    println!("Watching {} (Ctrl-C to stop)", socket.display());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            next = client.next_message() => match next? {
                Some(msg) => println!("{}", format_message(Local::now(), &msg)),
                None => {
                    println!("Daemon closed the connection");
                    break;
                }
            },
        }
    }
    Ok(())
}

async fn send(socket: &Path, hex: &str) -> Result<()> {
    let bytes = parse_hex_command(hex)?;
    let mut client = RelayClient::connect(socket).await?;
    client.send_raw(&bytes).await?;
    client.finish().await?;
    debug!(len = bytes.len(), "Command sent");
    Ok(())
}

/// Renders one pushed message as a timestamped line.
pub fn format_message(at: DateTime<Local>, msg: &PushMessage) -> String {
    let stamp = at.format("%H:%M:%S%.3f");
    let body = match msg {
        PushMessage::Battery(components) => {
            let parts: Vec<String> = components
                .iter()
                .map(|(name, c)| format!("{name}={}% ({})", c.level, c.status))
                .collect();
            format!("battery  {}", parts.join(" "))
        }
        PushMessage::EarDetection { primary, secondary } => {
            format!("ear      primary={primary} secondary={secondary}")
        }
        PushMessage::Anc { mode } => format!("anc      mode={mode}"),
        PushMessage::ConversationalAwareness { status } => format!("ca       status={status}"),
        PushMessage::Unknown { data } => format!("unknown  {data}"),
    };
    format!("[{stamp}] {body}")
}

fn init_logging() {
    // Logs go to stderr so `watch` output stays clean on stdout.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
