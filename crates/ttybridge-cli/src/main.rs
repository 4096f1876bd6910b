//! ttybridge entry point.
//!
//! # Usage
//!
//! ```bash
//! # Attach to a terminal service
//! ttybridge http://localhost:8080/
//!
//! # With credentials and auto-reconnect
//! TTYBRIDGE_AUTH_TOKEN=secret ttybridge --reconnect 10 https://host/term/
//! ```
//!
//! Press `Ctrl-]` to quit.

use std::{path::PathBuf, sync::Mutex};

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use ttybridge_cli::{Bridge, Endpoints, Runtime, TerminalDriver, ZmodemSentry};
use ttybridge_core::{ConnectionConfig, Session};
use ttybridge_proto::ReconnectPolicy;

/// Terminal client for tty-over-WebSocket services
#[derive(Parser, Debug)]
#[command(name = "ttybridge")]
#[command(about = "Attach the local terminal to a remote tty served over WebSocket")]
#[command(version)]
struct Args {
    /// Page URL of the terminal service
    url: String,

    /// Credential sent in the authentication handshake
    #[arg(long, env = "TTYBRIDGE_AUTH_TOKEN")]
    auth_token: Option<String>,

    /// Seconds to wait before reconnecting after an abnormal close (0 disables)
    #[arg(long, default_value_t = 0.0)]
    reconnect: f64,

    /// Directory received files are written to
    #[arg(long, default_value = ".")]
    download_dir: PathBuf,

    /// Log file (defaults to ttybridge.log in the temp directory)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// More logging: -v for debug, -vv for trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(args: &Args) -> std::io::Result<()> {
    let path = args.log_file.clone().unwrap_or_else(|| std::env::temp_dir().join("ttybridge.log"));
    let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;

    let level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let default = ["ttybridge", "ttybridge_cli", "ttybridge_app", "ttybridge_core", "ttybridge_proto"]
        .map(|target| format!("{target}={level}"))
        .join(",");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(filter)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(&args)?;

    let endpoints = Endpoints::parse(&args.url)?;
    tracing::info!(url = %endpoints.page(), "ttybridge starting");

    let session =
        Session::new(args.auth_token).with_reconnect(ReconnectPolicy::from_secs(args.reconnect));
    let driver = TerminalDriver::new(endpoints, args.download_dir)?;
    let mut bridge = Bridge::new(session, ConnectionConfig::default(), ZmodemSentry::new());
    bridge.connection_mut().set_window_size(driver.window_size());

    let result = Runtime::new(driver, bridge).run().await;
    tracing::info!(ok = result.is_ok(), "ttybridge exiting");
    Ok(result?)
}
