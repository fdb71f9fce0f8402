//! Guardian server: main entry point.
//!
//! Hexagonal layout, one decision core behind a single mutation gateway.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  TcpTransport   LogEventSink   JsonConfigFile   SystemClock    │
//! │  (RPC clients)  (EventSink)    (ConfigPort)     (ClockPort)    │
//! │  StorageLink ──▶ storage worker ──▶ MemoryStore + journal      │
//! │  (StoragePort + StatusQueryPort)                               │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │      Gateway ──▶ GuardianService (pure logic)          │    │
//! │  │      classifier · countdown · liveness · mailbox       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Scheduler (delegate-driven) · RpcEngine (request dispatch)    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `guardian [CONFIG.json]`.  Without an argument the path comes
//! from `GUARDIAN_CONFIG`; with neither, built-in defaults apply.
//! `GUARDIAN_PORT` overrides the listen port.  Log verbosity follows
//! `RUST_LOG` (default `info`).

use anyhow::{Context, Result, bail};
use log::info;

use guardian::adapters::config_file::JsonConfigFile;
use guardian::app::ports::ConfigPort;
use guardian::config::GuardianConfig;
use guardian::server::Server;

fn load_config() -> Result<GuardianConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("GUARDIAN_CONFIG").ok());

    let mut config = match path {
        Some(path) => JsonConfigFile::new(&path)
            .load()
            .map_err(anyhow::Error::from)
            .with_context(|| format!("loading config from {}", path))?,
        None => GuardianConfig::default(),
    };

    if let Ok(port) = std::env::var("GUARDIAN_PORT") {
        config.listen_port = port
            .parse()
            .with_context(|| format!("GUARDIAN_PORT={:?} is not a port number", port))?;
    }

    if let Err(e) = config.validate() {
        bail!("invalid configuration: {}", e);
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!(
        "guardian v{} starting (pid {})",
        env!("CARGO_PKG_VERSION"),
        std::process::id()
    );

    let config = load_config()?;
    let server = Server::start(&config).context("starting server")?;
    info!("ready on {}", server.local_addr());

    server.wait().context("server stopped abnormally")?;
    Ok(())
}
