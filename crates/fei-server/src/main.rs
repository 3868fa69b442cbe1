//! FeiShare server entry point.
//!
//! Loads the configuration, builds the share registry and the controller,
//! starts the listener on the configured port and then reads control
//! commands from stdin until `quit`, end of input or Ctrl-C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()                  -- TOML file + CLI overrides
//!  └─ SharedFileRegistry::new()      -- share log + local files dir
//!       └─ invalidate()              -- first scan
//!  └─ FeiServer::new()
//!       └─ on_receive_event(port)    -- Init → Started / Error
//!  └─ spawn_state_notifier()         -- state → status text
//!  └─ run_control_loop(stdin)        -- stop / restart / port / send / ...
//!  └─ shutdown()                     -- Started → Stopped
//! ```

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fei_server::infrastructure::control::{run_control_loop, ControlSession};
use fei_server::infrastructure::notifier::{spawn_state_notifier, LogNotifier, StatusNotifier};
use fei_server::infrastructure::storage::config::{config_file_path, load_config};
use fei_server::infrastructure::storage::{FsContentResolver, ShareStore};
use fei_server::{FeiServer, SharedFileRegistry};

/// Local-network file sharing with live refresh and chat.
#[derive(Debug, Parser)]
#[command(name = "fei-server", version, about)]
struct Cli {
    /// Path of the TOML configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file).
    #[arg(long, env = "FEI_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides the config file).
    #[arg(long = "bind", env = "FEI_BIND", value_name = "IP")]
    bind: Option<IpAddr>,

    /// Log level when RUST_LOG is not set (overrides the config file).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => config_file_path().context("locating the config file")?,
    };
    let mut config = load_config(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind.to_string();
    }
    if let Some(level) = cli.log_level.clone() {
        config.logging.level = level;
    }

    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    let default_level = config.logging.level.clone();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("FeiShare server starting (config {})", config_path.display());

    let settings = config.server_settings().context("reading [server] settings")?;
    let data_dir = config_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let (log_path, files_dir) = config.storage_paths(&data_dir);

    let notifier: Arc<dyn StatusNotifier> = Arc::new(LogNotifier);
    let registry = SharedFileRegistry::new(
        ShareStore::new(log_path, files_dir),
        Arc::new(FsContentResolver::new()),
        Arc::clone(&notifier),
    );
    let shared = registry.invalidate().await;
    info!("{} item(s) shared", shared.len());

    let server = FeiServer::new(settings, registry);
    let _status = spawn_state_notifier(server.subscribe(), notifier);

    server
        .on_receive_event(i32::from(config.server.port), None)
        .await;

    info!("type 'list', 'share <path>', 'send <text>', 'stop', 'restart', 'port <n>' or 'quit'");

    let mut session = ControlSession::new(Arc::clone(&server), config, Some(config_path));
    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        _ = run_control_loop(stdin, &mut session) => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::warn!("cannot listen for Ctrl-C: {e}");
            }
            info!("shutdown signal received");
        }
    }

    server.shutdown().await;
    info!("FeiShare server stopped");

    // A pending blocking stdin read would keep the runtime alive until the
    // next line is typed.
    std::process::exit(0)
}
