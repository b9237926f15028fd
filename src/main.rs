//! StashKV - A Multi-Tenant Persistent Key-Value Store
//!
//! Main entry point for the StashKV server. Loads configuration, opens the
//! selected backend, starts the background tasks, and serves the HTTP API
//! until a shutdown signal arrives.

use stashkv::api::build_router;
use stashkv::config::{self, Config, StorageMode};
use stashkv::engine::KvEngine;
use stashkv::storage::{open_backend, Sweeper, Syncer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line overrides on top of the config file.
struct Args {
    config_path: PathBuf,
    host: Option<String>,
    port: Option<u16>,
    mode: Option<StorageMode>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config.json"),
            host: None,
            port: None,
            mode: None,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    fn from_args() -> Self {
        let mut parsed = Args::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    if i + 1 < args.len() {
                        parsed.config_path = PathBuf::from(&args[i + 1]);
                        i += 2;
                    } else {
                        eprintln!("Error: --config requires a value");
                        std::process::exit(1);
                    }
                }
                "--host" | "-h" => {
                    if i + 1 < args.len() {
                        parsed.host = Some(args[i + 1].clone());
                        i += 2;
                    } else {
                        eprintln!("Error: --host requires a value");
                        std::process::exit(1);
                    }
                }
                "--port" | "-p" => {
                    if i + 1 < args.len() {
                        let port = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid port number");
                            std::process::exit(1);
                        });
                        parsed.port = Some(port);
                        i += 2;
                    } else {
                        eprintln!("Error: --port requires a value");
                        std::process::exit(1);
                    }
                }
                "--mode" | "-m" => {
                    if i + 1 < args.len() {
                        parsed.mode = Some(parse_mode(&args[i + 1]));
                        i += 2;
                    } else {
                        eprintln!("Error: --mode requires a value");
                        std::process::exit(1);
                    }
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("StashKV version {}", stashkv::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        parsed
    }

    /// Config file values with command-line overrides applied.
    fn apply(self, mut config: Config) -> Config {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        config
    }
}

fn parse_mode(raw: &str) -> StorageMode {
    match raw {
        "memory" => StorageMode::Memory,
        "file" => StorageMode::File,
        "hybrid" => StorageMode::Hybrid,
        "remote" => StorageMode::Remote,
        other => {
            eprintln!("Error: unknown mode '{}' (memory|file|hybrid|remote)", other);
            std::process::exit(1);
        }
    }
}

fn print_help() {
    println!(
        r#"
StashKV - A Multi-Tenant Persistent Key-Value Store

USAGE:
    stashkv [OPTIONS]

OPTIONS:
    -c, --config <PATH>  Config file (default: config.json, created if absent)
    -h, --host <HOST>    Host to bind to (overrides config)
    -p, --port <PORT>    Port to listen on (overrides config)
    -m, --mode <MODE>    Storage mode: memory|file|hybrid|remote
    -v, --version        Print version information
        --help           Print this help message

EXAMPLES:
    stashkv                              # Start with ./config.json
    stashkv --mode memory --port 9000    # Volatile store on port 9000
    stashkv --mode remote                # Delegate to the configured server

TRYING IT OUT:
    $ curl -X POST localhost:7379/kv/greeting -d '{{"value": "hello", "ttl": 60}}'
    $ curl localhost:7379/kv/greeting
    {{"key":"greeting","value":"hello"}}
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::from_args();
    let config = config::load(&args.config_path)?;
    let config = args.apply(config);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_target(false)
        .init();

    info!(
        version = stashkv::VERSION,
        mode = ?config.mode,
        "starting StashKV"
    );

    // Open the backend; remote mode fails here if the server is unreachable.
    let backend = open_backend(&config).await?;
    let engine = Arc::new(KvEngine::new(
        Arc::clone(&backend),
        config.limits(),
        config.backup_dir(),
    ));

    // Background expiry sweep for every mode.
    let _sweeper = Sweeper::start(
        Arc::clone(&backend),
        Duration::from_secs(config.sweep_interval_secs),
    );

    // Periodic disk sync only matters for the hybrid backend.
    let _syncer = (config.mode == StorageMode::Hybrid).then(|| {
        Syncer::start(
            Arc::clone(&backend),
            Duration::from_secs(config.sync_interval_secs),
        )
    });

    // Optional automatic backups.
    let backup_task = (config.backup_interval_secs > 0).then(|| {
        let engine = Arc::clone(&engine);
        let interval = Duration::from_secs(config.backup_interval_secs);
        info!(interval_secs = interval.as_secs(), "automatic backups enabled");
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if let Err(e) = engine.backup().await {
                    warn!(error = %e, "automatic backup failed, will retry next tick");
                }
            }
        })
    });

    let router = build_router(Arc::clone(&engine));
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "listening for HTTP requests");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = backup_task {
        task.abort();
    }

    // Final flush so the file and hybrid backends lose nothing.
    if let Err(e) = engine.shutdown().await {
        error!(error = %e, "final flush failed");
    }
    info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("shutdown signal received, stopping server...");
}
