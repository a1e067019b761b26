//! nikitad - voice assistant daemon
//!
//! Main entry point: a text console stands in for speech input/output.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::path::PathBuf;

use clap::Parser;
use nikita_core::config::ConfigError;
use nikita_core::Config;
use nikitad::mic::ConsoleMic;
use nikitad::{Assistant, AssistantError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "nikitad", about = "Voice assistant daemon", version)]
struct Cli {
    /// Config file (key=value)
    #[arg(short, long, env = "NIKITA_CONFIG")]
    config: Option<PathBuf>,

    /// User profile (YAML)
    #[arg(short, long)]
    profile: Option<PathBuf>,

    /// SQLite database path
    #[arg(long)]
    db: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(long)]
    debug: bool,
}

fn load_config(cli: &Cli) -> Result<Config, AssistantError> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => {
            let default = Config::default_path();
            if default.exists() {
                Config::from_file(&default)?
            } else {
                Config::default()
            }
        }
    };
    if let Some(profile) = &cli.profile {
        config.profile_path = profile.clone();
    }
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    let cwd = std::env::current_dir().map_err(ConfigError::from)?;
    config.resolve_paths(&cwd);
    Ok(config)
}

fn init_tracing(cli: &Cli, config: &Config) {
    let level = if cli.debug {
        "debug"
    } else {
        config.log_level.as_str()
    };
    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();
}

async fn shutdown_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                error!("failed to register SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                info!("received SIGINT, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received SIGINT, shutting down");
    }

    cancel.cancel();
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("nikitad: {e}");
            std::process::exit(1);
        }
    };
    init_tracing(&cli, &config);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let code = runtime.block_on(async {
        let assistant = match Assistant::new(config).await {
            Ok(assistant) => assistant,
            Err(e) => {
                error!("failed to initialize assistant: {}", e);
                return 1;
            }
        };

        let cancel = CancellationToken::new();
        tokio::spawn(shutdown_signal(cancel.clone()));

        let mic = ConsoleMic::stdio(assistant.config().persona_name.clone());
        match assistant.run(mic, cancel).await {
            Ok(()) => 0,
            Err(e) => {
                error!("assistant error: {}", e);
                1
            }
        }
    });

    std::process::exit(code);
}
