use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use diyivi::http::build_router;
use diyivi::{initialize, Backend, RootConfig, RootError};

/// DIYivi: exchange attributes and sign messages with Yivi, no accounts
/// needed.
#[derive(Parser, Debug)]
#[command(name = "diyivi", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Start the HTTP API
    Serve {
        /// Bind address, overriding the config file
        #[arg(long)]
        bind: Option<String>,

        /// Port, overriding the config file
        #[arg(long)]
        port: Option<u16>,
    },

    /// Load and validate the configuration, then exit
    CheckConfig,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new(
            "diyivi=debug,diyivi_exchange=debug,diyivi_attest=debug,diyivi_store=debug,diyivi_notify=debug",
        )
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("diyivi=info,diyivi_exchange=info,diyivi_notify=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn config_path(path: Option<&PathBuf>) -> PathBuf {
    path.cloned().unwrap_or_else(RootConfig::default_config_path)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli).await;
    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), RootError> {
    let path = config_path(cli.config.as_ref());
    match cli.command {
        Commands::Init { force } => cmd_init(&path, force),
        Commands::Serve { bind, port } => cmd_serve(&path, bind, port).await,
        Commands::CheckConfig => cmd_check_config(&path),
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<(), RootError> {
    if path.exists() && !force {
        return Err(RootError::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    RootConfig::default().save(path)?;
    println!("Wrote default configuration to {}", path.display());
    println!("Set attestation.secret_key before exposing the server.");
    Ok(())
}

fn cmd_check_config(path: &Path) -> Result<(), RootError> {
    let config = RootConfig::load(path)?;
    config.validate()?;
    diyivi::build_verifier(&config.attestation)?;
    println!("Configuration OK ({})", path.display());
    println!("  Base URL: {}", config.base_url);
    println!("  Store:    {:?}", config.store.backend);
    println!("  Listen:   {}:{}", config.http.bind, config.http.port);
    Ok(())
}

async fn cmd_serve(
    path: &Path,
    bind: Option<String>,
    port: Option<u16>,
) -> Result<(), RootError> {
    let mut config = RootConfig::load(path)?;
    if let Some(bind) = bind {
        config.http.bind = bind;
    }
    if let Some(port) = port {
        config.http.port = port;
    }
    if config.attestation.secret_key == "unsafe_secret_key" {
        warn!("attestation.secret_key is the development default");
    }

    let state = Arc::new(initialize(config)?);
    let address = format!("{}:{}", state.config.http.bind, state.config.http.port);

    let purge = tokio::spawn(purge_expired_loop(
        state.backend.clone(),
        Duration::from_secs(state.config.store.purge_interval_secs),
    ));

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(address = %address, "DIYivi API listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    purge.abort();
    info!("DIYivi API stopped");
    Ok(())
}

async fn purge_expired_loop(backend: Backend, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        match backend.purge_expired() {
            Ok(0) => {}
            Ok(purged) => debug!(purged, "expired records removed"),
            Err(e) => warn!(error = %e, "purging expired records failed"),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
