//! Lineworks server binary.
//!
//! # Usage
//!
//! ```bash
//! # Local only, default (insecure) key
//! lineworks-server
//!
//! # Reachable from the network with a real secret and a generator program
//! LINEWORKS_KEY=... lineworks-server --bind 0.0.0.0:29999 --engine ./generate
//! ```

use std::path::PathBuf;

use clap::Parser;
use lineworks_core::{InferenceEngine, ModelDirectory};
use lineworks_crypto::DEFAULT_KDF_ITERATIONS;
use lineworks_server::{DEFAULT_BIND_ADDRESS, DEFAULT_SECRET, ProcessEngine, Server, ServerConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Lineworks generation server
#[derive(Parser, Debug)]
#[command(name = "lineworks-server")]
#[command(about = "Encrypted text-generation server for Lineworks")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = DEFAULT_BIND_ADDRESS)]
    bind: String,

    /// Shared secret clients must know
    #[arg(short, long, alias = "password", env = "LINEWORKS_KEY", default_value = DEFAULT_SECRET, hide_env_values = true)]
    key: String,

    /// Directory containing *.gguf models
    #[arg(short, long, default_value = "models")]
    models: PathBuf,

    /// Generator program invoked for each generate request
    #[arg(short, long)]
    engine: Option<PathBuf>,

    /// PBKDF2 rounds used to derive the connection key
    #[arg(long, default_value_t = DEFAULT_KDF_ITERATIONS)]
    kdf_iterations: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Lineworks server starting");
    tracing::info!("Binding to {}", args.bind);

    let config = ServerConfig {
        bind_address: args.bind,
        secret: args.key,
        kdf_iterations: args.kdf_iterations,
        ..Default::default()
    };

    if config.uses_default_secret() {
        tracing::warn!("No key provided - using the default key");
        tracing::warn!("Anyone who can reach this port can use the server!");
    }

    let models = ModelDirectory::new(args.models);
    if args.engine.is_none() {
        tracing::warn!("No generator program configured - models can be listed but not loaded");
    }
    tracing::info!("Serving models from {}", models.root().display());

    let program = args.engine;
    let factory = move || -> Box<dyn InferenceEngine> {
        Box::new(ProcessEngine::new(program.clone(), models.clone()))
    };

    let server = Server::bind(config, factory).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Ctrl-C received");
        })
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
