//! Skycast decoder binary.
//!
//! # Usage
//!
//! ```bash
//! # Ephemeral decoder (subscriptions lost on exit)
//! skycast-decoder --secrets decoder.secrets
//!
//! # Durable decoder, refusing a file provisioned for another id
//! skycast-decoder --secrets decoder.secrets --decoder-id 0xdeadbeef --storage decoder.redb
//! ```

use std::path::PathBuf;

use clap::Parser;
use skycast_core::{Decoder, DecoderConfig, MemoryStorage, ReplayPolicy, Storage};
use skycast_server::{DecoderSecretsFile, RedbStorage, Server, ServerConfig, parse_decoder_id};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Skycast decoder
#[derive(Parser, Debug)]
#[command(name = "skycast-decoder")]
#[command(about = "Access-controlled satellite frame decoder")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1:2525")]
    bind: String,

    /// Path to this decoder's secrets file (JSON)
    #[arg(short, long)]
    secrets: PathBuf,

    /// Expected decoder id (0x-prefixed hex or decimal)
    #[arg(short, long, value_parser = parse_decoder_id)]
    decoder_id: Option<u32>,

    /// Redb file holding subscriptions and replay cursors
    #[arg(long)]
    storage: Option<PathBuf>,

    /// Keep replay cursors in memory only
    #[arg(long)]
    volatile_replay: bool,

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

    let file = DecoderSecretsFile::load(&args.secrets)?;
    if let Some(expected) = args.decoder_id {
        file.check_decoder_id(expected)?;
    }

    tracing::info!(decoder_id = format_args!("{:#010x}", file.decoder_id), "Skycast decoder starting");

    let secrets = file.decoder_secrets()?;
    drop(file);

    let replay = if args.volatile_replay { ReplayPolicy::Volatile } else { ReplayPolicy::Persistent };
    let config = ServerConfig {
        bind_address: args.bind,
        storage_path: args.storage,
        decoder: DecoderConfig { replay },
    };

    match config.storage_path.clone() {
        Some(path) => {
            tracing::info!("Using durable storage at {}", path.display());
            let storage = RedbStorage::open(&path)?;
            run(&config, Decoder::new(secrets, config.decoder, storage)?).await
        },
        None => {
            tracing::warn!("No storage path given - subscriptions will not survive restart");
            run(&config, Decoder::new(secrets, config.decoder, MemoryStorage::new())?).await
        },
    }
}

async fn run<S: Storage>(
    config: &ServerConfig,
    decoder: Decoder<S>,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = Server::bind(&config.bind_address, decoder).await?;

    tracing::info!("Decoder listening on {}", server.local_addr()?);

    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}
