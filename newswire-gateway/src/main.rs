use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use newswire::gateway::{self, GatewayConfig};

/// Newswire gateway: REST + WebSocket front door over the news document.
#[derive(Debug, Parser)]
#[command(name = "newswire-gateway", version, about)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "NEWSWIRE_BIND", default_value = "127.0.0.1:3000")]
    bind: String,

    /// Path of the JSON news document.
    #[arg(long, env = "NEWSWIRE_DATA_FILE", default_value = "data/news-data.json")]
    data_file: PathBuf,

    /// Directory for uploaded images.
    #[arg(long, env = "NEWSWIRE_UPLOADS_DIR", default_value = "uploads")]
    uploads_dir: PathBuf,

    /// Secret used to sign bearer tokens.
    #[arg(long, env = "NEWSWIRE_TOKEN_SECRET", hide_env_values = true)]
    token_secret: String,

    /// Broadcast channel capacity for the event stream.
    #[arg(long, env = "NEWSWIRE_CHANNEL_CAPACITY", default_value_t = 256)]
    channel_capacity: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // fmt().init() also installs the log-record bridge from tracing-log.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    info!(bind = %cli.bind, data_file = %cli.data_file.display(), "starting newswire gateway");

    gateway::start(GatewayConfig {
        bind_addr: cli.bind,
        data_file: cli.data_file,
        uploads_dir: cli.uploads_dir,
        token_secret: cli.token_secret,
        channel_capacity: cli.channel_capacity,
    })
    .await
    .context("gateway exited with an error")
}
