use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use partycast_core::RoomId;
use partycast_relay::{RELAY_PATH, RelayHub, serve};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "partycast", version, about = "Watch-party relay and tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay.
    Relay {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,

        /// Log filter, used when RUST_LOG is not set.
        #[arg(long, default_value = "info")]
        log: String,
    },
    /// Print a fresh room id.
    Room,
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Relay { bind, log } => {
            init_tracing(&log);

            let listener = TcpListener::bind(&bind)
                .await
                .with_context(|| format!("Failed to bind {bind}"))?;
            let addr = listener.local_addr()?;

            println!("{}", "Starting partycast relay...".green().bold());
            println!("   Endpoint: ws://{}{}", addr, RELAY_PATH);

            serve(listener, RelayHub::new())
                .await
                .context("Relay server stopped")?;
        }
        Commands::Room => {
            println!("{}", RoomId::generate().as_str().cyan().bold());
        }
    }

    Ok(())
}
