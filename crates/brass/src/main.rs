use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info};

use brass::{http, AppState, Config};

/// BRASS: privacy-preserving rate-limiting verifier.
#[derive(Parser, Debug)]
#[command(name = "brass", version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the verifier
    Serve {
        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,

        /// Port
        #[arg(long, default_value = "8080")]
        port: u16,
    },

    /// Validate the environment configuration and exit
    CheckConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), brass::BrassError> {
    match cli.command {
        Commands::Serve { bind, port } => {
            let config = Config::from_env()?;
            let state = Arc::new(AppState::from_config(config)?);
            info!(mode = %state.mode(), "verifier starting");

            let router = http::build_router(state);
            let addr = format!("{}:{}", bind, port);
            let listener = tokio::net::TcpListener::bind(addr.as_str()).await?;
            info!(%addr, "listening");
            axum::serve(listener, router).await?;
            Ok(())
        }
        Commands::CheckConfig => {
            let config = Config::from_env()?;
            let state = AppState::from_config(config)?;
            info!(mode = %state.mode(), "configuration ok");
            Ok(())
        }
    }
}
