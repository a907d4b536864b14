use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod config;
mod error;
mod rate_limit;
mod store;

#[derive(Parser)]
#[command(name = "gatekeeper", about = "Token authentication and access control service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Path to gatekeeper.toml (searched upward from cwd if omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },
    /// Write a default gatekeeper.toml in the current directory
    Init,
    /// Generate a bcrypt hash for seeding credentials
    HashPassword { password: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatekeeper=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => {
            let mut config = match config {
                Some(path) => config::load_config_from_path(&path)?,
                None => config::load_config()?,
            };
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            api::run_server(config).await?;
        }
        Commands::Init => {
            let path = std::env::current_dir()?.join("gatekeeper.toml");
            if path.exists() {
                anyhow::bail!("{} already exists", path.display());
            }
            std::fs::write(&path, config::default_config_content())?;
            println!("Wrote {}", path.display());
        }
        Commands::HashPassword { password } => {
            let hashed = bcrypt::hash(&password, bcrypt::DEFAULT_COST)?;
            println!("{}", hashed);
        }
    }

    Ok(())
}
