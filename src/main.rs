use anyhow::Result;
use clap::{Parser, Subcommand};
use recordkeep::auth::{AccountDirectory, PasswordCodec};
use recordkeep::store::{CollectionStore, LockRegistry};
use recordkeep::{config, gateway, ServiceError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Account and item record service
#[derive(Parser, Debug)]
#[command(name = "recordkeep")]
#[command(version)]
struct Cli {
    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP gateway
    Serve {
        /// Bind address (overrides [gateway] host)
        #[arg(long)]
        host: Option<String>,

        /// Port (overrides [gateway] port and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create the default administrator in the configured data directory
    InstallAdmin,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("recordkeep=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "Configuration loaded");

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            let port = port.unwrap_or(config.gateway.port);
            gateway::run_gateway(&host, port, &config).await
        }
        Commands::InstallAdmin => {
            let locks = Arc::new(LockRegistry::new(config.lock_wait()));
            let accounts = AccountDirectory::new(
                CollectionStore::json_file(config.users_path(), locks),
                PasswordCodec::new(),
            );
            let users_path = config.users_path();

            match tokio::task::spawn_blocking(move || accounts.install_default_admin()).await? {
                Ok(admin) => {
                    println!(
                        "Created administrator '{}' in {}",
                        admin.username,
                        users_path.display()
                    );
                    println!("  Log in and change the default password.");
                    Ok(())
                }
                Err(ServiceError::Conflict(msg)) => {
                    println!("Nothing to do: {msg}");
                    Ok(())
                }
                Err(e) => Err(anyhow::Error::new(e).context("Install failed")),
            }
        }
    }
}
