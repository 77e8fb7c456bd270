//! gkeeper: GophKeeper client
//!
//! Usage:
//!   gkeeper register --user NAME [--server ADDR] [--dir D]   destructive enrolment
//!   gkeeper [--server ADDR] [--dir D]                        interactive menu
//!   gkeeper version

mod client;
mod menu;
mod records;
mod register;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use gk_core::config::ClientConfig;

#[derive(Parser, Debug)]
#[command(name = "gkeeper", version, about = "GophKeeper client")]
struct Cli {
    /// Private server address (host:port)
    #[arg(long, short = 's')]
    server: Option<String>,

    /// Cache directory for keys and certificates
    #[arg(long, short = 'd', env = "GK_CLIENT_DIR", global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new user. All local certificates are overwritten!
    Register {
        /// User name (becomes the certificate common name)
        #[arg(long, short = 'u')]
        user: String,

        /// Public server address (host:port)
        #[arg(long, short = 's')]
        server: Option<String>,
    },
    /// Print the client version
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let mut cfg = ClientConfig::default();
    if let Some(dir) = cli.dir {
        cfg.cache_dir = dir;
    }

    match cli.command {
        Some(Command::Version) => {
            println!("gkeeper {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Command::Register { user, server }) => {
            if let Some(addr) = server {
                cfg.public_addr = addr;
            }
            register::register(&cfg, &user).await
        }
        None => {
            if let Some(addr) = cli.server {
                cfg.private_addr = addr;
            }
            run_interactive(cfg).await
        }
    }
}

async fn run_interactive(cfg: ClientConfig) -> Result<()> {
    // Interrupt anywhere in the menu exits cleanly.
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nShutting down...");
            std::process::exit(0);
        }
    });

    let mut core = client::ClientCore::connect(&cfg).await?;
    menu::main_menu(&mut core).await
}

fn init_logging() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    // The menu owns stdout; logs stay quiet unless GK_LOG says otherwise.
    let filter = EnvFilter::try_from_env("GK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
