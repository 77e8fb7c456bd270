//! gkeeperd: GophKeeper server
//!
//! Usage:
//!   gkeeperd init [--dir D] [--dns NAME]...      destructive initialisation
//!   gkeeperd [--dir D] [--public-port P] [--private-port Q] [--dns NAME]...
//!   gkeeperd version

mod bootstrap;
mod net;
mod private;
mod public;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use gk_core::config::{self, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "gkeeperd", version, about = "GophKeeper server")]
struct Cli {
    /// Cache directory for certificates and database
    #[arg(long, short = 'd', env = "GK_SERVER_DIR", global = true)]
    dir: Option<PathBuf>,

    /// Public (plaintext enrolment) port to listen on
    #[arg(long, short = 'p', default_value_t = config::DEFAULT_PUBLIC_PORT)]
    public_port: u16,

    /// Private (mTLS record) port to listen on
    #[arg(long, short = 's', default_value_t = config::DEFAULT_PRIVATE_PORT)]
    private_port: u16,

    /// DNS names for the server certificate
    #[arg(long = "dns", value_name = "NAME", global = true)]
    dns_names: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "GK_LOG", default_value = "info")]
    log: String,

    /// Log format (json, text)
    #[arg(long, env = "GK_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialise a new server. All data and certificates are overwritten!
    Init,
    /// Print the server version
    Version,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Version) = cli.command {
        println!("gkeeperd {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    init_logging(&cli.log, &cli.log_format);

    let config = ServerConfig {
        cache_dir: cli
            .dir
            .unwrap_or_else(|| config::default_cache_dir("gophkeeper-server")),
        public_port: cli.public_port,
        private_port: cli.private_port,
        dns_names: if cli.dns_names.is_empty() {
            vec!["localhost".into()]
        } else {
            cli.dns_names
        },
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        dir = %config.cache_dir.display(),
        "gkeeperd starting"
    );

    match cli.command {
        Some(Command::Init) => bootstrap::init(&config).await,
        Some(Command::Version) => unreachable!("handled above"),
        None => server::run(config).await,
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}
