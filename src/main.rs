use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use peerboard::config::Config;
use peerboard::output::Format;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "peerboard",
    version,
    about = "Peer-to-peer message board with anti-entropy sync"
)]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    format: Format,
    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a node and open the interactive menu
    Run {
        /// Author name stamped on messages (falls back to PEERBOARD_AUTHOR)
        #[arg(long, short)]
        author: Option<String>,
        /// Store file holding peers and messages
        #[arg(long, short)]
        file: Option<PathBuf>,
        /// JSON config file; flags override its values
        #[arg(long)]
        config: Option<PathBuf>,
        /// Host to bind and dial peers on
        #[arg(long)]
        host: Option<IpAddr>,
        /// Milliseconds between background sweeps
        #[arg(long)]
        sweep_interval_ms: Option<u64>,
        /// Most peers pulled per sweep
        #[arg(long)]
        sweep_cap: Option<usize>,
    },
    /// Print the messages in a store file without starting a node
    List {
        /// Store file to read
        #[arg(long, short, default_value = "peerboard.json")]
        file: PathBuf,
    },
    /// Print the peers recorded in a store file
    Peers {
        /// Store file to read
        #[arg(long, short, default_value = "peerboard.json")]
        file: PathBuf,
    },
}

fn init_tracing(verbosity: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        EnvFilter::new(level)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(
    author: Option<String>,
    file: Option<PathBuf>,
    config_path: Option<PathBuf>,
    host: Option<IpAddr>,
    sweep_interval_ms: Option<u64>,
    sweep_cap: Option<usize>,
) -> peerboard::Result<Config> {
    let from_file = config_path.is_some();
    let mut config = match config_path {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    let env_author = std::env::var(peerboard::config::AUTHOR_ENV).ok();
    config.resolve_author(author, env_author, from_file);
    if let Some(file) = file {
        config.store_path = file;
    }
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(ms) = sweep_interval_ms {
        config.sweep_interval_ms = ms;
    }
    if let Some(cap) = sweep_cap {
        config.sweep_cap = cap;
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> peerboard::Result<()> {
    let format = cli.format;
    match cli.command {
        Commands::Run {
            author,
            file,
            config,
            host,
            sweep_interval_ms,
            sweep_cap,
        } => {
            let config = resolve_config(author, file, config, host, sweep_interval_ms, sweep_cap)?;
            peerboard::commands::run::run(config, format)
        }
        Commands::List { file } => peerboard::commands::list::run(&file, format),
        Commands::Peers { file } => peerboard::commands::peers::run(&file, format),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let format = cli.format;
    if let Err(e) = run(cli) {
        match format {
            Format::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "error": e.code(),
                        "message": e.to_string()
                    })
                );
            }
            _ => eprintln!("error: {e}"),
        }
        std::process::exit(1);
    }
}
