mod commands;
mod config;
mod host;
mod signer;

use clap::{Parser, Subcommand};
use config::CliConfig;
use host::CliHost;
use pulse_core::{PulseError, SessionManager};
use signer::TerminalSigner;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pulse")]
#[command(about = "Pulse SDK - chain sessions and on-chain rounds")]
#[command(version)]
struct Cli {
    /// Data directory for session storage
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Node service URL
    #[arg(long, global = true)]
    node: Option<String>,

    /// Faucet URL
    #[arg(long, global = true)]
    faucet: Option<String>,

    /// Use the public testnet endpoints
    #[arg(long, global = true)]
    testnet: bool,

    /// Sign with the primary wallet without asking
    #[arg(short, long, global = true)]
    yes: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Session and identity commands
    #[command(subcommand)]
    Session(commands::SessionCommands),

    /// Color trading rounds
    #[command(subcommand)]
    Color(commands::ColorCommands),

    /// Multi-chain bingo
    #[command(subcommand)]
    Bingo(commands::BingoCommands),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "pulse={}",
            log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = CliConfig {
        testnet: cli.testnet,
        node_url: cli.node,
        faucet_url: cli.faucet,
        verbose: cli.verbose,
        ..CliConfig::default()
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    // Ensure data directory exists
    tokio::fs::create_dir_all(&config.data_dir).await?;

    let host = Arc::new(CliHost::default());
    let result = run(cli.command, &config, cli.yes, host.clone()).await;

    if host.reload_requested() {
        println!("Local state was wiped. Run 'pulse session connect' to start over.");
    }

    if let Err(e) = result {
        match e {
            PulseError::NotConnected => {
                eprintln!("Error: No active session");
                eprintln!("Use 'pulse session connect' to claim a chain first");
            }
            PulseError::ConnectInProgress => {
                eprintln!("Error: A connection attempt is already running");
            }
            PulseError::SignerRejected(reason) => {
                eprintln!("Error: Signing rejected: {}", reason);
            }
            PulseError::FatalSyncCorruption { signature, .. } => {
                eprintln!("Error: Local chain state was corrupted ({})", signature);
                eprintln!("The session was reset; connect again to continue");
            }
            PulseError::Config(msg) => {
                eprintln!("Error: Invalid configuration: {}", msg);
            }
            _ => {
                eprintln!("Error: {}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(
    command: Commands,
    config: &CliConfig,
    auto_approve: bool,
    host: Arc<CliHost>,
) -> pulse_core::Result<()> {
    let session_config = config.session_config()?;
    let primary = Arc::new(TerminalSigner::new(auto_approve));

    let manager = SessionManager::open(&config.data_dir, session_config, primary, host).await?;
    manager.initialize().await?;

    match command {
        Commands::Session(cmd) => commands::handle_session_command(cmd, &manager).await,
        Commands::Color(cmd) => commands::handle_color_command(cmd, &manager).await,
        Commands::Bingo(cmd) => commands::handle_bingo_command(cmd, &manager).await,
    }
}
