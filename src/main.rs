use clap::{Parser, Subcommand};
use debugger_mcp::{Config, Result};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "debugger_mcp")]
#[command(about = "CDP-based debugging engine for Node.js", version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring up the Session Manager and tool-dispatch surface
    Serve {
        /// Set log level (trace, debug, info, warn, error)
        #[arg(long, default_value = "info")]
        log_level: String,

        /// Inspector Client per-call deadline, in milliseconds
        #[arg(long, default_value_t = 10_000)]
        default_timeout_ms: u64,

        /// Hang Detector's overall timeout default, in milliseconds
        #[arg(long, default_value_t = 5_000)]
        hang_timeout_ms: u64,

        /// Hang Detector sampling cadence, in milliseconds
        #[arg(long, default_value_t = 100)]
        sample_interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            log_level,
            default_timeout_ms,
            hang_timeout_ms,
            sample_interval_ms,
        } => {
            let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();

            let config = Config {
                default_timeout_ms,
                hang_timeout_ms,
                sample_interval_ms,
                log_level,
            };

            debugger_mcp::serve(config).await?;
        }
    }

    Ok(())
}
