//! solgrade - sandboxed smart-contract grading runner

use clap::{Parser, Subcommand};
use solgrade_config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit code for configuration errors.
const EXIT_CONFIG: i32 = 1;
/// Exit code for runtime / I-O errors.
const EXIT_IO: i32 = 2;

#[derive(Parser)]
#[command(name = "solgrade")]
#[command(author, version, about = "Sandboxed smart-contract grading runner", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the submission runner (default)
    Serve,

    /// Probe the container engine, store, and bus
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("configuration error: {e}");
            std::process::exit(EXIT_CONFIG);
        }
    };

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => solgrade_cli::serve(settings).await,
        Commands::Check => solgrade_cli::check(settings).await,
    };

    if let Err(e) = result {
        tracing::error!("{e:#}");
        std::process::exit(EXIT_IO);
    }
}
