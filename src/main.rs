//! forklet CLI application
//!
//! Command-line interface for downloading filtered subsets of GitHub
//! repositories with concurrent transfers and progress tracking.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use forklet::cli::{handle_download, handle_list, handle_rate_limit, Cli, Commands};
use forklet::config::AppConfig;
use forklet::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    let config = AppConfig::load(cli.global.config.clone()).await?;

    init_logging(&cli, &config);

    info!("forklet v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Download(args) => {
            info!("Executing download command");
            handle_download(&cli.global, &config, args).await
        }
        Commands::List(args) => {
            info!("Executing list command");
            handle_list(&cli.global, &config, args).await
        }
        Commands::RateLimit => {
            info!("Executing rate-limit command");
            handle_rate_limit(&cli.global, &config).await
        }
    }
}

/// Initialize logging from CLI verbosity, falling back to the configured level
fn init_logging(cli: &Cli, config: &AppConfig) {
    let global = &cli.global;
    let level = if global.quiet || global.verbose || global.very_verbose {
        cli.log_level().to_string().to_lowercase()
    } else {
        config.logging.level.clone()
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("forklet={}", level)));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(config.logging.colored_output)
        .with_level(global.very_verbose)
        .with_writer(std::io::stderr)
        .init();

    if global.very_verbose {
        info!("Very verbose logging enabled");
    } else if global.verbose {
        info!("Verbose logging enabled");
    }
}
