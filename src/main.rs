//! Value-bet pipeline entry point.

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use valuecast::config::Config;
use valuecast::metrics;
use valuecast::pipeline::Pipeline;

/// Value-bet detection and distribution pipeline.
#[derive(Parser, Debug)]
#[command(name = "valuecast")]
#[command(about = "Pulls surebets from an upstream feed and fans value picks out to chat channels")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline (default).
    Run,

    /// Check configuration validity.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("valuecast=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    metrics::init_metrics();

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config().await,
        Some(Command::Run) | None => cmd_run().await,
    }
}

/// Check configuration validity.
async fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("VALUECAST - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Feed: {}", config.api_base);
    println!("  Sharps: {}", config.sharp_bookmakers.join(", "));
    println!("  Targets: {}", config.target_bookies.join(", "));
    println!("  Source: {}", config.source_bookmakers().join("|"));
    println!("  Bots: {}", config.bot_tokens.len());
    println!("  Odds window: [{}, {}]", config.min_odds, config.max_odds);
    println!(
        "  Profit window: [{}%, {}%]",
        config.min_profit, config.max_profit
    );
    println!(
        "  Polling: {}s base, {}s max",
        config.polling_base_interval, config.polling_max_interval
    );
    println!("  Concurrent picks: {}", config.concurrent_picks);
    println!("  Queue capacity: {}", config.dispatcher_max_queue);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Run the pipeline until interrupted.
async fn cmd_run() -> anyhow::Result<()> {
    info!("Loading configuration...");
    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    info!("Configuration loaded successfully");
    info!(
        "Sharps: {} | Targets: {} | Bots: {}",
        config.sharp_bookmakers.join(", "),
        config.target_bookies.join(", "),
        config.bot_tokens.len()
    );

    let cancel = CancellationToken::new();
    let pipeline_cancel = cancel.clone();
    let mut pipeline = tokio::spawn(async move { Pipeline::run(config, pipeline_cancel).await });

    tokio::select! {
        result = &mut pipeline => {
            // The pipeline only returns on its own for a startup failure.
            match result? {
                Ok(()) => return Ok(()),
                Err(e) => {
                    error!(error = %e, "Pipeline exited with error");
                    return Err(anyhow::anyhow!("{e}"));
                }
            }
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutdown signal received");
            cancel.cancel();
        }
    }

    match pipeline.await? {
        Ok(()) => info!("Pipeline exited cleanly"),
        Err(e) => {
            error!(error = %e, "Pipeline exited with error");
            return Err(anyhow::anyhow!("{e}"));
        }
    }

    Ok(())
}
