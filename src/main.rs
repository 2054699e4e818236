//! BGS Tally - Entry Point
//!
//! Runs the tally engine against game events read as JSON lines from stdin,
//! polling for server ticks in the background. The other subcommands inspect
//! or adjust the saved state without touching the network.

use std::path::PathBuf;
use std::sync::Arc;

use bgs_tally::core::config::TallyConfig;
use bgs_tally::core::error::Result;
use bgs_tally::engine::TallyEngine;
use bgs_tally::persistence::JsonFileStore;
use bgs_tally::runner;
use bgs_tally::tick::HttpTickSource;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

/// Tick-bounded BGS activity tally
#[derive(Parser, Debug)]
#[command(name = "bgs-tally")]
#[command(about = "Aggregate Elite Dangerous BGS activity per server tick")]
struct Args {
    /// Path to the TOML config file (defaults apply if it does not exist)
    #[arg(long, short = 'c', default_value = "bgs_tally.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read JSON-line events from stdin and tally them until EOF or Ctrl-C
    ///
    /// A line `{"command":"force_tick"}` forces a tick in the running engine.
    Run,
    /// Show the last tick, the next predicted tick and current activity
    Status,
    /// Treat now as a new tick and rotate the current activity into history
    ///
    /// Refused while `run` holds the state file.
    ForceTick,
    /// Show summaries of previous ticks, most recent first
    History {
        #[arg(long, short = 'n', default_value_t = 5)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bgs_tally=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    if let Err(err) = run(args).await {
        tracing::error!(%err, "bgs-tally failed");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = TallyConfig::load(&args.config)?;
    let state_file = JsonFileStore::new(&config.state_path);

    match args.command {
        Command::Run => {
            let _lock = state_file.lock()?;
            let engine = open_engine(&config, state_file)?;
            run_engine(engine, &config).await
        }
        Command::Status => {
            print_status(&*open_engine(&config, state_file)?);
            Ok(())
        }
        Command::ForceTick => {
            // A running `run` holds the lock; it takes {"command":"force_tick"} on stdin instead
            let _lock = state_file.lock()?;
            let engine = open_engine(&config, state_file)?;
            if engine.force_tick_async(Utc::now()).await {
                println!("Tick forced at {}", engine.oracle().formatted());
            } else {
                println!("Forced tick did not advance past the current one");
            }
            engine.save_async().await
        }
        Command::History { limit } => {
            let engine = open_engine(&config, state_file)?;
            let preferences = engine.preferences();
            let history = engine.history(limit);
            if history.is_empty() {
                println!("No previous ticks recorded");
            }
            for snapshot in &history {
                println!("{}", snapshot.summary(&preferences));
            }
            Ok(())
        }
    }
}

fn open_engine(
    config: &TallyConfig,
    state_file: JsonFileStore,
) -> Result<Arc<TallyEngine<HttpTickSource>>> {
    let source = HttpTickSource::from_config(config)?;
    Ok(Arc::new(TallyEngine::open(source, config, Box::new(state_file))?))
}

async fn run_engine(engine: Arc<TallyEngine<HttpTickSource>>, config: &TallyConfig) -> Result<()> {
    tracing::info!(url = %engine.oracle().source().url(), "BGS Tally starting...");

    let interrupted = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(%err, "cannot listen for Ctrl-C, running until end of input");
            std::future::pending::<()>().await;
        }
    };
    let stdin = BufReader::new(tokio::io::stdin());
    let summary = runner::run_until(
        Arc::clone(&engine),
        stdin,
        config.poll_interval(),
        interrupted,
    )
    .await?;

    tracing::info!(tallied = summary.tallied, forced = summary.forced, "shut down");
    print_status(&engine);
    Ok(())
}

fn print_status(engine: &TallyEngine<HttpTickSource>) {
    let oracle = engine.oracle();
    let now = Utc::now();
    println!("Last tick:      {}", oracle.formatted());
    if oracle.last_tick().is_known() {
        println!(
            "Next predicted: {} ({})",
            oracle.next_predicted().format("%Y-%m-%d %H:%M:%S"),
            oracle.alert(now)
        );
    }
    println!("{}", engine.current().summary(&engine.preferences()));
}
