//! TrendGate CLI: replay, config checking and synthetic data.
//!
//! Commands:
//! - `replay` runs a recorded feed through the engine from a TOML run config
//! - `check-config` validates a run config and prints the resolved settings
//! - `synthetic` writes a seeded synthetic tick CSV

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use trendgate_runner::{generate_ticks, run, write_ticks_file, RunConfig, SyntheticConfig};

#[derive(Parser)]
#[command(
    name = "trendgate",
    about = "TrendGate: multi-timeframe futures signal and trade lifecycle engine"
)]
struct Cli {
    /// Debug-level engine logging.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded feed through the engine.
    Replay {
        /// Path to a TOML run config.
        #[arg(long)]
        config: PathBuf,

        /// Override the JSON Lines order intent output.
        #[arg(long)]
        intents: Option<PathBuf>,

        /// Override the CSV trade tape output.
        #[arg(long)]
        trades: Option<PathBuf>,

        /// Write the full replay report as JSON.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Treat the whole run as a news blackout.
        #[arg(long, default_value_t = false)]
        blackout: bool,
    },
    /// Validate a run config and print it fully resolved.
    CheckConfig {
        /// Path to a TOML run config.
        #[arg(long)]
        config: PathBuf,
    },
    /// Write a seeded synthetic tick CSV.
    Synthetic {
        /// Output CSV path.
        #[arg(long)]
        out: PathBuf,

        #[arg(long, default_value = "GC")]
        instrument: String,

        #[arg(long, default_value_t = 7)]
        seed: u64,

        /// First calendar day (YYYY-MM-DD).
        #[arg(long, default_value = "2024-03-04")]
        start: String,

        /// Calendar days to cover; weekends produce no ticks.
        #[arg(long, default_value_t = 14)]
        days: u32,

        #[arg(long, default_value_t = 2000.0)]
        start_price: f64,

        #[arg(long, default_value_t = 30)]
        tick_seconds: i64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Replay {
            config,
            intents,
            trades,
            report,
            blackout,
        } => run_replay(&config, intents, trades, report, blackout),
        Commands::CheckConfig { config } => run_check_config(&config),
        Commands::Synthetic {
            out,
            instrument,
            seed,
            start,
            days,
            start_price,
            tick_seconds,
        } => {
            let start_date = NaiveDate::parse_from_str(&start, "%Y-%m-%d")
                .with_context(|| format!("bad --start date '{start}'"))?;
            let config = SyntheticConfig {
                instrument,
                seed,
                start_date,
                days,
                start_price,
                tick_seconds,
                ..SyntheticConfig::default()
            };
            run_synthetic(&out, &config)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "info,trendgate_core=debug,trendgate_runner=debug"
    } else {
        "info,trendgate_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn load_config(path: &Path) -> Result<RunConfig> {
    RunConfig::from_file(path).with_context(|| format!("loading run config {}", path.display()))
}

fn run_replay(
    config_path: &Path,
    intents: Option<PathBuf>,
    trades: Option<PathBuf>,
    report_path: Option<PathBuf>,
    blackout: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if intents.is_some() {
        config.output.intents = intents;
    }
    if trades.is_some() {
        config.output.trades = trades;
    }
    if blackout {
        config.news.manual = true;
    }

    let report = run(&config).context("replay failed")?;

    println!("Instrument:   {}", config.engine.instrument);
    println!("Events:       {}", report.events);
    for (tf, count) in &report.bars_closed {
        println!("  {tf:<4} bars  {count}");
    }
    println!("Intents:      {}", report.intents.len());
    println!("Orders:       {}", report.orders.len());
    if report.rejected_inputs > 0 {
        println!("Rejected:     {}", report.rejected_inputs);
    }
    for (kind, count) in &report.decision_errors {
        println!("  {kind:<22} {count}");
    }
    println!("{}", report.summary);
    println!("Fingerprint:  {}", report.fingerprint);
    if let Some(path) = &config.output.intents {
        println!("Intents written to: {}", path.display());
    }
    if let Some(path) = &config.output.trades {
        println!("Trades written to:  {}", path.display());
    }

    if let Some(path) = report_path {
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &report)
            .with_context(|| format!("writing report {}", path.display()))?;
        println!("Report written to: {}", path.display());
    }
    Ok(())
}

fn run_check_config(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    let window = config.engine.session.window()?;
    info!(path = %path.display(), "config ok");

    println!("Instrument:   {}", config.engine.instrument);
    println!(
        "Session:      {} - {} {}",
        window.start, window.end, window.zone
    );
    println!(
        "Timeframes:   ltf {}  htf {}",
        config.engine.timeframes.ltf, config.engine.timeframes.htf
    );
    println!(
        "Feed:         {} ({:?}, zone {})",
        config.feed.path.display(),
        config.feed.kind,
        config.feed_zone()?
    );
    println!("News windows: {}", config.news.windows.len());
    println!(
        "{}",
        toml::to_string_pretty(&config).context("serializing resolved config")?
    );
    Ok(())
}

fn run_synthetic(out: &Path, config: &SyntheticConfig) -> Result<()> {
    let ticks = generate_ticks(config);
    write_ticks_file(out, &ticks).with_context(|| format!("writing {}", out.display()))?;
    info!(
        ticks = ticks.len(),
        seed = config.seed,
        path = %out.display(),
        "synthetic ticks written"
    );
    println!("Wrote {} ticks to {}", ticks.len(), out.display());
    Ok(())
}
