//! QVote CLI: weight previews, scenario simulation and config inspection.

mod scenario;

use anyhow::Context;
use clap::Parser;
use qvote_engine::EngineConfig;
use qvote_types::{Credits, Multiplier, Weight};
use qvote_utils::{init_logging, LogFormat};
use qvote_weight::{TallySnapshot, WeightCalculator};
use scenario::Scenario;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "qvote", about = "Reputation-weighted quadratic voting engine")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// CLI flags and env vars override them.
    #[arg(long, env = "QVOTE_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter: "trace", "debug", "info", "warn", "error" or a full directive.
    #[arg(long, env = "QVOTE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output: "human" or "json".
    #[arg(long, env = "QVOTE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Per-vote credit ceiling.
    #[arg(long, env = "QVOTE_MAX_CREDITS_PER_VOTE")]
    max_credits_per_vote: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Compute the weight a vote would receive.
    Preview {
        #[arg(long)]
        credits: u128,

        /// Reputation multiplier in [0.3, 3.0], e.g. "1.5".
        #[arg(long, default_value = "1.0")]
        multiplier: String,

        /// Poll's total weighted votes so far, as a decimal.
        #[arg(long, default_value = "0")]
        total_weight: String,

        /// Voters so far. Zero means no cap applies.
        #[arg(long, default_value_t = 0)]
        total_voters: u64,

        /// The poll's max weight cap (multiple of the average).
        #[arg(long, default_value_t = 10)]
        cap: u32,
    },

    /// Run a scenario file through the engine and print the outcome as JSON.
    Simulate { scenario: PathBuf },

    /// Print the effective configuration as TOML.
    Config,
}

#[derive(Serialize)]
struct PreviewReport {
    credits: u128,
    multiplier: String,
    raw: String,
    applied: String,
    cap: Option<String>,
    capped: bool,
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_toml_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if let Some(max) = cli.max_credits_per_vote {
        config.max_credits_per_vote = max;
    }
    config.validate()?;
    Ok(config)
}

fn preview(
    config: &EngineConfig,
    credits: u128,
    multiplier: &str,
    total_weight: &str,
    total_voters: u64,
    cap: u32,
) -> anyhow::Result<PreviewReport> {
    let multiplier = Multiplier::parse_decimal(multiplier)
        .with_context(|| format!("invalid multiplier {multiplier:?}"))?;
    let total_weight = Weight::parse_decimal(total_weight)
        .with_context(|| format!("invalid total weight {total_weight:?}"))?;

    let calculator = WeightCalculator::from_limits(&config.poll_limits());
    let snapshot = TallySnapshot::new(total_voters, total_weight, cap);
    let outcome = calculator.preview(Credits::new(credits), multiplier, &snapshot)?;

    Ok(PreviewReport {
        credits,
        multiplier: multiplier.to_string(),
        raw: outcome.raw.to_decimal_string(4),
        applied: outcome.applied.to_decimal_string(4),
        cap: outcome.cap.map(|c| c.to_decimal_string(4)),
        capped: outcome.was_capped(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(config.log_format, &config.log_level)?;

    match cli.command {
        Command::Preview {
            credits,
            multiplier,
            total_weight,
            total_voters,
            cap,
        } => {
            let report = preview(&config, credits, &multiplier, &total_weight, total_voters, cap)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Simulate { scenario } => {
            let scenario = Scenario::from_toml_file(&scenario)?;
            let report = scenario.run(config).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Config => {
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}
