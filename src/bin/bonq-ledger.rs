//! BONQ ledger CLI
//!
//! Prints the effective protocol parameters and replays JSON scenarios
//! against a fresh registry.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::{style, Term};

use bonq_ledger::core::config::ProtocolConfig;
use bonq_ledger::core::registry::Registry;
use bonq_ledger::protocol::operations::Scenario;

/// BONQ ledger - troves, stability pool and liquidations in memory
#[derive(Parser)]
#[command(name = "bonq-ledger")]
#[command(version = bonq_ledger::VERSION)]
#[command(about = "Collateralized-debt ledger engine", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Protocol configuration file (JSON); defaults apply when omitted
    #[arg(short, long, env = "BONQ_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective protocol parameters
    Params,

    /// Replay a scenario file against a fresh registry
    Replay {
        /// Scenario file (JSON)
        file: PathBuf,

        /// Print the final registry state as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    let term = Term::stdout();

    if let Err(e) = run_command(&cli, &term) {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run_command(cli: &Cli, term: &Term) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Params => cmd_params(cli, term),
        Commands::Replay { file, json } => cmd_replay(cli, file, *json, term),
    }
}

/// Configuration file if given, defaults otherwise, then environment overrides
fn load_config(cli: &Cli) -> anyhow::Result<ProtocolConfig> {
    let config = match &cli.config {
        Some(path) => ProtocolConfig::load(path)?,
        None => ProtocolConfig::default(),
    };
    let config = config.with_env_overrides()?;
    config.validate()?;
    Ok(config)
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMAND HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

fn cmd_params(cli: &Cli, term: &Term) -> anyhow::Result<()> {
    let config = load_config(cli)?;

    let _ = term.write_line(&format!("{} {} protocol parameters", style("ℹ").blue(), bonq_ledger::PROTOCOL_NAME));
    let _ = term.write_line(&format!("  Borrow fee rate:     {}", style(&config.borrow_fee_rate).yellow()));
    let _ = term.write_line(&format!("  Liquidation reserve: {}", style(&config.liquidation_reserve).yellow()));
    let _ = term.write_line(&format!(
        "  Stable asset:        {} ({})",
        style(&config.stable_asset.symbol).green(),
        config.stable_asset.name
    ));
    let _ = term.write_line(&format!(
        "  Fee asset:           {} ({})",
        style(&config.fee_asset.symbol).green(),
        config.fee_asset.name
    ));
    let _ = term.write_line("");
    let _ = term.write_line(&format!("  {:<8} {:>14} {:>8}", "Asset", "Price", "MCR"));
    for asset in config.assets() {
        let _ = term.write_line(&format!(
            "  {:<8} {:>14} {:>8}",
            asset.symbol.as_str(),
            asset.price.to_string(),
            asset.mcr.to_string()
        ));
    }

    Ok(())
}

fn cmd_replay(cli: &Cli, file: &Path, json: bool, term: &Term) -> anyhow::Result<()> {
    let mut scenario = Scenario::load(file)
        .with_context(|| format!("loading scenario {}", file.display()))?;
    scenario.config = match &cli.config {
        Some(_) => load_config(cli)?,
        None => scenario.config.with_env_overrides()?,
    };

    let _ = term.write_line(&format!(
        "{} Replaying {} operation(s) from {}",
        style("→").cyan(),
        scenario.operations.len(),
        file.display()
    ));

    let mut registry = Registry::new(scenario.config.clone())?;
    for (index, op) in scenario.operations.iter().enumerate() {
        let outcome = registry
            .execute(op)
            .with_context(|| format!("operation #{} ({}) failed", index + 1, op.operation_type()))?;
        let _ = term.write_line(&format!("{} [{}] {}", style("✓").green(), index + 1, outcome));
    }

    let _ = term.write_line("");
    let _ = term.write_line(&format!("{} Final state", style("ℹ").blue()));
    let _ = term.write_line(&format!("  {}", registry.stats()));
    for trove in registry.troves() {
        let state = registry.trove_state(trove.key())?;
        let ratio = style(state.ratio.round(6, Default::default()));
        let ratio = if state.liquidatable { ratio.red() } else { ratio.green() };
        let _ = term.write_line(&format!(
            "  {:<24} collateral {} debt {} ratio {}",
            trove.key().to_string(),
            state.collateral,
            state.debt,
            ratio
        ));
    }

    if json {
        let _ = term.write_line(&serde_json::to_string_pretty(&registry)?);
    }

    Ok(())
}
