//! DefectScope CLI - quality metrics from defect-tracker exports

// Global invariants enforced:
// - Deterministic output ordering
// - Identical input and --as-of yield byte-for-byte identical output
// - Logs go to stderr; stdout carries only the report

use anyhow::Context;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Parser, Subcommand};
use defectscope_core::config::{self, ResolvedConfig};
use defectscope_core::{analyze, forecast_only, load_raw_defects};
use defectscope_core::{render_forecast_text, render_json, render_text};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "defectscope")]
#[command(about = "Defect quality metrics: Pareto, hotspots, risk, escape rate and forecasts")]
#[command(version = env!("DEFECTSCOPE_VERSION"))]
struct Cli {
    /// Log progress to stderr (overridden by DEFECTSCOPE_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the full metrics bundle for a defect export
    Analyze {
        /// Path to a JSON array of defect records
        input: PathBuf,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Reference date for ages and forecasts (default: today)
        #[arg(long, value_parser = parse_as_of)]
        as_of: Option<NaiveDate>,

        /// Path to config file (default: auto-discover next to the input)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Risk score at or above which a defect is high risk (overrides config file)
        #[arg(long)]
        high_risk_threshold: Option<f64>,

        /// Write the report to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Compute only the backlog and inflow forecast
    Forecast {
        /// Path to a JSON array of defect records
        input: PathBuf,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Reference date for ages and forecasts (default: today)
        #[arg(long, value_parser = parse_as_of)]
        as_of: Option<NaiveDate>,

        /// Path to config file (default: auto-discover next to the input)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Validate or show configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file without running analysis
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Analyze {
            input,
            format,
            as_of,
            config: config_path,
            high_risk_threshold,
            output,
        } => {
            let mut resolved = load_config_for(&input, config_path.as_deref())?;

            // CLI flags override config file values
            if let Some(threshold) = high_risk_threshold {
                if !(threshold > 0.0 && threshold <= 100.0) {
                    anyhow::bail!(
                        "--high-risk-threshold must be within (0, 100] (got {})",
                        threshold
                    );
                }
                resolved.high_risk_threshold = threshold;
            }

            let raw = load_raw_defects(&input)?;
            let mut bundle = analyze(&raw, reference_instant(as_of), &resolved);
            bundle.generator = Some(generator_label());

            let rendered = match format {
                OutputFormat::Text => render_text(&bundle),
                OutputFormat::Json => render_json(&bundle),
            };
            emit(&rendered, output.as_deref())?;
        }
        Commands::Forecast {
            input,
            format,
            as_of,
            config: config_path,
        } => {
            let resolved = load_config_for(&input, config_path.as_deref())?;
            let raw = load_raw_defects(&input)?;
            let forecast = forecast_only(&raw, reference_instant(as_of), &resolved);

            let rendered = match format {
                OutputFormat::Text => render_forecast_text(&forecast),
                OutputFormat::Json => render_json(&forecast),
            };
            emit(&rendered, None)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => {
                let project_root = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&project_root, path.as_deref());

                match resolved {
                    Ok(config) => {
                        if let Some(ref p) = config.config_path {
                            println!("Config valid: {}", p.display());
                        } else {
                            println!("No config file found. Using defaults.");
                        }
                    }
                    Err(e) => {
                        eprintln!("Config validation failed: {:#}", e);
                        std::process::exit(1);
                    }
                }
            }
            ConfigAction::Show { path } => {
                let project_root = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&project_root, path.as_deref())
                    .context("failed to load configuration")?;
                print_config(&resolved);
            }
        },
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        "defectscope=info"
    } else {
        "defectscope=warn"
    };
    let filter = EnvFilter::try_from_env("DEFECTSCOPE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Stamped into every metrics bundle the CLI writes
fn generator_label() -> String {
    format!("defectscope {}", env!("DEFECTSCOPE_VERSION"))
}

fn parse_as_of(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

/// Midnight of `--as-of`, or the current local time
fn reference_instant(as_of: Option<NaiveDate>) -> NaiveDateTime {
    match as_of {
        Some(date) => date.and_time(NaiveTime::MIN),
        None => Local::now().naive_local(),
    }
}

/// Resolve config from `--config` or the input file's directory
fn load_config_for(input: &Path, config_path: Option<&Path>) -> anyhow::Result<ResolvedConfig> {
    if !input.exists() {
        anyhow::bail!("Input does not exist: {}", input.display());
    }
    let dir = match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    let resolved = config::load_and_resolve(&dir, config_path)
        .context("failed to load configuration")?;

    if let Some(ref p) = resolved.config_path {
        tracing::info!(path = %p.display(), "using config");
    }
    Ok(resolved)
}

fn emit(rendered: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            write_report(path, rendered)?;
            eprintln!("Report written to: {}", path.display());
        }
        None => {
            print!("{}", rendered);
            if !rendered.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}

fn print_config(resolved: &ResolvedConfig) {
    println!("Configuration:");
    if let Some(ref p) = resolved.config_path {
        println!("  Source: {}", p.display());
    } else {
        println!("  Source: defaults (no config file found)");
    }
    println!();
    println!("Forecast:");
    println!("  forecast_from_year: {}", resolved.forecast_from_year);
    println!("  closed_states: {}", resolved.closed_states.join(", "));
    println!();
    println!("Ranking:");
    println!("  pareto_cutoff_percent: {}", resolved.pareto_cutoff_percent);
    println!("  heatmap_top_n: {}", resolved.heatmap_top_n);
    println!("  top_root_causes: {}", resolved.top_root_causes);
    println!();
    println!("Risk:");
    println!("  high_risk_threshold: {}", resolved.high_risk_threshold);
}

fn write_report(path: &Path, contents: &str) -> anyhow::Result<()> {
    use std::fs;

    // Create parent directories if needed
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    // Atomic write (temp + rename pattern)
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, contents)
        .with_context(|| format!("Failed to write temporary file: {}", temp_path.display()))?;
    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temporary file to: {}", path.display()))?;

    Ok(())
}
