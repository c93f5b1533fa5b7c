use actirank_core::config::{ActirankConfig, CONFIG_FILE_NAME};
use actirank_core::labels::ActivityLabelMap;
use actirank_core::training;
use actirank_core::Pipeline;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(author, version, about = "Activity recognition for body-sensor recordings", long_about = None)]
struct Cli {
    /// Config file (default: $ACTIRANK_CONFIG or ~/.actirank/actirank.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a tab-separated recording and print the activity report
    Detect {
        /// Path to the recording
        file: PathBuf,
        /// Pretty-print the JSON output
        #[arg(short, long)]
        pretty: bool,
    },
    /// Train a model from a directory of labelled recordings
    Train {
        /// Directory containing the recordings
        dir: PathBuf,
        /// Where to write the model (default: model.path from the config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List activity codes and names
    Labels,
    /// Report service health and model availability
    Health,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

/// Resolve the config file location.
fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    if let Ok(path) = std::env::var("ACTIRANK_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(home.join(".actirank").join(CONFIG_FILE_NAME))
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let raw = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{raw}");
    Ok(())
}

fn cmd_detect(config: &ActirankConfig, file: &Path, pretty: bool) -> Result<ExitCode> {
    let pipeline = Pipeline::from_config(config).context("Invalid sampling configuration")?;
    match pipeline.detect_file(file) {
        Ok(report) => {
            print_json(&report, pretty)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            log::error!("Detection failed for {}: {e}", file.display());
            print_json(&e.to_response(), pretty)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn cmd_train(config: &ActirankConfig, dir: &Path, output: Option<PathBuf>) -> Result<()> {
    let outcome = training::train(dir, config)?;
    let out_path = output.unwrap_or_else(|| config.model.path.clone());

    println!(
        "Trained on {} windows from {} recordings",
        outcome.total_windows, outcome.files_used
    );
    println!();
    println!("{}", outcome.report);
    println!();

    outcome
        .model
        .save(&out_path)
        .with_context(|| format!("Failed to write model: {}", out_path.display()))?;
    println!("Model saved to: {}", out_path.display());
    Ok(())
}

fn cmd_labels() {
    for entry in ActivityLabelMap::standard().entries() {
        println!("{:>3}  {}", entry.code, entry.name);
    }
}

fn cmd_health(config: &ActirankConfig) -> Result<()> {
    let pipeline = Pipeline::from_config(config).context("Invalid sampling configuration")?;
    print_json(&pipeline.health(), false)
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(anyhow!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        ));
    }
    ActirankConfig::default()
        .persist(path)
        .with_context(|| format!("Failed to write config: {}", path.display()))?;
    println!("Config written to: {}", path.display());
    Ok(())
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let path = config_path(cli.config)?;
    let load = || ActirankConfig::load_or_default(&path);

    match cli.command {
        Commands::Detect { file, pretty } => {
            return cmd_detect(&load()?, &file, pretty);
        }
        Commands::Train { dir, output } => {
            cmd_train(&load()?, &dir, output)?;
        }
        Commands::Labels => {
            cmd_labels();
        }
        Commands::Health => {
            cmd_health(&load()?)?;
        }
        Commands::Init { force } => {
            cmd_init(&path, force)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
