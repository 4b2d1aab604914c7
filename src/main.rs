// src/main.rs
//! Budget anomaly command line entry point
use anyhow::{bail, Context, Result};
use budget_anomaly::anomaly_detection::{
    samples, storage, AnomalyDetectionConfig, AnomalyDetector, BatchAnalyzer, Transaction,
    TransactionStatistics,
};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "budget-anomaly")]
#[command(about = "Budget transaction anomaly scoring")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// JSON configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model and write its snapshot
    Train(TrainArgs),
    /// Score a batch and print the report
    Analyze(AnalyzeArgs),
    /// Print descriptive statistics for a batch
    Stats {
        /// JSON array of transactions
        #[arg(long)]
        input: PathBuf,
    },
    /// Print the bundled demo batch
    Demo,
}

#[derive(ClapArgs)]
struct TrainArgs {
    /// JSON array of training transactions
    #[arg(long, required_unless_present = "sample", conflicts_with = "sample")]
    input: Option<PathBuf>,
    /// Train on the bundled training set
    #[arg(long)]
    sample: bool,
    /// Snapshot output path
    #[arg(long)]
    output: PathBuf,
}

#[derive(ClapArgs)]
struct AnalyzeArgs {
    /// Model snapshot; a default model is trained when omitted
    #[arg(long)]
    model: Option<PathBuf>,
    /// JSON array of transactions
    #[arg(long)]
    input: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging()?;

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::Train(train) => run_train(&train, &config),
        Commands::Analyze(analyze) => run_analyze(&analyze, &config),
        Commands::Stats { input } => {
            let transactions = read_transactions(&input)?;
            print_json(&TransactionStatistics::from_transactions(&transactions)?)
        }
        Commands::Demo => print_json(&samples::demo_transactions()),
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<AnomalyDetectionConfig> {
    let mut config = match path {
        Some(path) => AnomalyDetectionConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AnomalyDetectionConfig::default(),
    };
    config.apply_env().context("Invalid environment override")?;
    Ok(config)
}

fn run_train(args: &TrainArgs, config: &AnomalyDetectionConfig) -> Result<()> {
    let transactions = match &args.input {
        Some(path) => read_transactions(path)?,
        None => samples::training_transactions(),
    };

    let detector = AnomalyDetector::train(&transactions, config)?;
    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    storage::save_detector(&detector, &args.output)?;

    info!(
        "Model trained on {} transactions, snapshot written to {}",
        transactions.len(),
        args.output.display()
    );
    Ok(())
}

fn run_analyze(args: &AnalyzeArgs, config: &AnomalyDetectionConfig) -> Result<()> {
    let records = read_records(&args.input)?;
    let limit = config.analysis.max_batch_size;
    if records.len() > limit {
        bail!(
            "Batch of {} transactions exceeds the maximum of {}",
            records.len(),
            limit
        );
    }

    let detector = match &args.model {
        Some(path) => storage::load_detector(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?,
        None => {
            info!("No model given, training default model on bundled data");
            AnomalyDetector::train(&samples::training_transactions(), config)?
        }
    };

    let report = BatchAnalyzer::new(config).analyze_records(&records, &detector)?;
    print_json(&report)
}

/// Read a JSON array of records without interpreting the rows
fn read_records(path: &Path) -> Result<Vec<Value>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let parsed: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON in {}", path.display()))?;
    match parsed {
        Value::Array(records) => Ok(records),
        _ => bail!("{} must contain a JSON array of transactions", path.display()),
    }
}

/// Read a batch where every row must parse
fn read_transactions(path: &Path) -> Result<Vec<Transaction>> {
    let transactions = read_records(path)?
        .iter()
        .enumerate()
        .map(|(index, record)| Transaction::from_json_value(record, index))
        .collect::<budget_anomaly::Result<Vec<_>>>()
        .with_context(|| format!("Invalid transaction in {}", path.display()))?;
    Ok(transactions)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
