use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use plantintel::{
    AnomalyThreshold, BackfillOptions, DocType, JsonBatchStore, PlantConfig, PlantIntelligence,
    QcReading, Record, DEFAULT_PERCENTILE,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "plantctl",
    about = "Quality prediction, QC anomaly scoring and knowledge-base answers for plant batches"
)]
struct Cli {
    /// YAML configuration file; built-in defaults when omitted
    #[arg(long, short = 'c', env = "PLANT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Predict QC pass/fail from process parameters
    Predict {
        /// JSON object of parameters, inline or a path to a file
        #[arg(long)]
        params: String,
    },
    /// Score the mean of a batch's QC readings
    ScoreQc {
        /// JSON array of readings, inline or a path to a file
        #[arg(long)]
        readings: String,

        /// Compare against this score instead of the model's own label
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Recompute the anomaly threshold from stored batch scores
    Threshold {
        /// JSON file holding the batch records
        #[arg(long)]
        batches: PathBuf,

        #[arg(long, default_value_t = DEFAULT_PERCENTILE)]
        percentile: f64,
    },
    /// Compute and store anomaly scores for existing batches
    Backfill {
        #[arg(long)]
        batches: PathBuf,

        /// Only process batches without an anomaly score
        #[arg(long, default_value_t = false)]
        only_missing: bool,

        /// Max number of batches to process
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Index every .txt file in a folder
    BuildIndex {
        folder: PathBuf,

        #[arg(long, default_value = "SOP")]
        doctype: DocType,
    },
    /// Answer a question from the knowledge base
    Ask {
        question: String,

        /// Batch whose summary is added as context (needs --batches)
        #[arg(long, requires = "batches")]
        batch_id: Option<u64>,

        #[arg(long)]
        batches: Option<PathBuf>,

        /// Number of chunks retrieved
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PlantConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PlantConfig::default(),
    };
    config.apply_env().context("applying environment overrides")?;
    init_tracing(&config);

    let intel = PlantIntelligence::from_config(&config)?;

    match cli.command {
        Command::Predict { params } => {
            let params: Record = read_json_arg(&params)?;
            print_json(&intel.predict_quality(&params)?)
        }
        Command::ScoreQc {
            readings,
            threshold,
        } => {
            let readings: Vec<QcReading> = read_json_arg(&readings)?;
            let threshold = threshold.map(AnomalyThreshold::fixed);
            print_json(&intel.score_qc(&readings, threshold.as_ref())?)
        }
        Command::Threshold {
            batches,
            percentile,
        } => {
            let store = JsonBatchStore::open(&batches)?;
            print_json(&intel.recompute_threshold(&store, percentile)?)
        }
        Command::Backfill {
            batches,
            only_missing,
            limit,
            threshold,
        } => {
            let store = JsonBatchStore::open(&batches)?;
            let options = BackfillOptions {
                only_missing,
                limit,
                threshold: threshold.map(AnomalyThreshold::fixed),
            };
            print_json(&intel.backfill_anomaly_scores(&store, &options)?)
        }
        Command::BuildIndex { folder, doctype } => {
            let indexed = intel.index_folder(&folder, doctype)?;
            for doc in &indexed {
                println!(
                    "Indexed {} ({} chunks)",
                    doc.document.title, doc.chunk_count
                );
            }
            Ok(())
        }
        Command::Ask {
            question,
            batch_id,
            batches,
            top_k,
        } => {
            if question.trim().is_empty() {
                bail!("question is required");
            }
            let answer = match (batch_id, batches) {
                (Some(id), Some(path)) => {
                    let store = JsonBatchStore::open(&path)?;
                    intel.answer_for_batch(&question, &store, id, top_k)?
                }
                _ => intel.answer_question(&question, None, top_k)?,
            };
            print_json(&answer)
        }
    }
}

fn init_tracing(config: &PlantConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Parse `arg` as inline JSON, or read it from the file it names.
fn read_json_arg<T: serde::de::DeserializeOwned>(arg: &str) -> Result<T> {
    let trimmed = arg.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("parsing inline JSON");
    }
    let path = Path::new(arg);
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
