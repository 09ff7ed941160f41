//! mlplatform CLI: compile and run the training and batch inference
//! pipelines, run single stages, and serve deployed endpoints.

mod commands;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Train, deploy, and batch-score tabular classifiers
#[derive(Parser, Debug)]
#[command(name = "mlplatform", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (searched for mlplatform.toml)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PipelineKind {
    Training,
    Inference,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum AlgorithmArg {
    DecisionTree,
    RandomForest,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum TieBreakArg {
    First,
    Last,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Write both pipeline definitions as JSON
    Compile {
        /// Output directory
        #[arg(short, long, default_value = "pipelines")]
        output: PathBuf,
    },
    /// Run a pipeline locally, task by task
    Run {
        #[arg(value_enum)]
        pipeline: Option<PipelineKind>,
        /// Run a compiled pipeline file instead of a built-in one
        #[arg(long, conflicts_with = "pipeline")]
        spec: Option<PathBuf>,
    },
    /// Copy a CSV object from storage into a dataset file
    Load {
        /// Source locator (defaults to GCS_URL)
        #[arg(long)]
        gcs_url: Option<String>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Clean a dataset and split it into train and test files
    Preprocess {
        #[arg(long)]
        input: PathBuf,
        /// Fraction of rows for training (defaults to TRAIN_RATIO)
        #[arg(long)]
        train_ratio: Option<f64>,
        /// Split seed (defaults to SPLIT_SEED)
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        train_output: PathBuf,
        #[arg(long)]
        test_output: PathBuf,
    },
    /// Search hyperparameters and persist the best model
    Train {
        #[arg(value_enum)]
        algorithm: AlgorithmArg,
        #[arg(long)]
        train: PathBuf,
        /// Model artifact path; the model file gets a `.model.json` suffix
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 20)]
        n_iter: usize,
        #[arg(long, default_value_t = 5)]
        cv: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Score candidate models on a test set and print the winner
    Evaluate {
        #[arg(long)]
        test: PathBuf,
        /// Candidate as `<id>=<model artifact path>`, in comparison order
        #[arg(long = "candidate", required = true)]
        candidates: Vec<String>,
        #[arg(long, value_enum, default_value = "first")]
        tie_break: TieBreakArg,
    },
    /// Register a candidate and deploy it to a new endpoint
    Deploy {
        #[arg(long)]
        optimal_model: String,
        /// Candidate as `<id>=<model artifact path>`
        #[arg(long = "candidate", required = true)]
        candidates: Vec<String>,
        /// Serving container (defaults to SERVING_IMAGE)
        #[arg(long)]
        serving_image: Option<String>,
    },
    /// Score a random sample of rows and append predictions to a table
    BatchPredict {
        #[arg(long)]
        model_gcs_path: String,
        #[arg(long)]
        input_data_gcs_path: String,
        #[arg(long)]
        table_ref: String,
        #[arg(long)]
        project: String,
        /// Column dropped before scoring; the last column when omitted
        #[arg(long)]
        target_column: Option<String>,
        /// Rows to sample (defaults to BATCH_SAMPLE_SIZE)
        #[arg(long)]
        sample_size: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Serve the model deployed on an endpoint over HTTP
    Serve {
        /// Endpoint id or resource name
        #[arg(long)]
        endpoint: String,
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "mlplatform", "mlplatform")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "mlplatform.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_predict_requires_core_flags() {
        let err = Cli::try_parse_from(["mlplatform", "batch-predict", "--project", "p"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let cli = Cli::try_parse_from([
            "mlplatform",
            "batch-predict",
            "--model-gcs-path",
            "gs://m/model.json",
            "--input-data-gcs-path",
            "gs://d/data.csv",
            "--table-ref",
            "p.d.t",
            "--project",
            "p",
            "--sample-size",
            "10",
        ])
        .unwrap();
        match cli.command {
            Commands::BatchPredict {
                sample_size,
                target_column,
                seed,
                ..
            } => {
                assert_eq!(sample_size, Some(10));
                assert_eq!(target_column, None);
                assert_eq!(seed, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_run_takes_pipeline_or_spec() {
        let cli = Cli::try_parse_from(["mlplatform", "-v", "run", "training"]).unwrap();
        assert_eq!(cli.verbose, 1);
        assert!(matches!(
            cli.command,
            Commands::Run {
                pipeline: Some(PipelineKind::Training),
                spec: None
            }
        ));
        assert!(Cli::try_parse_from(["mlplatform", "run", "training", "--spec", "x.json"]).is_err());
    }

    #[test]
    fn test_train_defaults() {
        let cli = Cli::try_parse_from([
            "mlplatform",
            "train",
            "random-forest",
            "--train",
            "train.csv",
            "--output",
            "model",
        ])
        .unwrap();
        match cli.command {
            Commands::Train {
                algorithm,
                n_iter,
                cv,
                ..
            } => {
                assert_eq!(algorithm, AlgorithmArg::RandomForest);
                assert_eq!((n_iter, cv), (20, 5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
