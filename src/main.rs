//! piano-roll-velocity CLI
//!
//! Train the velocity model on a piano-roll dataset, evaluate a saved model,
//! or forecast velocities from a seed.

// External crates
use anyhow::{Context, Result};
use burn_autodiff::Autodiff;
use burn_ndarray::{NdArray, NdArrayDevice};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;
use std::path::{Path, PathBuf};
use std::time::Instant;

// Local crate
use piano_roll_velocity::constants;
use piano_roll_velocity::util::model_logger::{self, TrainingReport};
use piano_roll_velocity::util::file_utils;
use piano_roll_velocity::velocity::step_1_batch_generation::train_test_split;
use piano_roll_velocity::velocity::step_4_train_model::{self, TrainingConfig};
use piano_roll_velocity::velocity::{step_5_prediction, step_6_model_serialization};

type TrainBackend = Autodiff<NdArray<f32>>;
type InferenceBackend = NdArray<f32>;

/// Piano-roll velocity forecasting with stacked bidirectional LSTMs
#[derive(Parser, Debug)]
#[command(name = "piano-roll-velocity")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a model, evaluate it on a held-out split and optionally save it
    Train {
        /// JSON dataset with `inputs` and `velocities`
        #[arg(short, long)]
        dataset: PathBuf,

        /// JSON training configuration; missing fields use defaults
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory for models and checkpoints
        #[arg(long, default_value = constants::MODEL_PATH)]
        model_dir: PathBuf,

        /// Model file stem inside the model directory
        #[arg(long, default_value = constants::MODEL_FILE_NAME)]
        name: String,

        /// Directory for training reports
        #[arg(long, default_value = constants::REPORT_PATH)]
        report_dir: PathBuf,

        #[arg(long)]
        epochs: Option<usize>,

        #[arg(long)]
        batch_size: Option<usize>,

        /// Persist the trained model
        #[arg(long)]
        save: bool,
    },

    /// Evaluate a saved model on a dataset
    Evaluate {
        /// Model path stem (without `.bin` / `.meta.json`)
        #[arg(short, long)]
        model: PathBuf,

        #[arg(short, long)]
        dataset: PathBuf,

        #[arg(long, default_value_t = constants::DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },

    /// Forecast velocities from a seed of note states
    Predict {
        /// Model path stem (without `.bin` / `.meta.json`)
        #[arg(short, long)]
        model: PathBuf,

        /// JSON seed: `[timesteps][176]`
        #[arg(short, long)]
        seed: PathBuf,

        /// Where to write the prediction JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    info!("piano-roll-velocity v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Train {
            dataset,
            config,
            model_dir,
            name,
            report_dir,
            epochs,
            batch_size,
            save,
        } => {
            let mut training_config = match config {
                Some(path) => load_config(&path)?,
                None => TrainingConfig::default(),
            };
            if let Some(epochs) = epochs {
                training_config.epochs = epochs;
            }
            if let Some(batch_size) = batch_size {
                training_config.batch_size = batch_size;
            }
            train(&dataset, training_config, &model_dir, &name, &report_dir, save)
        }
        Commands::Evaluate {
            model,
            dataset,
            batch_size,
        } => evaluate(&model, &dataset, batch_size),
        Commands::Predict {
            model,
            seed,
            output,
        } => predict(&model, &seed, output.as_deref()),
    }
}

fn load_config(path: &Path) -> Result<TrainingConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse config {}", path.display()))
}

fn train(
    dataset_path: &Path,
    config: TrainingConfig,
    model_dir: &Path,
    model_name: &str,
    report_dir: &Path,
    save: bool,
) -> Result<()> {
    let device = NdArrayDevice::default();

    let dataset = file_utils::load_dataset(dataset_path)?;
    let (train_set, test_set) = train_test_split(&dataset, config.test_split, config.seed)?;
    info!(
        "Training dataset size: {} sequences, testing dataset size: {} sequences",
        train_set.len(),
        test_set.len()
    );

    let save_to = save.then_some((model_dir, model_name));
    let started = Instant::now();
    let outcome = step_4_train_model::create_model::<TrainBackend>(
        &train_set, &test_set, &config, &device, save_to,
    )?;

    let model = &outcome.model;
    let mut report = TrainingReport::new(
        model_name,
        model.hidden_size(),
        model.num_layers(),
        &config,
        train_set.len(),
        test_set.len(),
    );
    report.set_loss_history(&outcome.loss_history);
    report.set_metrics(&outcome.metrics);
    report.set_training_time(started.elapsed().as_secs_f64());
    if let Some(path) = &outcome.saved_path {
        report.add_note(&format!("saved to {}", path.display()));
    }
    let run_dir = model_logger::create_report_dir(report_dir)?;
    let report_path = report.save(&run_dir)?;
    info!("Training report written to {}", report_path.display());

    Ok(())
}

fn evaluate(model_path: &Path, dataset_path: &Path, batch_size: usize) -> Result<()> {
    let device = NdArrayDevice::default();

    let (model, _metadata) =
        step_6_model_serialization::load_model_with_metadata::<InferenceBackend>(model_path, &device)?;
    let dataset = file_utils::load_dataset(dataset_path)?;

    let metrics = step_4_train_model::evaluate_model(&model, &dataset, batch_size, &device)?;
    info!(
        "Loss and metrics: loss={:.6} mse={:.6}",
        metrics.loss, metrics.mse
    );
    Ok(())
}

fn predict(model_path: &Path, seed_path: &Path, output: Option<&Path>) -> Result<()> {
    let device = NdArrayDevice::default();

    if !step_6_model_serialization::verify_model(model_path)? {
        anyhow::bail!("No saved model at {}", model_path.display());
    }
    let (model, _metadata) =
        step_6_model_serialization::load_model_with_metadata::<InferenceBackend>(model_path, &device)?;

    let prediction = step_5_prediction::predict_from_file(&model, seed_path, &device)?;

    if let Some(output) = output {
        file_utils::save_prediction(&prediction, output)?;
    }
    Ok(())
}
