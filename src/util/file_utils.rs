// External crates
use anyhow::{Context, Result};
use log::info;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

// Internal imports
use crate::util::error::{PianoRollError, PianoRollResult};
use crate::velocity::step_1_batch_generation::{NoteSequence, PianoRollDataset};
use crate::velocity::step_5_prediction::VelocityPrediction;

/// On-disk layout of a training dataset
#[derive(Debug, Serialize, Deserialize)]
pub struct DatasetFile {
    /// [sequence][timestep][INPUT_SIZE]
    pub inputs: Vec<Vec<Vec<f32>>>,
    /// [sequence][timestep][OUTPUT_SIZE], normalised to [0, 1]
    pub velocities: Vec<Vec<Vec<f32>>>,
}

/// On-disk layout of a prediction
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionFile {
    pub velocities: Vec<Vec<i32>>,
    pub highest: i32,
    pub lowest: i32,
}

/// Nested rows -> `[rows, width]` array, rejecting empty or ragged input
pub fn rows_to_array(rows: &[Vec<f32>], index: usize) -> PianoRollResult<Array2<f32>> {
    let width = match rows.first() {
        Some(first) => first.len(),
        None => return Err(PianoRollError::EmptySequence { index }),
    };
    if rows.iter().any(|row| row.len() != width) {
        return Err(PianoRollError::RaggedSequence { index });
    }

    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), width), flat)
        .map_err(|_| PianoRollError::RaggedSequence { index })
}

fn array_to_rows<T: Copy>(array: &Array2<T>) -> Vec<Vec<T>> {
    array.rows().into_iter().map(|row| row.to_vec()).collect()
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write {}", path.display()))
}

impl TryFrom<DatasetFile> for PianoRollDataset {
    type Error = PianoRollError;

    fn try_from(file: DatasetFile) -> PianoRollResult<Self> {
        let inputs = file
            .inputs
            .iter()
            .enumerate()
            .map(|(i, rows)| rows_to_array(rows, i))
            .collect::<PianoRollResult<Vec<_>>>()?;
        let velocities = file
            .velocities
            .iter()
            .enumerate()
            .map(|(i, rows)| rows_to_array(rows, i))
            .collect::<PianoRollResult<Vec<_>>>()?;

        PianoRollDataset::new(inputs, velocities)
    }
}

impl From<&PianoRollDataset> for DatasetFile {
    fn from(dataset: &PianoRollDataset) -> Self {
        Self {
            inputs: dataset.inputs.iter().map(array_to_rows).collect(),
            velocities: dataset.velocities.iter().map(array_to_rows).collect(),
        }
    }
}

/// Load and validate a JSON dataset
pub fn load_dataset(path: &Path) -> Result<PianoRollDataset> {
    let file: DatasetFile = read_json(path)?;
    let dataset = PianoRollDataset::try_from(file)
        .with_context(|| format!("Invalid dataset in {}", path.display()))?;
    info!("Loaded {} sequences from {}", dataset.len(), path.display());
    Ok(dataset)
}

pub fn save_dataset(dataset: &PianoRollDataset, path: &Path) -> Result<()> {
    write_json(&DatasetFile::from(dataset), path)
}

/// Load a seed: `[timesteps][INPUT_SIZE]` note states
pub fn load_seed(path: &Path) -> Result<NoteSequence> {
    let rows: Vec<Vec<f32>> = read_json(path)?;
    let seed = rows_to_array(&rows, 0)
        .with_context(|| format!("Invalid seed in {}", path.display()))?;
    Ok(seed)
}

pub fn save_seed(seed: &NoteSequence, path: &Path) -> Result<()> {
    write_json(&array_to_rows(seed), path)
}

pub fn save_prediction(prediction: &VelocityPrediction, path: &Path) -> Result<()> {
    let file = PredictionFile {
        velocities: array_to_rows(&prediction.velocities),
        highest: prediction.highest,
        lowest: prediction.lowest,
    };
    write_json(&file, path)?;
    info!("Prediction written to {}", path.display());
    Ok(())
}

pub fn load_prediction(path: &Path) -> Result<PredictionFile> {
    read_json(path)
}
