// External imports
use anyhow::{anyhow, Context, Result};
use burn::tensor::backend::Backend;
use log::info;
use ndarray::Array2;
use std::path::Path;

// Internal imports
use super::step_1_batch_generation::{sequence_to_tensor, NoteSequence};
use super::step_3_velocity_model_arch::VelocityModel;
use crate::constants::MAX_MIDI_VELOCITY;
use crate::util::error::PianoRollError;
use crate::util::file_utils;

/// Forecast velocities for a seed, in MIDI units
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityPrediction {
    /// Shape [timesteps, OUTPUT_SIZE], values in 0..=127
    pub velocities: Array2<i32>,
    pub highest: i32,
    pub lowest: i32,
}

/// Model output -> MIDI velocity: scale by 127, truncate toward zero, clamp
pub fn to_midi_velocity(value: f32) -> i32 {
    ((value * MAX_MIDI_VELOCITY as f32) as i32).clamp(0, MAX_MIDI_VELOCITY)
}

/// Raw model output for a single seed: [timesteps, OUTPUT_SIZE]
///
/// Pass an inference model (e.g. `model.valid()`) so dropout stays inactive.
pub fn predict_raw<B: Backend>(
    model: &VelocityModel<B>,
    seed: &NoteSequence,
    device: &B::Device,
) -> Result<Array2<f32>> {
    if seed.nrows() == 0 {
        return Err(PianoRollError::EmptySequence { index: 0 }.into());
    }
    if seed.ncols() != model.input_size() {
        return Err(PianoRollError::WidthMismatch {
            index: 0,
            expected: model.input_size(),
            actual: seed.ncols(),
        }
        .into());
    }

    let input = sequence_to_tensor::<B>(seed, device);
    let output = model.forward(input);
    let [_, timesteps, notes] = output.dims();

    let values = output
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("Failed to read prediction tensor: {:?}", e))?;

    Array2::from_shape_vec((timesteps, notes), values).context("Prediction has unexpected shape")
}

/// Predict MIDI velocities from a seed of note states
pub fn predict_velocities<B: Backend>(
    model: &VelocityModel<B>,
    seed: &NoteSequence,
    device: &B::Device,
) -> Result<VelocityPrediction> {
    info!("Predicting ...");

    let raw = predict_raw(model, seed, device)?;
    let velocities = raw.mapv(to_midi_velocity);

    let highest = velocities.iter().copied().max().unwrap_or(0);
    let lowest = velocities.iter().copied().min().unwrap_or(0);

    info!("Highest predicted velocity: {}", highest);
    info!("Lowest predicted velocity: {}", lowest);

    Ok(VelocityPrediction {
        velocities,
        highest,
        lowest,
    })
}

/// Load a seed file and predict from it
pub fn predict_from_file<B: Backend>(
    model: &VelocityModel<B>,
    seed_path: &Path,
    device: &B::Device,
) -> Result<VelocityPrediction> {
    let seed = file_utils::load_seed(seed_path)?;
    predict_velocities(model, &seed, device)
}
