use anyhow::{Context, Result};
use burn::prelude::Backend;
use log::info;
use std::path::{Path, PathBuf};

use crate::velocity::step_3_velocity_model_arch::VelocityModel;
use crate::velocity::step_6_model_serialization::{
    load_metadata, load_model_with_metadata, save_model_with_metadata, ModelMetadata,
};

/// Path stem (no extension) of a named model inside `model_dir`
pub fn get_model_path(model_dir: &Path, model_name: &str) -> PathBuf {
    model_dir.join(model_name)
}

/// Save a trained model with its configuration under `model_dir`
pub fn save_trained_model<B: Backend>(
    model: &VelocityModel<B>,
    model_dir: &Path,
    model_name: &str,
) -> Result<PathBuf> {
    std::fs::create_dir_all(model_dir).context("Failed to create models directory")?;

    let model_path = get_model_path(model_dir, model_name);
    let metadata = ModelMetadata::for_model(model);

    save_model_with_metadata(model, &metadata, &model_path).context("Failed to save model")?;

    info!("Model saved successfully to: {}", model_path.display());
    Ok(model_path)
}

/// Load a trained model with its configuration from `model_dir`
pub fn load_trained_model<B: Backend>(
    model_dir: &Path,
    model_name: &str,
    device: &B::Device,
) -> Result<(VelocityModel<B>, ModelMetadata)> {
    let model_path = get_model_path(model_dir, model_name);
    info!("Loading model from: {}", model_path.display());
    load_model_with_metadata(&model_path, device).context("Failed to load model")
}

/// Save a model checkpoint during training
pub fn save_model_checkpoint<B: Backend>(
    model: &VelocityModel<B>,
    model_dir: &Path,
    model_name: &str,
    epoch: usize,
) -> Result<PathBuf> {
    let checkpoint_name = format!("{}_epoch_{}", model_name, epoch);
    save_trained_model(model, model_dir, &checkpoint_name)
}

/// True when a saved model exists and was written by `current_version`
pub fn is_model_version_current(model_path: &Path, current_version: &str) -> bool {
    match load_metadata(model_path) {
        Ok(metadata) => metadata.version == current_version,
        Err(_) => false,
    }
}
