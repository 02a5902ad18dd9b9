use anyhow::{Context, Result};
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::step_3_velocity_model_arch::VelocityModel;
use crate::built_info;
use crate::constants::MERGE_MODE;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelMetadata {
    pub version: String,
    pub timestamp: u64,
    pub input_size: usize,
    pub hidden_size: usize,
    pub output_size: usize,
    pub num_layers: usize,
    pub bidirectional: bool,
    pub merge_mode: String,
    pub dropout: f64,
    pub rustc_version: String,
}

impl ModelMetadata {
    pub fn new(input_size: usize, hidden_size: usize, num_layers: usize, dropout: f64) -> Self {
        Self {
            version: built_info::PKG_VERSION.to_string(),
            timestamp: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            input_size,
            hidden_size,
            output_size: hidden_size,
            num_layers,
            bidirectional: true,
            merge_mode: MERGE_MODE.to_string(),
            dropout,
            rustc_version: built_info::RUSTC_VERSION.to_string(),
        }
    }

    /// Metadata describing an existing model's architecture
    pub fn for_model<B: Backend>(model: &VelocityModel<B>) -> Self {
        Self::new(
            model.input_size(),
            model.hidden_size(),
            model.num_layers(),
            model.dropout(),
        )
    }
}

/// `<stem>.<suffix>`, appended so dots already in the stem survive
fn artifact_path(stem: &Path, suffix: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Weights file for a model path stem
pub fn model_file_path(stem: impl AsRef<Path>) -> PathBuf {
    artifact_path(stem.as_ref(), "bin")
}

/// Metadata file for a model path stem
pub fn metadata_file_path(stem: impl AsRef<Path>) -> PathBuf {
    artifact_path(stem.as_ref(), "meta.json")
}

/// Save the model with metadata to a file
pub fn save_model_with_metadata<B: Backend>(
    model: &VelocityModel<B>,
    metadata: &ModelMetadata,
    path: impl AsRef<Path>,
) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent).context("Failed to create model parent directory")?;
    }
    // Save model artifact
    let model_path = model_file_path(&path);
    model
        .clone()
        .save_file::<BinFileRecorder<FullPrecisionSettings>, _>(&model_path, &Default::default())
        .context("Failed to save model")?;
    // Save metadata
    let metadata_path = metadata_file_path(&path);
    let metadata_json =
        serde_json::to_string_pretty(metadata).context("Failed to serialize metadata")?;
    std::fs::write(&metadata_path, metadata_json).context("Failed to write metadata file")?;

    info!("Model saved to {}", model_path.display());
    Ok(())
}

/// Read only the metadata written next to a model
pub fn load_metadata(path: impl AsRef<Path>) -> Result<ModelMetadata> {
    let metadata_path = metadata_file_path(&path);
    let metadata_json =
        std::fs::read_to_string(&metadata_path).context("Failed to read metadata file")?;
    serde_json::from_str(&metadata_json).context("Failed to parse metadata")
}

/// Load the model and its metadata from a file
pub fn load_model_with_metadata<B: Backend>(
    path: impl AsRef<Path>,
    device: &B::Device,
) -> Result<(VelocityModel<B>, ModelMetadata)> {
    // Load metadata first
    let metadata = load_metadata(&path)?;
    if metadata.version != built_info::PKG_VERSION {
        log::warn!(
            "Model was saved by version {}, running {}",
            metadata.version,
            built_info::PKG_VERSION
        );
    }
    // Now use metadata to construct the skeleton the weights load into
    let model_path = model_file_path(&path);
    let skeleton = VelocityModel::new(
        metadata.input_size,
        metadata.hidden_size,
        metadata.dropout,
        device,
    );
    let model = skeleton
        .load_file::<BinFileRecorder<FullPrecisionSettings>, _>(
            &model_path,
            &Default::default(),
            device,
        )
        .context("Failed to load model")?;

    info!("Model loaded from {}", model_path.display());
    Ok((model, metadata))
}

/// Check if a model file exists and is valid
pub fn verify_model(path: impl AsRef<Path>) -> Result<bool> {
    let model_path = model_file_path(&path);
    let metadata_path = metadata_file_path(&path);

    // Check if both files exist
    if !model_path.exists() || !metadata_path.exists() {
        return Ok(false);
    }

    // Try to read metadata to verify it's valid
    load_metadata(path)?;

    Ok(true)
}
