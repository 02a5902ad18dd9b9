// External imports
use anyhow::{Context, Result};
use burn::grad_clipping::GradientClippingConfig;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::cast::ToElement;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// Internal imports
use super::step_1_batch_generation::{
    batch_to_tensors, pad_dataset, BatchGenerator, PianoRollDataset,
};
use super::step_3_velocity_model_arch::{VelocityModel, VelocityModelConfig};
use crate::constants;
use crate::util::error::{PianoRollError, PianoRollResult};
use crate::util::model_utils;

/// Configuration for training the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    /// Gradients are rescaled when their global L2 norm exceeds this
    pub clip_norm: f32,
    pub batch_size: usize,
    pub epochs: usize,
    pub test_split: f64,
    pub dropout: f64,
    pub seed: u64,
    /// Save a checkpoint every N epochs; 0 disables checkpoints
    pub checkpoint_epochs: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: constants::DEFAULT_LEARNING_RATE,
            clip_norm: constants::DEFAULT_CLIP_NORM,
            batch_size: constants::DEFAULT_BATCH_SIZE,
            epochs: constants::DEFAULT_EPOCHS,
            test_split: constants::VALIDATION_SPLIT_RATIO,
            dropout: constants::DEFAULT_DROPOUT,
            seed: constants::DEFAULT_SEED,
            checkpoint_epochs: 0,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> PianoRollResult<()> {
        if self.batch_size == 0 {
            return Err(PianoRollError::InvalidBatchSize);
        }
        if !(0.0..1.0).contains(&self.test_split) {
            return Err(PianoRollError::InvalidSplit(self.test_split));
        }
        Ok(())
    }

    pub fn model_config(&self) -> VelocityModelConfig {
        VelocityModelConfig::default().with_dropout(self.dropout)
    }
}

/// Mean loss and metric over the evaluated batches
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub loss: f64,
    pub mse: f64,
}

/// Everything produced by a full train / save / evaluate run
pub struct TrainingOutcome<B: AutodiffBackend> {
    pub model: VelocityModel<B>,
    pub loss_history: Vec<f64>,
    pub metrics: EvaluationMetrics,
    pub saved_path: Option<PathBuf>,
}

/// Train the velocity model
///
/// Each epoch draws `ceil(n / batch_size)` batches from a generator that keeps
/// cycling across epochs. Returns the trained model and the mean training loss
/// of every epoch.
pub fn train_model<B: AutodiffBackend>(
    train: &PianoRollDataset,
    config: &TrainingConfig,
    device: &B::Device,
    checkpoint_to: Option<(&Path, &str)>,
) -> Result<(VelocityModel<B>, Vec<f64>)> {
    config.validate()?;
    B::seed(config.seed);

    info!("Setting up model ...");
    let mut model: VelocityModel<B> = config.model_config().init(device);
    info!("\n{}", model.summary());

    let mut optimizer = AdamConfig::new()
        .with_grad_clipping(Some(GradientClippingConfig::Norm(config.clip_norm)))
        .init();

    let mut generator = BatchGenerator::new(train, config.batch_size)?;
    let steps_per_epoch = generator.steps_per_epoch();

    info!(
        "Training model on {} sequences ({} batches per epoch) ...",
        train.len(),
        steps_per_epoch
    );

    let mut loss_history = Vec::with_capacity(config.epochs);
    for epoch in 1..=config.epochs {
        let mut epoch_loss = 0.0;

        for (x, y) in generator.by_ref().take(steps_per_epoch) {
            let batch = batch_to_tensors::<B>(&x, &y, device);

            let predictions = model.forward(batch.inputs);
            let loss_tensor = model.mse_loss(predictions, batch.targets);
            let loss = loss_tensor.clone().into_scalar().to_f64();
            debug!("Epoch {} batch loss: {:.6}", epoch, loss);
            epoch_loss += loss;

            let grads = GradientsParams::from_grads(loss_tensor.backward(), &model);
            model = optimizer.step(config.learning_rate, model, grads);
        }

        let avg_loss = epoch_loss / steps_per_epoch as f64;
        if !avg_loss.is_finite() {
            warn!("Epoch {} produced a non-finite loss", epoch);
        }
        info!("Epoch {}/{} - loss: {:.6}", epoch, config.epochs, avg_loss);
        loss_history.push(avg_loss);

        if let Some((model_dir, model_name)) = checkpoint_to {
            if config.checkpoint_epochs > 0 && epoch % config.checkpoint_epochs == 0 {
                model_utils::save_model_checkpoint(&model, model_dir, model_name, epoch)
                    .with_context(|| format!("Failed to save checkpoint for epoch {}", epoch))?;
            }
        }
    }

    Ok((model, loss_history))
}

/// Evaluate the model on held-out data
///
/// The whole set is padded to its longest sequence before batching, so every
/// batch shares the same length.
pub fn evaluate_model<B: Backend>(
    model: &VelocityModel<B>,
    test: &PianoRollDataset,
    batch_size: usize,
    device: &B::Device,
) -> Result<EvaluationMetrics> {
    // Return zero for empty test set
    if test.is_empty() {
        warn!("Test set is empty, skipping evaluation");
        return Ok(EvaluationMetrics { loss: 0.0, mse: 0.0 });
    }

    debug!(
        "Evaluating {} sequences padded to {} timesteps",
        test.len(),
        test.max_timesteps()
    );
    let padded = pad_dataset(test)?;
    let generator = BatchGenerator::new(&padded, batch_size)?;
    let steps = generator.steps_per_epoch();

    let mut total = 0.0;
    for (x, y) in generator.take(steps) {
        let batch = batch_to_tensors::<B>(&x, &y, device);
        let predictions = model.forward(batch.inputs);
        total += model
            .mse_loss(predictions, batch.targets)
            .into_scalar()
            .to_f64();
    }

    let mse = total / steps as f64;
    Ok(EvaluationMetrics { loss: mse, mse })
}

/// Train, optionally save, then evaluate on the test split
pub fn create_model<B: AutodiffBackend>(
    train: &PianoRollDataset,
    test: &PianoRollDataset,
    config: &TrainingConfig,
    device: &B::Device,
    save_to: Option<(&Path, &str)>,
) -> Result<TrainingOutcome<B>> {
    let (model, loss_history) =
        train_model::<B>(train, config, device, save_to).context("Training failed")?;

    let saved_path = match save_to {
        Some((model_dir, model_name)) => {
            info!("Saving model ...");
            Some(model_utils::save_trained_model(&model, model_dir, model_name)?)
        }
        None => None,
    };

    let metrics = evaluate_model(&model.valid(), test, config.batch_size, device)
        .context("Evaluation failed")?;
    info!(
        "Loss and metrics: loss={:.6} mse={:.6}",
        metrics.loss, metrics.mse
    );

    Ok(TrainingOutcome {
        model,
        loss_history,
        metrics,
        saved_path,
    })
}
