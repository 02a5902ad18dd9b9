use anyhow::Result;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::velocity::step_4_train_model::{EvaluationMetrics, TrainingConfig};

/// Record of one training run, written as JSON next to the models
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainingReport {
    pub timestamp: String,
    pub model_name: String,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub config: TrainingConfig,
    pub train_sequences: usize,
    pub test_sequences: usize,
    pub loss_history: Vec<f64>,
    pub test_loss: Option<f64>,
    pub test_mse: Option<f64>,
    pub training_time_seconds: Option<f64>,
    pub notes: String,
}

impl TrainingReport {
    pub fn new(
        model_name: &str,
        hidden_size: usize,
        num_layers: usize,
        config: &TrainingConfig,
        train_sequences: usize,
        test_sequences: usize,
    ) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            model_name: model_name.to_string(),
            hidden_size,
            num_layers,
            config: config.clone(),
            train_sequences,
            test_sequences,
            loss_history: Vec::new(),
            test_loss: None,
            test_mse: None,
            training_time_seconds: None,
            notes: String::new(),
        }
    }

    pub fn set_loss_history(&mut self, history: &[f64]) {
        self.loss_history = history.to_vec();
    }

    pub fn set_metrics(&mut self, metrics: &EvaluationMetrics) {
        self.test_loss = Some(metrics.loss);
        self.test_mse = Some(metrics.mse);
    }

    pub fn set_training_time(&mut self, seconds: f64) {
        self.training_time_seconds = Some(seconds);
    }

    pub fn add_note(&mut self, note: &str) {
        if !self.notes.is_empty() {
            self.notes.push('\n');
        }
        self.notes.push_str(note);
    }

    /// File name encodes the model name, hidden size and dropout percentage
    pub fn file_name(&self) -> String {
        format!(
            "{}_h{}_d{}_report.json",
            self.model_name,
            self.hidden_size,
            (self.config.dropout * 100.0).round() as i32,
        )
    }

    pub fn save(&self, report_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(report_dir)?;

        let file_path = report_dir.join(self.file_name());

        let json = serde_json::to_string_pretty(&self)?;
        let mut file = fs::File::create(&file_path)?;
        file.write_all(json.as_bytes())?;

        Ok(file_path)
    }
}

/// Timestamped directory for this run's reports
pub fn create_report_dir(base: &Path) -> Result<PathBuf> {
    let dir = base.join(Local::now().format("%Y%m%d_%H%M%S").to_string());
    fs::create_dir_all(&dir)?;
    Ok(dir)
}
