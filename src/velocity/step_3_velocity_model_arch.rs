// External imports
use burn::module::Module;
use burn::tensor::{backend::Backend, Tensor};
use serde::{Deserialize, Serialize};

// Internal imports
use super::step_2_lstm_cell::{BiLstmLayer, CellActivation};
use crate::constants::{DEFAULT_DROPOUT, INPUT_SIZE, NUM_LAYERS, OUTPUT_SIZE};

/// Hyperparameters for the velocity model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityModelConfig {
    /// Note states per timestep
    pub input_size: usize,
    /// Units per direction in every layer; also the number of predicted velocities
    pub hidden_size: usize,
    /// Fraction of each layer's input dropped during training
    pub dropout: f64,
}

impl Default for VelocityModelConfig {
    fn default() -> Self {
        Self {
            input_size: INPUT_SIZE,
            hidden_size: OUTPUT_SIZE,
            dropout: DEFAULT_DROPOUT,
        }
    }
}

impl VelocityModelConfig {
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Initialize a new velocity model on the given device
    pub fn init<B: Backend>(&self, device: &B::Device) -> VelocityModel<B> {
        VelocityModel::new(self.input_size, self.hidden_size, self.dropout, device)
    }
}

/// Three stacked bidirectional LSTM layers mapping note states to velocities
///
/// The first two layers use ReLU cells. The last uses tanh, so each direction
/// stays within [-1, 1] and the summed output within [-2, 2].
#[derive(Module, Debug)]
pub struct VelocityModel<B: Backend> {
    input_size: usize,
    hidden_size: usize,
    dropout: f64,
    layer1: BiLstmLayer<B>,
    layer2: BiLstmLayer<B>,
    layer3: BiLstmLayer<B>,
}

impl<B: Backend> VelocityModel<B> {
    pub fn new(input_size: usize, hidden_size: usize, dropout: f64, device: &B::Device) -> Self {
        let layer1 = BiLstmLayer::new(input_size, hidden_size, CellActivation::Relu, dropout, device);
        let layer2 = BiLstmLayer::new(hidden_size, hidden_size, CellActivation::Relu, dropout, device);
        let layer3 = BiLstmLayer::new(hidden_size, hidden_size, CellActivation::Tanh, dropout, device);

        Self {
            input_size,
            hidden_size,
            dropout,
            layer1,
            layer2,
            layer3,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn output_size(&self) -> usize {
        self.hidden_size
    }

    pub fn dropout(&self) -> f64 {
        self.dropout
    }

    pub fn num_layers(&self) -> usize {
        NUM_LAYERS
    }

    /// Forward pass: [batch, seq_len, input_size] -> [batch, seq_len, hidden_size]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.layer1.forward(x);
        let x = self.layer2.forward(x);
        self.layer3.forward(x)
    }

    /// Mean squared error over every batch element, timestep and note
    pub fn mse_loss(&self, pred: Tensor<B, 3>, target: Tensor<B, 3>) -> Tensor<B, 1> {
        let diff = pred - target;
        (diff.clone() * diff).mean()
    }

    /// Layer-by-layer description with parameter counts
    pub fn summary(&self) -> String {
        let layers = [&self.layer1, &self.layer2, &self.layer3];
        let mut lines = vec![format!(
            "{:<8} {:<28} {:<18} {:>10}",
            "Layer", "Type", "Output shape", "Params"
        )];
        let mut total = 0;

        for (idx, layer) in layers.iter().enumerate() {
            let params = layer.parameter_count();
            total += params;
            lines.push(format!(
                "{:<8} {:<28} {:<18} {:>10}",
                idx + 1,
                format!("BiLSTM[{:?}, sum]", layer.activation()),
                format!("(b, t, {})", layer.hidden_size()),
                params
            ));
        }
        lines.push(format!("Total params: {}", total));
        lines.join("\n")
    }
}
