// External imports
use burn::module::{Ignored, Module, Param};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::tensor::{activation, backend::Backend, Tensor};
use serde::{Deserialize, Serialize};

// Gate activation: max(0, min(1, 0.2 * x + 0.5))
const GATE_SLOPE: f64 = 0.2;
const GATE_OFFSET: f64 = 0.5;

fn gate_activation<B: Backend>(x: Tensor<B, 2>) -> Tensor<B, 2> {
    activation::hard_sigmoid(x, GATE_SLOPE, GATE_OFFSET)
}

/// Activation applied to the cell candidate and to the cell state on output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellActivation {
    Relu,
    Tanh,
}

impl CellActivation {
    pub fn apply<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            CellActivation::Relu => activation::relu(x),
            CellActivation::Tanh => activation::tanh(x),
        }
    }
}

/// Weights for one direction of a bidirectional LSTM layer
#[derive(Module, Debug)]
pub struct LstmDirection<B: Backend> {
    // input, forget, cell, output gates combined
    input_weights: Linear<B>,
    hidden_weights: Linear<B>,
}

impl<B: Backend> LstmDirection<B> {
    fn new(input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        let gate_size = 4 * hidden_size;

        // The input projection carries the only bias: zero, except ones on the forget gate
        let mut input_weights = LinearConfig::new(input_size, gate_size).init(device);
        let bias = Tensor::cat(
            vec![
                Tensor::zeros([hidden_size], device),
                Tensor::ones([hidden_size], device),
                Tensor::zeros([2 * hidden_size], device),
            ],
            0,
        );
        input_weights.bias = Some(Param::from_tensor(bias));

        Self {
            input_weights,
            hidden_weights: LinearConfig::new(hidden_size, gate_size)
                .with_bias(false)
                .init(device),
        }
    }

    /// Gate bias in i, f, g, o order
    pub fn gate_bias(&self) -> Option<Tensor<B, 1>> {
        self.input_weights.bias.as_ref().map(|bias| bias.val())
    }

    fn num_params(&self) -> usize {
        self.input_weights.num_params() + self.hidden_weights.num_params()
    }
}

/// Bidirectional LSTM layer whose two directions are merged by summation
///
/// Input `[batch, seq_len, input_size]`, output `[batch, seq_len, hidden_size]`.
/// Dropout masks the layer input once per sequence and direction, so every
/// timestep of a sample sees the same dropped features.
#[derive(Module, Debug)]
pub struct BiLstmLayer<B: Backend> {
    input_size: usize,
    hidden_size: usize,
    activation: Ignored<CellActivation>,
    forward_direction: LstmDirection<B>,
    backward_direction: LstmDirection<B>,
    dropout: Dropout,
}

impl<B: Backend> BiLstmLayer<B> {
    pub fn new(
        input_size: usize,
        hidden_size: usize,
        activation: CellActivation,
        dropout: f64,
        device: &B::Device,
    ) -> Self {
        Self {
            input_size,
            hidden_size,
            activation: Ignored(activation),
            forward_direction: LstmDirection::new(input_size, hidden_size, device),
            backward_direction: LstmDirection::new(input_size, hidden_size, device),
            dropout: DropoutConfig::new(dropout).init(),
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn activation(&self) -> CellActivation {
        self.activation.0
    }

    pub fn forward_direction(&self) -> &LstmDirection<B> {
        &self.forward_direction
    }

    pub fn backward_direction(&self) -> &LstmDirection<B> {
        &self.backward_direction
    }

    /// Trainable parameter count across both directions
    pub fn parameter_count(&self) -> usize {
        self.forward_direction.num_params() + self.backward_direction.num_params()
    }

    /// Inverted-dropout mask of shape [batch, 1, input_size]; all ones at inference
    fn input_mask(&self, batch_size: usize, device: &B::Device) -> Tensor<B, 3> {
        self.dropout
            .forward(Tensor::ones([batch_size, 1, self.input_size], device))
    }

    fn process_direction(
        &self,
        weights: &LstmDirection<B>,
        x: Tensor<B, 3>,
        reverse: bool,
    ) -> Tensor<B, 3> {
        let device = x.device();
        let [batch_size, seq_len, _] = x.dims();

        let x = x * self.input_mask(batch_size, &device);

        // Project every timestep at once: [batch, seq_len, 4 * hidden]
        let projected = weights.input_weights.forward(x);

        let mut h = Tensor::zeros([batch_size, self.hidden_size], &device);
        let mut c = Tensor::zeros([batch_size, self.hidden_size], &device);
        let mut outputs = Vec::with_capacity(seq_len);

        for t in 0..seq_len {
            let time_idx = if reverse { seq_len - 1 - t } else { t };
            let x_t = projected
                .clone()
                .narrow(1, time_idx, 1)
                .reshape([batch_size, 4 * self.hidden_size]);

            let gates = x_t + weights.hidden_weights.forward(h);
            let gate = |idx: usize| gates.clone().narrow(1, idx * self.hidden_size, self.hidden_size);

            let i = gate_activation(gate(0));
            let f = gate_activation(gate(1));
            let g = self.activation.0.apply(gate(2));
            let o = gate_activation(gate(3));

            c = f * c + i * g;
            h = o * self.activation.0.apply(c.clone());

            outputs.push(h.clone());
        }

        // Put the backward pass back into chronological order
        if reverse {
            outputs.reverse();
        }

        Tensor::stack(outputs, 1)
    }

    /// Forward pass through both directions, summed per timestep
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let forward_output = self.process_direction(&self.forward_direction, x.clone(), false);
        let backward_output = self.process_direction(&self.backward_direction, x, true);

        forward_output + backward_output
    }
}
