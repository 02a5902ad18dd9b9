use burn::tensor::{Distribution, Tensor, TensorData};

use crate::constants::{INPUT_SIZE, OUTPUT_SIZE};
use crate::test::fixtures::{TestAutodiffBackend, TestBackend};
use crate::velocity::step_2_lstm_cell::{BiLstmLayer, CellActivation};
use crate::velocity::step_3_velocity_model_arch::{VelocityModel, VelocityModelConfig};

fn to_vec(tensor: Tensor<TestBackend, 3>) -> Vec<f32> {
    tensor.into_data().to_vec::<f32>().unwrap()
}

#[test]
fn test_bilstm_layer_output_shape() {
    let device = Default::default();
    let layer = BiLstmLayer::<TestBackend>::new(6, 5, CellActivation::Tanh, 0.0, &device);

    let x = Tensor::<TestBackend, 3>::random([2, 4, 6], Distribution::Default, &device);
    let output = layer.forward(x);

    assert_eq!(output.dims(), [2, 4, 5]);
}

#[test]
fn test_bilstm_layer_parameter_count() {
    let device = Default::default();
    let layer = BiLstmLayer::<TestBackend>::new(6, 5, CellActivation::Relu, 0.0, &device);

    // Per direction: input projection 6x20 + bias 20, recurrent projection 5x20
    assert_eq!(layer.parameter_count(), 2 * (6 * 20 + 20 + 5 * 20));
    assert_eq!(layer.input_size(), 6);
    assert_eq!(layer.hidden_size(), 5);
    assert_eq!(layer.activation(), CellActivation::Relu);
}

#[test]
fn test_forget_gate_bias_starts_at_one() {
    let device = Default::default();
    let layer = BiLstmLayer::<TestBackend>::new(6, 3, CellActivation::Tanh, 0.0, &device);

    for direction in [layer.forward_direction(), layer.backward_direction()] {
        let bias = direction.gate_bias().unwrap().into_data().to_vec::<f32>().unwrap();
        assert_eq!(bias.len(), 12);
        assert!(bias[..3].iter().all(|&b| b == 0.0));
        assert!(bias[3..6].iter().all(|&b| b == 1.0));
        assert!(bias[6..].iter().all(|&b| b == 0.0));
    }
}

#[test]
fn test_tanh_layer_output_is_bounded() {
    let device = Default::default();
    let layer = BiLstmLayer::<TestBackend>::new(4, 3, CellActivation::Tanh, 0.0, &device);

    let x = Tensor::<TestBackend, 3>::random([3, 5, 4], Distribution::Uniform(-10.0, 10.0), &device);
    let values = to_vec(layer.forward(x));

    // Each direction is within [-1, 1], their sum within [-2, 2]
    assert!(values.iter().all(|v| v.abs() <= 2.0));
}

#[test]
fn test_relu_layer_output_is_non_negative() {
    let device = Default::default();
    let layer = BiLstmLayer::<TestBackend>::new(4, 3, CellActivation::Relu, 0.0, &device);

    let x = Tensor::<TestBackend, 3>::random([3, 5, 4], Distribution::Default, &device);
    let values = to_vec(layer.forward(x));

    assert!(values.iter().all(|&v| v >= 0.0));
}

#[test]
fn test_first_timestep_sees_future_input() {
    let device = Default::default();
    let layer = BiLstmLayer::<TestBackend>::new(2, 3, CellActivation::Tanh, 0.0, &device);

    let base = vec![0.5f32, -0.5, 0.25, 0.75, 0.1, 0.2];
    let mut changed = base.clone();
    // Only the last timestep differs
    changed[4] = -3.0;
    changed[5] = 3.0;

    let x_base = Tensor::<TestBackend, 3>::from_data(TensorData::new(base, [1, 3, 2]), &device);
    let x_changed =
        Tensor::<TestBackend, 3>::from_data(TensorData::new(changed, [1, 3, 2]), &device);

    let out_base = to_vec(layer.forward(x_base).narrow(1, 0, 1));
    let out_changed = to_vec(layer.forward(x_changed).narrow(1, 0, 1));

    // The backward direction carries the last timestep back to the first
    let diff: f32 = out_base
        .iter()
        .zip(out_changed.iter())
        .map(|(a, b)| (a - b).abs())
        .sum();
    assert!(diff > 0.0);
}

#[test]
fn test_velocity_model_forward_shape() {
    let device = Default::default();
    let model: VelocityModel<TestBackend> = VelocityModelConfig::default().init(&device);

    let x = Tensor::<TestBackend, 3>::random([2, 3, INPUT_SIZE], Distribution::Default, &device);
    let output = model.forward(x);

    assert_eq!(output.dims(), [2, 3, OUTPUT_SIZE]);
    assert_eq!(model.input_size(), INPUT_SIZE);
    assert_eq!(model.output_size(), OUTPUT_SIZE);
    assert_eq!(model.num_layers(), 3);
    assert!(to_vec(output).iter().all(|v| v.abs() <= 2.0));
}

#[test]
fn test_dropout_inactive_without_autodiff() {
    let device = Default::default();
    let model: VelocityModel<TestBackend> =
        VelocityModelConfig::default().with_dropout(0.5).init(&device);

    let x = Tensor::<TestBackend, 3>::random([1, 4, INPUT_SIZE], Distribution::Default, &device);
    let first = to_vec(model.forward(x.clone()));
    let second = to_vec(model.forward(x));

    assert_eq!(first, second);
}

#[test]
fn test_dropout_active_during_training() {
    let device = Default::default();
    let layer =
        BiLstmLayer::<TestAutodiffBackend>::new(8, 4, CellActivation::Tanh, 0.5, &device);

    let x = Tensor::<TestAutodiffBackend, 3>::random([2, 3, 8], Distribution::Default, &device);
    let first = layer.forward(x.clone()).into_data().to_vec::<f32>().unwrap();
    let second = layer.forward(x).into_data().to_vec::<f32>().unwrap();

    assert_ne!(first, second);
}

#[test]
fn test_mse_loss() {
    let device = Default::default();
    let model: VelocityModel<TestBackend> = VelocityModelConfig::default().init(&device);

    let a = Tensor::<TestBackend, 3>::ones([2, 2, 3], &device);
    let zero = model.mse_loss(a.clone(), a.clone()).into_scalar();
    assert_eq!(zero, 0.0);

    let b = Tensor::<TestBackend, 3>::full([2, 2, 3], 3.0, &device);
    let four = model.mse_loss(a, b).into_scalar();
    assert!((four - 4.0).abs() < 1e-6);
}

#[test]
fn test_model_summary() {
    let device = Default::default();
    let model: VelocityModel<TestBackend> = VelocityModelConfig::default().init(&device);
    let summary = model.summary();

    assert_eq!(summary.matches("BiLSTM").count(), 3);
    assert_eq!(summary.matches("Relu").count(), 2);
    assert_eq!(summary.matches("Tanh").count(), 1);

    let first = 2 * (INPUT_SIZE * 4 * OUTPUT_SIZE + 4 * OUTPUT_SIZE + OUTPUT_SIZE * 4 * OUTPUT_SIZE);
    let other = 2 * (OUTPUT_SIZE * 4 * OUTPUT_SIZE + 4 * OUTPUT_SIZE + OUTPUT_SIZE * 4 * OUTPUT_SIZE);
    assert!(summary.contains(&format!("Total params: {}", first + 2 * other)));
}
