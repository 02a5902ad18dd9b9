//! Piano-roll velocity model: batching, architecture, training, prediction
//! and serialization, one step per file.

pub mod step_1_batch_generation;
pub mod step_2_lstm_cell;
pub mod step_3_velocity_model_arch;
pub mod step_4_train_model;
pub mod step_5_prediction;
pub mod step_6_model_serialization;
