use thiserror::Error;

/// Shape and configuration problems found in piano-roll data
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PianoRollError {
    #[error("dataset contains no sequences")]
    EmptyDataset,

    #[error("dataset has {inputs} input sequences but {velocities} velocity sequences")]
    LengthMismatch { inputs: usize, velocities: usize },

    #[error("sequence {index} has width {actual}, expected {expected}")]
    WidthMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("sequence {index} has {input_steps} input timesteps but {velocity_steps} velocity timesteps")]
    TimestepMismatch {
        index: usize,
        input_steps: usize,
        velocity_steps: usize,
    },

    #[error("sequence {index} has no timesteps")]
    EmptySequence { index: usize },

    #[error("sequence {index} has rows of unequal width")]
    RaggedSequence { index: usize },

    #[error("batch size must be greater than zero")]
    InvalidBatchSize,

    #[error("test split {0} must be in [0, 1)")]
    InvalidSplit(f64),
}

pub type PianoRollResult<T> = Result<T, PianoRollError>;
