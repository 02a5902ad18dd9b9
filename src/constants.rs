// Piano roll layout
pub const NUMBER_OF_NOTES: usize = 88; // Keys on a full piano
pub const NOTE_STATES: usize = 2; // pressed, sustained
pub const INPUT_SIZE: usize = NUMBER_OF_NOTES * NOTE_STATES;
pub const OUTPUT_SIZE: usize = NUMBER_OF_NOTES;

// MIDI velocity range
pub const MAX_MIDI_VELOCITY: i32 = 127;

// Model parameters
pub const NUM_LAYERS: usize = 3;
pub const DEFAULT_DROPOUT: f64 = 0.2; // Drop 20% of layer inputs
pub const MERGE_MODE: &str = "sum";

// Training parameters
pub const DEFAULT_LEARNING_RATE: f64 = 0.001;
pub const DEFAULT_CLIP_NORM: f32 = 10.0;
pub const DEFAULT_BATCH_SIZE: usize = 32;
pub const DEFAULT_EPOCHS: usize = 10;
pub const DEFAULT_SEED: u64 = 42;

// Data preprocessing
pub const VALIDATION_SPLIT_RATIO: f64 = 0.2; // 20% of sequences held out

// Model paths
pub const MODEL_PATH: &str = "models";
pub const MODEL_FILE_NAME: &str = "velocity_model";
pub const REPORT_PATH: &str = "reports";
