// External imports
use burn::tensor::{backend::Backend, Tensor, TensorData};
use log::debug;
use ndarray::{s, Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

// Internal imports
use crate::constants::{INPUT_SIZE, OUTPUT_SIZE};
use crate::util::error::{PianoRollError, PianoRollResult};

/// Note states per timestep: `[timesteps, INPUT_SIZE]`
pub type NoteSequence = Array2<f32>;

/// Normalised velocities per timestep: `[timesteps, OUTPUT_SIZE]`
pub type VelocitySequence = Array2<f32>;

/// Paired note-state and velocity sequences of varying length
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PianoRollDataset {
    pub inputs: Vec<NoteSequence>,
    pub velocities: Vec<VelocitySequence>,
}

impl PianoRollDataset {
    /// Build a dataset, rejecting pairs whose shapes don't line up
    pub fn new(
        inputs: Vec<NoteSequence>,
        velocities: Vec<VelocitySequence>,
    ) -> PianoRollResult<Self> {
        let dataset = Self { inputs, velocities };
        dataset.validate()?;
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Check widths, pair lengths and that no sequence is empty
    pub fn validate(&self) -> PianoRollResult<()> {
        if self.inputs.len() != self.velocities.len() {
            return Err(PianoRollError::LengthMismatch {
                inputs: self.inputs.len(),
                velocities: self.velocities.len(),
            });
        }

        self.inputs
            .par_iter()
            .zip(self.velocities.par_iter())
            .enumerate()
            .try_for_each(|(index, (x, y))| {
                if x.nrows() == 0 || y.nrows() == 0 {
                    return Err(PianoRollError::EmptySequence { index });
                }
                if x.ncols() != INPUT_SIZE {
                    return Err(PianoRollError::WidthMismatch {
                        index,
                        expected: INPUT_SIZE,
                        actual: x.ncols(),
                    });
                }
                if y.ncols() != OUTPUT_SIZE {
                    return Err(PianoRollError::WidthMismatch {
                        index,
                        expected: OUTPUT_SIZE,
                        actual: y.ncols(),
                    });
                }
                if x.nrows() != y.nrows() {
                    return Err(PianoRollError::TimestepMismatch {
                        index,
                        input_steps: x.nrows(),
                        velocity_steps: y.nrows(),
                    });
                }
                Ok(())
            })
    }

    /// Subset of the dataset in the given order
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            inputs: indices.iter().map(|&i| self.inputs[i].clone()).collect(),
            velocities: indices.iter().map(|&i| self.velocities[i].clone()).collect(),
        }
    }

    /// Longest sequence length, 0 for an empty dataset
    pub fn max_timesteps(&self) -> usize {
        self.inputs.iter().map(|x| x.nrows()).max().unwrap_or(0)
    }
}

/// A padded training batch on a Burn device
#[derive(Debug, Clone)]
pub struct PianoRollBatch<B: Backend> {
    /// Shape [batch_size, max_timesteps, INPUT_SIZE]
    pub inputs: Tensor<B, 3>,
    /// Shape [batch_size, max_timesteps, OUTPUT_SIZE]
    pub targets: Tensor<B, 3>,
}

/// Number of batches needed to see every sequence once
pub fn steps_for(num_samples: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    num_samples.div_ceil(batch_size)
}

/// Pad sequences with trailing zero rows to the longest one
///
/// Returns an array of shape `[sequences.len(), max_len, width]`.
pub fn pad_sequences(sequences: &[Array2<f32>], width: usize) -> PianoRollResult<Array3<f32>> {
    for (index, seq) in sequences.iter().enumerate() {
        if seq.ncols() != width {
            return Err(PianoRollError::WidthMismatch {
                index,
                expected: width,
                actual: seq.ncols(),
            });
        }
    }
    Ok(pad_unchecked(sequences, width))
}

fn pad_unchecked(sequences: &[Array2<f32>], width: usize) -> Array3<f32> {
    let max_len = sequences.iter().map(|s| s.nrows()).max().unwrap_or(0);
    let mut padded = Array3::<f32>::zeros((sequences.len(), max_len, width));

    padded
        .outer_iter_mut()
        .into_par_iter()
        .zip(sequences.par_iter())
        .for_each(|(mut row, seq)| {
            row.slice_mut(s![..seq.nrows(), ..]).assign(seq);
        });

    padded
}

/// Pad every pair in the dataset to the dataset-wide maximum length
pub fn pad_dataset(dataset: &PianoRollDataset) -> PianoRollResult<PianoRollDataset> {
    dataset.validate()?;
    let inputs = pad_unchecked(&dataset.inputs, INPUT_SIZE);
    let velocities = pad_unchecked(&dataset.velocities, OUTPUT_SIZE);

    Ok(PianoRollDataset {
        inputs: inputs.axis_iter(Axis(0)).map(|x| x.to_owned()).collect(),
        velocities: velocities.axis_iter(Axis(0)).map(|y| y.to_owned()).collect(),
    })
}

/// Endless, cycling source of padded `(inputs, targets)` batches
///
/// Batch `i` starts at `(i * batch_size) % len` and is cut short at the end
/// of the dataset; callers take `steps_per_epoch()` batches per epoch.
pub struct BatchGenerator<'a> {
    dataset: &'a PianoRollDataset,
    batch_size: usize,
    step: usize,
}

impl<'a> BatchGenerator<'a> {
    pub fn new(dataset: &'a PianoRollDataset, batch_size: usize) -> PianoRollResult<Self> {
        if batch_size == 0 {
            return Err(PianoRollError::InvalidBatchSize);
        }
        if dataset.is_empty() {
            return Err(PianoRollError::EmptyDataset);
        }
        dataset.validate()?;

        Ok(Self {
            dataset,
            batch_size,
            step: 0,
        })
    }

    pub fn steps_per_epoch(&self) -> usize {
        steps_for(self.dataset.len(), self.batch_size)
    }

    /// Half-open sample range covered by batch `step`
    pub fn batch_bounds(&self, step: usize) -> (usize, usize) {
        let len = self.dataset.len();
        let start = (step * self.batch_size) % len;
        let end = usize::min(start + self.batch_size, len);
        (start, end)
    }
}

impl Iterator for BatchGenerator<'_> {
    type Item = (Array3<f32>, Array3<f32>);

    fn next(&mut self) -> Option<Self::Item> {
        let (start, end) = self.batch_bounds(self.step);
        self.step += 1;
        debug!("Batch {} covers samples {}..{}", self.step, start, end);

        let x = pad_unchecked(&self.dataset.inputs[start..end], INPUT_SIZE);
        let y = pad_unchecked(&self.dataset.velocities[start..end], OUTPUT_SIZE);
        Some((x, y))
    }
}

/// Shuffle with a fixed seed and hold out `test_split` of the sequences
pub fn train_test_split(
    dataset: &PianoRollDataset,
    test_split: f64,
    seed: u64,
) -> PianoRollResult<(PianoRollDataset, PianoRollDataset)> {
    if !(0.0..1.0).contains(&test_split) {
        return Err(PianoRollError::InvalidSplit(test_split));
    }
    dataset.validate()?;

    let mut indices: Vec<usize> = (0..dataset.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_size = (dataset.len() as f64 * test_split).round() as usize;
    let (test_idx, train_idx) = indices.split_at(test_size);

    Ok((dataset.select(train_idx), dataset.select(test_idx)))
}

/// Move a host-side array onto a Burn device
pub fn array_to_tensor<B: Backend>(array: &Array3<f32>, device: &B::Device) -> Tensor<B, 3> {
    let (d0, d1, d2) = array.dim();
    let data: Vec<f32> = array.iter().copied().collect();
    Tensor::from_data(TensorData::new(data, [d0, d1, d2]), device)
}

/// Single sequence as a batch of one: `[1, timesteps, width]`
pub fn sequence_to_tensor<B: Backend>(seq: &Array2<f32>, device: &B::Device) -> Tensor<B, 3> {
    let batched = seq.view().insert_axis(Axis(0)).to_owned();
    array_to_tensor(&batched, device)
}

pub fn batch_to_tensors<B: Backend>(
    inputs: &Array3<f32>,
    targets: &Array3<f32>,
    device: &B::Device,
) -> PianoRollBatch<B> {
    PianoRollBatch {
        inputs: array_to_tensor(inputs, device),
        targets: array_to_tensor(targets, device),
    }
}
