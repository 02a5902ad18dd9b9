use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::tempdir;

use crate::built_info;
use crate::test::fixtures::{random_note_states, TestBackend};
use crate::util::model_utils::{
    get_model_path, is_model_version_current, load_trained_model, save_model_checkpoint,
    save_trained_model,
};
use crate::velocity::step_3_velocity_model_arch::{VelocityModel, VelocityModelConfig};
use crate::velocity::step_5_prediction::predict_raw;
use crate::velocity::step_6_model_serialization::{
    load_metadata, load_model_with_metadata, metadata_file_path, model_file_path,
    save_model_with_metadata, verify_model, ModelMetadata,
};

#[test]
fn test_metadata_describes_model() {
    let model: VelocityModel<TestBackend> =
        VelocityModelConfig::default().with_dropout(0.3).init(&Default::default());
    let metadata = ModelMetadata::for_model(&model);

    assert_eq!(metadata.input_size, 176);
    assert_eq!(metadata.hidden_size, 88);
    assert_eq!(metadata.output_size, 88);
    assert_eq!(metadata.num_layers, 3);
    assert!(metadata.bidirectional);
    assert_eq!(metadata.merge_mode, "sum");
    assert_eq!(metadata.dropout, 0.3);
    assert_eq!(metadata.version, built_info::PKG_VERSION);
}

#[test]
fn test_save_and_load_round_trip() -> Result<()> {
    let dir = tempdir()?;
    let device = Default::default();
    let model: VelocityModel<TestBackend> = VelocityModelConfig::default().init(&device);
    let path = dir.path().join("model");

    save_model_with_metadata(&model, &ModelMetadata::for_model(&model), &path)?;
    assert!(path.with_extension("bin").exists());
    assert!(path.with_extension("meta.json").exists());
    assert!(verify_model(&path)?);

    let (loaded, metadata) = load_model_with_metadata::<TestBackend>(&path, &device)?;
    assert_eq!(metadata.hidden_size, 88);

    let mut rng = StdRng::seed_from_u64(21);
    let seed = random_note_states(&mut rng, 4);
    let before = predict_raw(&model, &seed, &device)?;
    let after = predict_raw(&loaded, &seed, &device)?;

    let max_diff = before
        .iter()
        .zip(after.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max);
    assert!(max_diff < 1e-6);
    Ok(())
}

#[test]
fn test_verify_model_missing_files() -> Result<()> {
    let dir = tempdir()?;
    assert!(!verify_model(dir.path().join("absent"))?);
    Ok(())
}

#[test]
fn test_verify_model_corrupt_metadata() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("broken");
    std::fs::write(path.with_extension("bin"), b"not a model")?;
    std::fs::write(path.with_extension("meta.json"), b"{ not json")?;

    assert!(verify_model(&path).is_err());
    assert!(load_metadata(&path).is_err());
    Ok(())
}

#[test]
fn test_model_utils_save_load_and_checkpoint() -> Result<()> {
    let dir = tempdir()?;
    let device = Default::default();
    let model: VelocityModel<TestBackend> = VelocityModelConfig::default().init(&device);

    let saved = save_trained_model(&model, dir.path(), "velocity")?;
    assert_eq!(saved, get_model_path(dir.path(), "velocity"));
    assert!(is_model_version_current(&saved, built_info::PKG_VERSION));
    assert!(!is_model_version_current(&saved, "0.0.0-other"));
    assert!(!is_model_version_current(&dir.path().join("missing"), built_info::PKG_VERSION));

    let (loaded, _) = load_trained_model::<TestBackend>(dir.path(), "velocity", &device)?;
    assert_eq!(loaded.input_size(), model.input_size());

    let checkpoint = save_model_checkpoint(&model, dir.path(), "velocity", 4)?;
    assert_eq!(checkpoint, dir.path().join("velocity_epoch_4"));
    assert!(verify_model(&checkpoint)?);
    Ok(())
}

#[test]
fn test_artifact_paths_keep_dots_in_name() {
    let stem = std::path::Path::new("models/velocity.v2");
    assert_eq!(model_file_path(stem), std::path::Path::new("models/velocity.v2.bin"));
    assert_eq!(
        metadata_file_path(stem),
        std::path::Path::new("models/velocity.v2.meta.json")
    );
}

#[test]
fn test_dotted_model_name_keeps_checkpoints_apart() -> Result<()> {
    let dir = tempdir()?;
    let device = Default::default();
    let model: VelocityModel<TestBackend> = VelocityModelConfig::default().init(&device);

    let saved = save_trained_model(&model, dir.path(), "velocity.v2")?;
    let first = save_model_checkpoint(&model, dir.path(), "velocity.v2", 1)?;
    let second = save_model_checkpoint(&model, dir.path(), "velocity.v2", 2)?;

    let mut files: Vec<String> = std::fs::read_dir(dir.path())?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<_>>()?;
    files.sort();
    assert_eq!(
        files,
        vec![
            "velocity.v2.bin",
            "velocity.v2.meta.json",
            "velocity.v2_epoch_1.bin",
            "velocity.v2_epoch_1.meta.json",
            "velocity.v2_epoch_2.bin",
            "velocity.v2_epoch_2.meta.json",
        ]
    );

    for path in [&saved, &first, &second] {
        assert!(verify_model(path)?);
    }
    let (loaded, _) = load_trained_model::<TestBackend>(dir.path(), "velocity.v2", &device)?;
    assert_eq!(loaded.hidden_size(), model.hidden_size());
    Ok(())
}
