// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// File naming convention:
//   checkpoints/
//     model_epoch_1.mpk.gz   ← weights after epoch 1
//     model_epoch_2.mpk.gz   ← weights after epoch 2
//     ...
//     latest_epoch.json      ← contains the number of latest epoch
//     train_config.json      ← hyperparameters + architecture
//
// The config is stored next to the weights because the model
// must be rebuilt with the exact same architecture before the
// weights can be loaded into it.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{bail, Context, Result};
use std::{fs, path::PathBuf};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::{SiameseConfig, SiameseNetwork};

const LATEST_FILE: &str = "latest_epoch.json";
const CONFIG_FILE: &str = "train_config.json";

/// Manages saving and loading of model checkpoints.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager.
    /// The directory is only created on the first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Save model weights for a given epoch and move the
    /// latest-epoch pointer to it.
    pub fn save_model<B: Backend>(
        &self,
        model: &SiameseNetwork<B>,
        epoch: usize,
    ) -> Result<()> {
        self.ensure_dir()?;
        // Path without extension; the recorder adds .mpk.gz
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| {
                format!("Failed to save checkpoint to '{}'", path.display())
            })?;

        let latest_path = self.dir.join(LATEST_FILE);
        fs::write(&latest_path, serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write '{}'", latest_path.display()))?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load the latest saved weights into `model`.
    ///
    /// `model` must have the architecture the checkpoint was
    /// written with, or loading fails.
    pub fn load_model<B: Backend>(
        &self,
        model:  SiameseNetwork<B>,
        device: &B::Device,
    ) -> Result<SiameseNetwork<B>> {
        let epoch = self.latest_epoch()?.with_context(|| {
            format!(
                "No checkpoint found in '{}'. Have you run 'train' first?",
                self.dir.display()
            )
        })?;
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'", path.display())
            })?;

        Ok(model.load_record(record))
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        self.ensure_dir()?;
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);

        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. \
                 Make sure you have run 'train' first.",
                path.display()
            )
        })?;

        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config in '{}'", path.display()))
    }

    /// Fails unless the saved config describes the same network as
    /// `model`, i.e. the saved weights can be loaded into it.
    pub fn ensure_same_architecture(&self, model: &SiameseConfig) -> Result<()> {
        let saved = self
            .load_config()
            .context("Cannot verify the checkpoint architecture")?
            .model;

        let saved_json     = serde_json::to_value(&saved)?;
        let requested_json = serde_json::to_value(model)?;
        if saved_json != requested_json {
            bail!(
                "Checkpoint in '{}' was trained with a different architecture.\n  \
                 saved:     {}\n  requested: {}\n\
                 Use the saved settings, another --checkpoint-dir, or --no-resume.",
                self.dir.display(),
                saved_json,
                requested_json
            );
        }
        Ok(())
    }

    /// Epoch of the most recent checkpoint, or None before the first save.
    pub fn latest_epoch(&self) -> Result<Option<usize>> {
        let path = self.dir.join(LATEST_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        let epoch = serde_json::from_str::<usize>(&s)
            .with_context(|| format!("Malformed '{}'", path.display()))?;
        Ok(Some(epoch))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::tests::tiny_config;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_no_checkpoint_yet() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path());
        assert_eq!(ckpt.latest_epoch().unwrap(), None);

        let device = Default::default();
        let model: SiameseNetwork<TestBackend> = tiny_config().init(&device).unwrap();
        assert!(ckpt.load_model(model, &device).is_err());
    }

    #[test]
    fn test_save_and_restore_weights() {
        let tmp    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(tmp.path());
        let device = Default::default();

        let trained: SiameseNetwork<TestBackend> = tiny_config().init(&device).unwrap();
        ckpt.save_model(&trained, 3).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), Some(3));

        // Fresh random init, then overwrite with the saved weights
        let fresh: SiameseNetwork<TestBackend> = tiny_config().init(&device).unwrap();
        let restored = ckpt.load_model(fresh, &device).unwrap();

        let a = Tensor::<TestBackend, 4>::random([2, 1, 48, 48], Distribution::Default, &device);
        let b = Tensor::<TestBackend, 4>::random([2, 1, 48, 48], Distribution::Default, &device);
        let expected = trained.forward(a.clone(), b.clone()).into_data().to_vec::<f32>().unwrap();
        let actual   = restored.forward(a, b).into_data().to_vec::<f32>().unwrap();
        for (x, y) in expected.iter().zip(&actual) {
            assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_new_does_not_create_directory() {
        let tmp  = tempfile::tempdir().unwrap();
        let dir  = tmp.path().join("typo");
        let ckpt = CheckpointManager::new(&dir);
        assert_eq!(ckpt.latest_epoch().unwrap(), None);
        assert!(ckpt.load_config().is_err());
        assert!(!dir.exists());

        ckpt.save_config(&TrainConfig::default()).unwrap();
        assert!(dir.exists());
    }

    #[test]
    fn test_architecture_check() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path());

        // Nothing saved yet → cannot vouch for any architecture
        assert!(ckpt.ensure_same_architecture(&tiny_config()).is_err());

        let cfg = TrainConfig { model: tiny_config(), ..TrainConfig::default() };
        ckpt.save_config(&cfg).unwrap();
        ckpt.ensure_same_architecture(&tiny_config()).unwrap();

        let err = ckpt
            .ensure_same_architecture(&tiny_config().with_image_size(64))
            .unwrap_err();
        assert!(err.to_string().contains("different architecture"));
        assert!(ckpt
            .ensure_same_architecture(&tiny_config().with_conv_kernels(vec![5, 3, 3, 3]))
            .is_err());
    }

    #[test]
    fn test_config_round_trip() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path());
        let cfg  = TrainConfig { epochs: 7, ..TrainConfig::default() };

        ckpt.save_config(&cfg).unwrap();
        let loaded = ckpt.load_config().unwrap();
        assert_eq!(loaded.epochs, 7);
        assert_eq!(loaded.model.image_size, cfg.model.image_size);
    }
}
