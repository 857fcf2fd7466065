// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 0: Check the architecture     (Layer 5 - ml)
//   Step 1: Load drawings              (Layer 4 - data)
//   Step 2: Group them by character    (Layer 4 - data)
//   Step 3: Hold out validation chars  (Layer 4 - data)
//   Step 4: Install Ctrl-C handler     (Layer 6 - infra)
//   Step 5: Run training loop          (Layer 5 - ml)
//           (checks any checkpoint being resumed, then saves
//            the config next to the weights)
//
// Validation characters never appear in training pairs, so
// validation accuracy measures generalisation to unseen
// characters, which is what one-shot evaluation needs.
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, Result};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::{split_by_character, GlyphIndex},
    loader::OmniglotLoader,
    preprocessor::Preprocessor,
};
use crate::domain::traits::GlyphSource;
use crate::infra::{
    backend::DeviceKind,
    checkpoint::CheckpointManager,
    interrupt::InterruptFlag,
};
use crate::ml::{
    loss::{Objective, DEFAULT_MARGIN},
    model::SiameseConfig,
    trainer::{run_training, TrainingReport},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Saved next to the checkpoints so inference can rebuild the
// exact architecture. Missing fields fall back to defaults,
// so hand-written JSON configs only need the values they change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Omniglot `images_background` style directory
    pub train_dir:           String,
    /// Separate validation directory; when unset, characters are
    /// held out of `train_dir` instead
    pub valid_dir:           Option<String>,
    pub checkpoint_dir:      String,
    /// Share of characters held out when `valid_dir` is unset
    pub validation_fraction: f64,
    pub validation_steps:    usize,
    pub batch_size:          usize,
    pub epochs:              usize,
    pub steps_per_epoch:     usize,
    pub lr:                  f64,
    pub weight_decay:        f64,
    /// Alpha in the contrastive and triplet losses
    pub margin:              f64,
    pub objective:           Objective,
    pub seed:                u64,
    pub num_workers:         usize,
    /// Debug-log the running loss every N batches (0 = never)
    pub log_interval:        usize,
    pub resume:              bool,
    pub device:              DeviceKind,
    pub model:               SiameseConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_dir:           "data/images_background".to_string(),
            valid_dir:           None,
            checkpoint_dir:      "checkpoints".to_string(),
            validation_fraction: 0.2,
            validation_steps:    64,
            batch_size:          64,
            epochs:              1,
            steps_per_epoch:     128,
            lr:                  1e-3,
            weight_decay:        0.0,
            margin:              DEFAULT_MARGIN,
            objective:           Objective::Contrastive,
            seed:                42,
            num_workers:         1,
            log_interval:        16,
            resume:              true,
            device:              DeviceKind::default(),
            model:               SiameseConfig::new(),
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainingReport> {
        let cfg = &self.config;

        // ── Step 0: Fail on an impossible conv stack before decoding anything ─
        let features = cfg.model.flatten_size()?;
        tracing::debug!("Encoder flattens to {} features", features);

        let preprocessor = Preprocessor::new(cfg.model.image_size);

        // ── Step 1 + 2: Load drawings and group by character ──────────────────
        tracing::info!("Loading drawings from '{}'", cfg.train_dir);
        let index = load_index(&cfg.train_dir, preprocessor.clone())?;
        if index.glyph_count() == 0 {
            bail!("No drawings found in '{}'", cfg.train_dir);
        }
        tracing::info!(
            "Loaded {} drawings of {} characters",
            index.glyph_count(),
            index.class_count()
        );

        // ── Step 3: Validation characters ─────────────────────────────────────
        let (train_index, val_index) = match &cfg.valid_dir {
            Some(dir) => {
                tracing::info!("Loading validation drawings from '{}'", dir);
                (index, Some(load_index(dir, preprocessor)?))
            }
            None if cfg.validation_fraction > 0.0 => {
                let mut rng = StdRng::seed_from_u64(cfg.seed);
                let (train, val) = split_by_character(index, 1.0 - cfg.validation_fraction, &mut rng);
                (train, Some(val))
            }
            None => (index, None),
        };

        // A validation set that cannot form pairs is dropped, not fatal
        let val_index = val_index.filter(|val| match val.ensure_trainable() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Skipping validation: {e}");
                false
            }
        });
        tracing::info!(
            "Split: {} train characters, {} validation characters",
            train_index.class_count(),
            val_index.as_ref().map_or(0, GlyphIndex::class_count)
        );

        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir);

        // ── Step 4: Ctrl-C stops training after the current batch ─────────────
        let interrupt = InterruptFlag::new();
        interrupt.install_ctrl_c()?;

        // ── Step 5: Run training loop (Layer 5) ───────────────────────────────
        run_training(cfg, train_index, val_index, &ckpt_manager, &interrupt)
    }
}

fn load_index(dir: &str, preprocessor: Preprocessor) -> Result<GlyphIndex> {
    let glyphs = OmniglotLoader::new(dir, preprocessor).load_all()?;
    Ok(GlyphIndex::from_glyphs(glyphs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::tests::tiny_config;
    use image::{GrayImage, Luma};
    use std::path::Path;

    /// alphabet/character/drawing.png tree; every drawing of a
    /// character is a horizontal bar at a character-specific row.
    fn write_omniglot_tree(root: &Path, alphabets: usize, characters: usize, drawings: usize) {
        for a in 0..alphabets {
            for c in 0..characters {
                let dir = root.join(format!("alphabet{a}")).join(format!("character{c:02}"));
                std::fs::create_dir_all(&dir).unwrap();
                let row = (a * characters + c) as u32 * 4 + 2;
                for d in 0..drawings {
                    let mut img = GrayImage::from_pixel(48, 48, Luma([255]));
                    for x in d as u32..40 {
                        img.put_pixel(x, row, Luma([0]));
                    }
                    img.save(dir.join(format!("{c:02}_{d:02}.png"))).unwrap();
                }
            }
        }
    }

    fn tiny_run(root: &Path) -> TrainConfig {
        TrainConfig {
            train_dir:        root.join("images").display().to_string(),
            checkpoint_dir:   root.join("ckpt").display().to_string(),
            batch_size:       4,
            epochs:           1,
            steps_per_epoch:  2,
            validation_steps: 1,
            num_workers:      0,
            device:           DeviceKind::Cpu,
            model:            tiny_config(),
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: TrainConfig =
            serde_json::from_str(r#"{ "epochs": 5, "objective": "triplet", "device": "cpu" }"#).unwrap();
        assert_eq!(cfg.epochs, 5);
        assert_eq!(cfg.objective, Objective::Triplet);
        assert_eq!(cfg.device, DeviceKind::Cpu);
        assert_eq!(cfg.batch_size, 64);
        assert_eq!(cfg.model.image_size, 105);
        assert!(cfg.resume);
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            train_dir:      tmp.path().join("missing").display().to_string(),
            checkpoint_dir: tmp.path().join("ckpt").display().to_string(),
            ..TrainConfig::default()
        };
        let err = TrainUseCase::new(cfg).execute().unwrap_err();
        assert!(err.to_string().contains("No drawings found"));
    }

    #[test]
    fn test_bad_architecture_fails_before_loading() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = tiny_run(tmp.path());
        cfg.model.conv_kernels = vec![3, 3];

        // Directory is missing too, but the architecture error comes first
        let err = TrainUseCase::new(cfg).execute().unwrap_err();
        assert!(err.to_string().contains("conv_kernels"));
        assert!(!tmp.path().join("ckpt").exists());
    }

    #[test]
    fn test_trains_end_to_end_from_png_tree() {
        let tmp = tempfile::tempdir().unwrap();
        write_omniglot_tree(&tmp.path().join("images"), 2, 5, 3);
        let cfg = tiny_run(tmp.path());

        let report = TrainUseCase::new(cfg.clone()).execute().unwrap();
        assert_eq!(report.epochs_run, 1);
        assert_eq!(report.last_epoch, 1);
        assert!(!report.interrupted);
        assert!(report.last_train_loss.is_finite());

        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir);
        assert_eq!(ckpt.latest_epoch().unwrap(), Some(1));
        let saved = ckpt.load_config().unwrap();
        assert_eq!(saved.model.image_size, 48);
        assert_eq!(saved.model.conv_filters, tiny_config().conv_filters);
        assert_eq!(saved.device, DeviceKind::Cpu);

        // Second run resumes and adds one epoch
        let report = TrainUseCase::new(cfg.clone()).execute().unwrap();
        assert_eq!(report.last_epoch, 2);

        // A different image size is refused and the saved config survives
        let mut changed = cfg;
        changed.model.image_size = 64;
        assert!(TrainUseCase::new(changed).execute().is_err());
        assert_eq!(ckpt.load_config().unwrap().model.image_size, 48);
    }
}
