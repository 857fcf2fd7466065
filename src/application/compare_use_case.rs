// ============================================================
// Layer 2 — Compare Use Case
// ============================================================
// Loads a trained checkpoint and scores two image files:
//
//   Step 1: Read the saved config    (Layer 6 - infra)
//   Step 2: Rebuild + load the model (Layer 5 - ml)
//   Step 3: Preprocess both images   (Layer 4 - data)
//   Step 4: Score the pair           (Layer 5 - ml)

use anyhow::Result;
use std::path::Path;

use crate::data::preprocessor::Preprocessor;
use crate::domain::{glyph::Glyph, traits::SimilarityScorer};
use crate::infra::{
    backend::{gpu_device, CpuBackend, DeviceKind, GpuBackend},
    checkpoint::CheckpointManager,
};
use crate::ml::inferencer::Inferencer;

/// Scores above this count as "same character"
pub const SAME_THRESHOLD: f32 = 0.5;

/// A trained model ready to score drawings, on whichever
/// backend was asked for.
pub struct LoadedScorer {
    pub scorer:     Box<dyn SimilarityScorer>,
    pub image_size: usize,
}

/// Rebuild the model saved in `checkpoint_dir`.
/// `device` overrides the backend the model was trained on.
pub fn load_scorer(checkpoint_dir: &str, device: Option<DeviceKind>) -> Result<LoadedScorer> {
    let ckpt   = CheckpointManager::new(checkpoint_dir);
    let device = match device {
        Some(d) => d,
        None => ckpt.load_config()?.device,
    };

    let (scorer, image_size): (Box<dyn SimilarityScorer>, usize) = match device {
        DeviceKind::Wgpu => {
            let inf = Inferencer::<GpuBackend>::from_checkpoint(&ckpt, gpu_device())?;
            let size = inf.image_size();
            (Box::new(inf), size)
        }
        DeviceKind::Cpu => {
            let inf = Inferencer::<CpuBackend>::from_checkpoint(&ckpt, Default::default())?;
            let size = inf.image_size();
            (Box::new(inf), size)
        }
    };
    tracing::debug!("Scoring on {:?} at {}x{}", device, image_size, image_size);

    Ok(LoadedScorer { scorer, image_size })
}

#[derive(Debug, Clone, Copy)]
pub struct Comparison {
    pub similarity: f32,
    pub same:       bool,
}

pub struct CompareUseCase {
    loaded: LoadedScorer,
}

impl CompareUseCase {
    pub fn new(checkpoint_dir: &str, device: Option<DeviceKind>) -> Result<Self> {
        Ok(Self { loaded: load_scorer(checkpoint_dir, device)? })
    }

    pub fn from_scorer(loaded: LoadedScorer) -> Self {
        Self { loaded }
    }

    pub fn compare(&self, first: &Path, second: &Path) -> Result<Comparison> {
        let prep = Preprocessor::new(self.loaded.image_size);
        let a = load_glyph(&prep, first)?;
        let b = load_glyph(&prep, second)?;

        let similarity = self.loaded.scorer.similarity(&a, &b)?;

        tracing::info!(
            "'{}' vs '{}': similarity {:.4}",
            first.display(),
            second.display(),
            similarity
        );
        Ok(Comparison { similarity, same: similarity > SAME_THRESHOLD })
    }
}

fn load_glyph(prep: &Preprocessor, path: &Path) -> Result<Glyph> {
    let pixels = prep.load(path)?;
    Ok(Glyph::unlabeled(path.display().to_string(), prep.side(), pixels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    /// Scores by mean absolute pixel difference: identical → 1.0
    struct PixelScorer;

    impl SimilarityScorer for PixelScorer {
        fn scores(&self, query: &Glyph, candidates: &[Glyph]) -> Result<Vec<f32>> {
            Ok(candidates
                .iter()
                .map(|c| {
                    let diff: f32 = query
                        .normalized()
                        .zip(c.normalized())
                        .map(|(a, b)| (a - b).abs())
                        .sum();
                    1.0 - diff / query.pixels.len() as f32
                })
                .collect())
        }
    }

    fn write_png(dir: &Path, name: &str, value: u8) -> std::path::PathBuf {
        let path = dir.join(name);
        GrayImage::from_pixel(30, 30, Luma([value])).save(&path).unwrap();
        path
    }

    #[test]
    fn test_compare_identical_and_opposite() {
        let tmp   = tempfile::tempdir().unwrap();
        let white = write_png(tmp.path(), "white.png", 255);
        let white2 = write_png(tmp.path(), "white2.png", 255);
        let black = write_png(tmp.path(), "black.png", 0);

        let uc = CompareUseCase::from_scorer(LoadedScorer {
            scorer:     Box::new(PixelScorer),
            image_size: 12,
        });

        let same = uc.compare(&white, &white2).unwrap();
        assert!((same.similarity - 1.0).abs() < 1e-6);
        assert!(same.same);

        let diff = uc.compare(&white, &black).unwrap();
        assert!(diff.similarity < 1e-6);
        assert!(!diff.same);
    }

    #[test]
    fn test_missing_image_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let uc = CompareUseCase::from_scorer(LoadedScorer {
            scorer:     Box::new(PixelScorer),
            image_size: 12,
        });
        assert!(uc.compare(&tmp.path().join("a.png"), &tmp.path().join("b.png")).is_err());
    }

    /// Returns nothing, like a model with a broken output head
    struct SilentScorer;

    impl SimilarityScorer for SilentScorer {
        fn scores(&self, _query: &Glyph, _candidates: &[Glyph]) -> Result<Vec<f32>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_empty_score_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let a   = write_png(tmp.path(), "a.png", 255);
        let b   = write_png(tmp.path(), "b.png", 0);

        let uc = CompareUseCase::from_scorer(LoadedScorer {
            scorer:     Box::new(SilentScorer),
            image_size: 12,
        });
        let err = uc.compare(&a, &b).unwrap_err();
        assert!(err.to_string().contains("no output"));
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().display().to_string();
        assert!(load_scorer(&dir, Some(DeviceKind::Cpu)).is_err());
    }
}
