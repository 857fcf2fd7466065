// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Rebuilds the trained network from a checkpoint directory and
// scores drawings against each other:
//
//   pair objectives    → sigmoid output of the prediction head
//   triplet objective  → 1 / (1 + d), d = summed embedding distance
//
// Either way, a higher score means "more likely the same
// character", so one-shot tasks are solved by taking the
// highest-scoring support drawing.

use anyhow::{bail, Result};
use burn::prelude::*;

use crate::domain::{glyph::Glyph, traits::SimilarityScorer};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::loss::{pairwise_distance, Objective};
use crate::ml::model::{tensor_to_vec, SiameseNetwork};
use crate::data::batcher::stack_glyphs;

pub struct Inferencer<B: Backend> {
    model:      SiameseNetwork<B>,
    objective:  Objective,
    image_size: usize,
    device:     B::Device,
}

impl<B: Backend> Inferencer<B> {
    pub fn from_checkpoint(ckpt_manager: &CheckpointManager, device: B::Device) -> Result<Self> {
        let cfg   = ckpt_manager.load_config()?;
        let model = cfg.model.init::<B>(&device)?;
        let model = ckpt_manager.load_model(model, &device)?;
        tracing::info!("Model loaded from checkpoint ({})", model.summary());

        Ok(Self::new(model, cfg.objective, cfg.model.image_size, device))
    }

    pub fn new(
        model:      SiameseNetwork<B>,
        objective:  Objective,
        image_size: usize,
        device:     B::Device,
    ) -> Self {
        Self { model, objective, image_size, device }
    }

    /// Side length every input drawing must have
    pub fn image_size(&self) -> usize {
        self.image_size
    }

    fn check_side(&self, glyph: &Glyph) -> Result<()> {
        if glyph.side != self.image_size {
            bail!(
                "Drawing '{}' is {}x{} but the model expects {}x{}",
                glyph.source, glyph.side, glyph.side, self.image_size, self.image_size
            );
        }
        Ok(())
    }
}

impl<B: Backend> SimilarityScorer for Inferencer<B> {
    fn scores(&self, query: &Glyph, candidates: &[Glyph]) -> Result<Vec<f32>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        self.check_side(query)?;
        for c in candidates {
            self.check_side(c)?;
        }

        // Query repeated once per candidate: [n, 1, S, S] on both sides
        let queries = stack_glyphs::<B>(std::iter::repeat(query).take(candidates.len()), &self.device);
        let others  = stack_glyphs::<B>(candidates, &self.device);

        let scores = if self.objective.uses_triplets() {
            let a = self.model.embed(queries);
            let b = self.model.embed(others);
            let d = pairwise_distance(a, b, self.model.distance_kind());
            d.add_scalar(1.0).recip()
        } else {
            self.model.forward(queries, others)
        };

        tensor_to_vec(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainConfig;
    use crate::domain::glyph::CharacterId;
    use crate::infra::backend::CpuBackend;
    use crate::ml::model::tests::tiny_config;

    fn glyph(name: &str, value: u8, side: usize) -> Glyph {
        Glyph::new(CharacterId::new("alpha", name), format!("{name}.png"), side, vec![value; side * side])
    }

    fn inferencer(objective: Objective) -> Inferencer<CpuBackend> {
        let device = Default::default();
        let model  = tiny_config().init::<CpuBackend>(&device).unwrap();
        Inferencer::new(model, objective, 48, device)
    }

    #[test]
    fn test_scores_one_per_candidate() {
        let inf = inferencer(Objective::Contrastive);
        let query = glyph("q", 10, 48);
        let support: Vec<Glyph> = (0..5).map(|i| glyph("s", i * 40, 48)).collect();

        let scores = inf.scores(&query, &support).unwrap();
        assert_eq!(scores.len(), 5);
        assert!(scores.iter().all(|&s| s > 0.0 && s < 1.0));
        assert!(inf.scores(&query, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let inf = inferencer(Objective::BinaryCrossentropy);
        let a = glyph("a", 30, 48);
        let b = glyph("b", 200, 48);
        let ab = inf.similarity(&a, &b).unwrap();
        let ba = inf.similarity(&b, &a).unwrap();
        assert!((ab - ba).abs() < 1e-5);
    }

    #[test]
    fn test_triplet_identical_drawings_score_one() {
        let inf = inferencer(Objective::Triplet);
        let a = glyph("a", 77, 48);
        let s = inf.similarity(&a, &a.clone()).unwrap();
        assert!((s - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_rejects_wrong_size() {
        let inf = inferencer(Objective::Contrastive);
        let err = inf.similarity(&glyph("a", 0, 48), &glyph("b", 0, 20)).unwrap_err();
        assert!(err.to_string().contains("expects 48x48"));
    }

    #[test]
    fn test_solve_returns_valid_index() {
        let inf = inferencer(Objective::Contrastive);
        let task = crate::domain::task::OneShotTask {
            query:   glyph("q", 5, 48),
            support: (0..3).map(|i| glyph("s", i * 90, 48)).collect(),
            answer:  0,
        };
        assert!(inf.solve(&task).unwrap() < 3);
    }

    #[test]
    fn test_from_checkpoint_reproduces_scores() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path());
        let cfg  = TrainConfig { model: tiny_config(), ..TrainConfig::default() };
        ckpt.save_config(&cfg).unwrap();

        let original = inferencer(cfg.objective);
        ckpt.save_model(&original.model, 1).unwrap();

        let restored = Inferencer::<CpuBackend>::from_checkpoint(&ckpt, Default::default()).unwrap();
        assert_eq!(restored.image_size(), 48);

        let a = glyph("a", 12, 48);
        let b = glyph("b", 240, 48);
        let before = original.similarity(&a, &b).unwrap();
        let after  = restored.similarity(&a, &b).unwrap();
        assert!((before - after).abs() < 1e-5);
    }
}
