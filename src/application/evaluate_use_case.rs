// ============================================================
// Layer 2 — Evaluate Use Case
// ============================================================
// N-way one-shot accuracy of a trained checkpoint:
//
//   Step 1: Load evaluation drawings  (Layer 4 - data)
//   Step 2: Sample K one-shot tasks   (Layer 4 - data)
//   Step 3: Solve each with the model (Layer 5 - ml)
//   Step 4: Report accuracy
//
// The evaluation directory should hold characters the model
// never saw during training (Omniglot's `images_evaluation`).
//
// Reference: Koch et al. (2015) §4.3

use anyhow::{bail, Result};
use rand::{rngs::StdRng, SeedableRng};

use crate::application::compare_use_case::{load_scorer, LoadedScorer};
use crate::data::{
    dataset::GlyphIndex,
    loader::OmniglotLoader,
    preprocessor::Preprocessor,
    task::TaskSampler,
};
use crate::domain::{
    task::OneShotTask,
    traits::{GlyphSource, SimilarityScorer},
};
use crate::infra::backend::DeviceKind;

#[derive(Debug, Clone)]
pub struct EvaluateConfig {
    pub data_dir:       String,
    pub checkpoint_dir: String,
    pub n_way:          usize,
    pub trials:         usize,
    pub seed:           u64,
    /// Overrides the device stored in the checkpoint config
    pub device:         Option<DeviceKind>,
}

impl Default for EvaluateConfig {
    fn default() -> Self {
        Self {
            data_dir:       "data/images_evaluation".to_string(),
            checkpoint_dir: "checkpoints".to_string(),
            n_way:          20,
            trials:         400,
            seed:           42,
            device:         None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationReport {
    pub n_way:   usize,
    pub trials:  usize,
    pub correct: usize,
}

impl EvaluationReport {
    pub fn accuracy(&self) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            self.correct as f64 / self.trials as f64
        }
    }

    /// Accuracy of guessing uniformly at random
    pub fn chance(&self) -> f64 {
        if self.n_way == 0 { 0.0 } else { 1.0 / self.n_way as f64 }
    }
}

/// Solve every task and count the correct answers.
pub fn evaluate_tasks<S: SimilarityScorer + ?Sized>(
    scorer: &S,
    tasks:  &[OneShotTask],
) -> Result<EvaluationReport> {
    let Some(first) = tasks.first() else {
        bail!("No tasks to evaluate");
    };

    let mut correct = 0;
    for (i, task) in tasks.iter().enumerate() {
        let predicted = scorer.solve(task)?;
        if task.is_correct(predicted) {
            correct += 1;
        }
        tracing::debug!(
            "Task {}: predicted {} (answer {})",
            i + 1,
            predicted,
            task.answer
        );
    }

    Ok(EvaluationReport { n_way: first.n_way(), trials: tasks.len(), correct })
}

pub struct EvaluateUseCase {
    config: EvaluateConfig,
}

impl EvaluateUseCase {
    pub fn new(config: EvaluateConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<EvaluationReport> {
        let cfg = &self.config;
        let LoadedScorer { scorer, image_size } = load_scorer(&cfg.checkpoint_dir, cfg.device)?;

        // ── Step 1: Evaluation drawings at the model's input size ─────────────
        tracing::info!("Loading evaluation drawings from '{}'", cfg.data_dir);
        let glyphs = OmniglotLoader::new(&cfg.data_dir, Preprocessor::new(image_size)).load_all()?;
        let index  = GlyphIndex::from_glyphs(glyphs);
        tracing::info!(
            "Loaded {} drawings of {} characters",
            index.glyph_count(),
            index.class_count()
        );

        // ── Step 2: Tasks ─────────────────────────────────────────────────────
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let tasks = TaskSampler::new(&index).sample_many(&mut rng, cfg.n_way, cfg.trials)?;

        // ── Step 3 + 4: Solve and score ───────────────────────────────────────
        let report = evaluate_tasks(scorer.as_ref(), &tasks)?;
        tracing::info!(
            "{}-way one-shot accuracy: {:.1}% over {} tasks",
            report.n_way,
            report.accuracy() * 100.0,
            report.trials
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::tests::synthetic_index;
    use crate::domain::glyph::Glyph;

    /// Negative mean pixel difference: finds the drawing of the
    /// same synthetic class every time.
    struct PixelScorer;

    impl SimilarityScorer for PixelScorer {
        fn scores(&self, query: &Glyph, candidates: &[Glyph]) -> Result<Vec<f32>> {
            Ok(candidates
                .iter()
                .map(|c| {
                    -query
                        .normalized()
                        .zip(c.normalized())
                        .map(|(a, b)| (a - b).abs())
                        .sum::<f32>()
                })
                .collect())
        }
    }

    /// Same score for everything: always answers slot 0.
    struct ConstantScorer;

    impl SimilarityScorer for ConstantScorer {
        fn scores(&self, _query: &Glyph, candidates: &[Glyph]) -> Result<Vec<f32>> {
            Ok(vec![0.5; candidates.len()])
        }
    }

    fn tasks(n_way: usize, count: usize) -> Vec<OneShotTask> {
        let index = synthetic_index(10, 3, 4);
        let mut rng = StdRng::seed_from_u64(3);
        TaskSampler::new(&index).sample_many(&mut rng, n_way, count).unwrap()
    }

    #[test]
    fn test_perfect_scorer() {
        let report = evaluate_tasks(&PixelScorer, &tasks(5, 30)).unwrap();
        assert_eq!(report.trials, 30);
        assert_eq!(report.n_way, 5);
        assert_eq!(report.correct, 30);
        assert!((report.accuracy() - 1.0).abs() < 1e-12);
        assert!((report.chance() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_constant_scorer_only_hits_slot_zero() {
        let tasks    = tasks(4, 40);
        let expected = tasks.iter().filter(|t| t.answer == 0).count();
        let report   = evaluate_tasks(&ConstantScorer, &tasks).unwrap();
        assert_eq!(report.correct, expected);
        assert!(report.accuracy() < 1.0);
    }

    #[test]
    fn test_no_tasks_is_an_error() {
        assert!(evaluate_tasks(&PixelScorer, &[]).is_err());
    }
}
