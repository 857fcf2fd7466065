// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer is written against these traits, so
// evaluation logic can be exercised with a trivial scorer in
// tests while the real implementation runs the Siamese model.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::{bail, Result};

use crate::domain::glyph::Glyph;
use crate::domain::task::{best_match, OneShotTask};

// ─── GlyphSource ──────────────────────────────────────────────────────────────
/// Any component that can load character drawings.
///
/// Implementations:
///   - OmniglotLoader → walks an Omniglot image directory
pub trait GlyphSource {
    fn load_all(&self) -> Result<Vec<Glyph>>;
}

// ─── SimilarityScorer ─────────────────────────────────────────────────────────
/// Any component that can score how likely two drawings are to
/// show the same character. Higher means more similar.
///
/// Implementations:
///   - Inferencer → runs the trained Siamese network
pub trait SimilarityScorer {
    /// Score `query` against every drawing in `candidates`.
    fn scores(&self, query: &Glyph, candidates: &[Glyph]) -> Result<Vec<f32>>;

    /// Score a single pair of drawings.
    fn similarity(&self, first: &Glyph, second: &Glyph) -> Result<f32> {
        let scores = self.scores(first, std::slice::from_ref(second))?;
        match scores.first() {
            Some(&s) => Ok(s),
            None => bail!("Model produced no output for the pair"),
        }
    }

    /// Solve a one-shot task, returning the chosen support index.
    fn solve(&self, task: &OneShotTask) -> Result<usize> {
        let scores = self.scores(&task.query, &task.support)?;
        match best_match(&scores) {
            Some(i) => Ok(i),
            None => bail!("Cannot solve a task with an empty support set"),
        }
    }
}
