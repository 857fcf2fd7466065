// ============================================================
// Layer 3 — One-Shot Task
// ============================================================
// An N-way one-shot task:
//   - one query drawing of an unknown character
//   - N support drawings, one for each candidate character
//   - exactly one support drawing shows the query's character
//
// A model solves the task by picking the support drawing it
// considers most similar to the query.
//
// Reference: Lake et al. (2015) Human-level concept learning
//            Koch et al. (2015) Siamese Neural Networks for
//            One-shot Image Recognition

use crate::domain::glyph::Glyph;

#[derive(Debug, Clone)]
pub struct OneShotTask {
    pub query:   Glyph,
    pub support: Vec<Glyph>,
    /// Index into `support` of the drawing matching `query`
    pub answer:  usize,
}

impl OneShotTask {
    pub fn n_way(&self) -> usize {
        self.support.len()
    }

    pub fn is_correct(&self, predicted: usize) -> bool {
        predicted == self.answer
    }
}

/// Index of the highest score. Ties resolve to the first index.
/// Returns None for an empty slice.
pub fn best_match(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_match_picks_highest() {
        assert_eq!(best_match(&[0.1, 0.9, 0.3]), Some(1));
    }

    #[test]
    fn test_best_match_ties_keep_first() {
        assert_eq!(best_match(&[0.5, 0.5, 0.2]), Some(0));
    }

    #[test]
    fn test_best_match_empty() {
        assert_eq!(best_match(&[]), None);
    }
}
