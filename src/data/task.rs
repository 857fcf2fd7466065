// ============================================================
// Layer 4 — One-Shot Task Sampler
// ============================================================
// Draws N-way one-shot tasks from a GlyphIndex:
//
//   1. Pick N distinct characters. When one alphabet holds at
//      least N usable characters the task stays inside that
//      alphabet (harder: similar-looking letters compete).
//   2. For the first ("target") character pick two different
//      drawings: one is the query, the other its support entry.
//   3. Every other character contributes one support drawing.
//   4. Shuffle the support set and record where the target went.
//
// Reference: Koch et al. (2015) §4.3 one-shot evaluation

use anyhow::{bail, Result};
use rand::{seq::index, seq::SliceRandom, Rng};
use std::collections::BTreeMap;

use crate::data::dataset::GlyphIndex;
use crate::domain::task::OneShotTask;

pub struct TaskSampler<'a> {
    index:       &'a GlyphIndex,
    /// Pairable class indices grouped by alphabet
    by_alphabet: Vec<Vec<usize>>,
}

impl<'a> TaskSampler<'a> {
    pub fn new(index: &'a GlyphIndex) -> Self {
        let mut grouped: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for &i in index.pairable() {
            grouped
                .entry(index.classes()[i].id.alphabet.as_str())
                .or_default()
                .push(i);
        }
        Self { index, by_alphabet: grouped.into_values().collect() }
    }

    pub fn sample<R: Rng>(&self, rng: &mut R, n_way: usize) -> Result<OneShotTask> {
        if n_way < 2 {
            bail!("A one-shot task needs at least 2 candidates, got {n_way}");
        }
        let pairable = self.index.pairable();
        if pairable.len() < n_way {
            bail!(
                "Only {} characters have two or more drawings; cannot build {}-way tasks",
                pairable.len(),
                n_way
            );
        }

        let alphabets: Vec<&Vec<usize>> =
            self.by_alphabet.iter().filter(|a| a.len() >= n_way).collect();
        let pool: &[usize] = match alphabets.choose(rng) {
            Some(alphabet) => alphabet.as_slice(),
            None => pairable,
        };

        let chosen: Vec<usize> = index::sample(rng, pool.len(), n_way)
            .into_iter()
            .map(|i| pool[i])
            .collect();

        let classes = self.index.classes();
        let target  = &classes[chosen[0]].glyphs;
        let drawers = index::sample(rng, target.len(), 2);
        let query   = target[drawers.index(0)].clone();

        let mut support = vec![(true, target[drawers.index(1)].clone())];
        for &c in &chosen[1..] {
            let glyphs = &classes[c].glyphs;
            support.push((false, glyphs[rng.gen_range(0..glyphs.len())].clone()));
        }
        support.shuffle(rng);

        let answer = support
            .iter()
            .position(|(is_target, _)| *is_target)
            .unwrap_or_default();

        Ok(OneShotTask {
            query,
            support: support.into_iter().map(|(_, g)| g).collect(),
            answer,
        })
    }

    pub fn sample_many<R: Rng>(
        &self,
        rng:   &mut R,
        n_way: usize,
        count: usize,
    ) -> Result<Vec<OneShotTask>> {
        (0..count).map(|_| self.sample(rng, n_way)).collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::tests::synthetic_index;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_task_structure() {
        let idx     = synthetic_index(12, 3, 2);
        let sampler = TaskSampler::new(&idx);
        let mut rng = StdRng::seed_from_u64(11);

        for task in sampler.sample_many(&mut rng, 5, 20).unwrap() {
            assert_eq!(task.n_way(), 5);
            let answer = &task.support[task.answer];
            assert!(answer.same_class(&task.query));
            assert_ne!(answer.source, task.query.source);

            // Exactly one support drawing matches the query
            let matches = task.support.iter().filter(|g| g.same_class(&task.query)).count();
            assert_eq!(matches, 1);
        }
    }

    #[test]
    fn test_prefers_single_alphabet() {
        // synthetic_index spreads 12 classes across two alphabets (6 each)
        let idx     = synthetic_index(12, 2, 2);
        let sampler = TaskSampler::new(&idx);
        let mut rng = StdRng::seed_from_u64(5);

        let task = sampler.sample(&mut rng, 4).unwrap();
        let alphabet = &task.query.class.alphabet;
        assert!(task.support.iter().all(|g| &g.class.alphabet == alphabet));
    }

    #[test]
    fn test_falls_back_across_alphabets() {
        // 6 per alphabet, 8-way → must mix alphabets
        let idx     = synthetic_index(12, 2, 2);
        let sampler = TaskSampler::new(&idx);
        let task = sampler.sample(&mut StdRng::seed_from_u64(1), 8).unwrap();
        assert_eq!(task.n_way(), 8);
    }

    #[test]
    fn test_rejects_too_few_characters() {
        let idx     = synthetic_index(3, 2, 2);
        let sampler = TaskSampler::new(&idx);
        assert!(sampler.sample(&mut StdRng::seed_from_u64(0), 5).is_err());
        assert!(sampler.sample(&mut StdRng::seed_from_u64(0), 1).is_err());
    }
}
