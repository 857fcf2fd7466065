// ============================================================
// Layer 4 — Glyph Index and Pair/Triplet Datasets
// ============================================================
// GlyphIndex groups drawings by character. The two datasets
// built on top of it implement Burn's Dataset trait so the
// DataLoader can call .get(index) and .len():
//
//   PairDataset    → (first, second, target)
//                    even index: same character,      target 1.0
//                    odd index:  different characters, target 0.0
//
//   TripletDataset → (anchor, positive, negative)
//                    anchor/positive share a character,
//                    negative shows a different one
//
// Samples are drawn on the fly from an RNG seeded with
// (seed, index), so a dataset is stateless and the same index
// always yields the same sample. Building a new dataset with a
// new seed each epoch gives fresh pairs every epoch.

use anyhow::{bail, Result};
use burn::data::dataset::Dataset;
use rand::{rngs::StdRng, seq::index, Rng, SeedableRng};
use std::{collections::BTreeMap, sync::Arc};

use crate::domain::glyph::{CharacterId, Glyph};

// ─── GlyphIndex ───────────────────────────────────────────────────────────────

/// All drawings of one character.
#[derive(Debug, Clone)]
pub struct CharacterClass {
    pub id:     CharacterId,
    pub glyphs: Vec<Glyph>,
}

/// Drawings grouped by character, in sorted character order.
#[derive(Debug, Clone, Default)]
pub struct GlyphIndex {
    classes:  Vec<CharacterClass>,
    /// Indices of classes holding at least two drawings
    pairable: Vec<usize>,
}

impl GlyphIndex {
    pub fn from_glyphs(glyphs: Vec<Glyph>) -> Self {
        let mut grouped: BTreeMap<CharacterId, Vec<Glyph>> = BTreeMap::new();
        for g in glyphs {
            grouped.entry(g.class.clone()).or_default().push(g);
        }
        Self::from_classes(
            grouped
                .into_iter()
                .map(|(id, glyphs)| CharacterClass { id, glyphs })
                .collect(),
        )
    }

    pub fn from_classes(classes: Vec<CharacterClass>) -> Self {
        let classes: Vec<CharacterClass> =
            classes.into_iter().filter(|c| !c.glyphs.is_empty()).collect();
        let pairable = classes
            .iter()
            .enumerate()
            .filter(|(_, c)| c.glyphs.len() >= 2)
            .map(|(i, _)| i)
            .collect();
        Self { classes, pairable }
    }

    pub fn into_classes(self) -> Vec<CharacterClass> {
        self.classes
    }

    pub fn classes(&self) -> &[CharacterClass] {
        &self.classes
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn glyph_count(&self) -> usize {
        self.classes.iter().map(|c| c.glyphs.len()).sum()
    }

    /// Indices of classes that can supply two distinct drawings.
    pub fn pairable(&self) -> &[usize] {
        &self.pairable
    }

    /// Both pair kinds need at least two characters and at least
    /// one character with two drawings.
    pub fn ensure_trainable(&self) -> Result<()> {
        if self.classes.len() < 2 {
            bail!(
                "Need at least 2 characters to build pairs, found {}",
                self.classes.len()
            );
        }
        if self.pairable.is_empty() {
            bail!("Need at least one character with 2 or more drawings");
        }
        Ok(())
    }

    /// Two different drawings of the same character.
    pub fn sample_same<R: Rng>(&self, rng: &mut R) -> (Glyph, Glyph) {
        let class = &self.classes[self.pairable[rng.gen_range(0..self.pairable.len())]];
        let picks = index::sample(rng, class.glyphs.len(), 2);
        (class.glyphs[picks.index(0)].clone(), class.glyphs[picks.index(1)].clone())
    }

    /// One drawing from each of two different characters.
    pub fn sample_different<R: Rng>(&self, rng: &mut R) -> (Glyph, Glyph) {
        let picks = index::sample(rng, self.classes.len(), 2);
        (
            self.random_glyph(picks.index(0), rng),
            self.random_glyph(picks.index(1), rng),
        )
    }

    /// Anchor and positive from one character, negative from another.
    pub fn sample_triplet<R: Rng>(&self, rng: &mut R) -> (Glyph, Glyph, Glyph) {
        let anchor_class = self.pairable[rng.gen_range(0..self.pairable.len())];
        let picks = index::sample(rng, self.classes[anchor_class].glyphs.len(), 2);

        // Uniform over every class except the anchor's
        let mut negative_class = rng.gen_range(0..self.classes.len() - 1);
        if negative_class >= anchor_class {
            negative_class += 1;
        }

        let glyphs = &self.classes[anchor_class].glyphs;
        (
            glyphs[picks.index(0)].clone(),
            glyphs[picks.index(1)].clone(),
            self.random_glyph(negative_class, rng),
        )
    }

    fn random_glyph<R: Rng>(&self, class: usize, rng: &mut R) -> Glyph {
        // Classes are never empty (filtered in from_classes)
        let glyphs = &self.classes[class].glyphs;
        glyphs[rng.gen_range(0..glyphs.len())].clone()
    }
}

/// Per-sample RNG so `get(index)` is reproducible and order-free.
fn sample_rng(seed: u64, index: usize) -> StdRng {
    StdRng::seed_from_u64(seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

// ─── PairDataset ──────────────────────────────────────────────────────────────

/// One labelled pair of drawings.
#[derive(Debug, Clone)]
pub struct PairSample {
    pub first:  Glyph,
    pub second: Glyph,
    /// 1.0 = same character, 0.0 = different characters
    pub target: f32,
}

pub struct PairDataset {
    index: Arc<GlyphIndex>,
    len:   usize,
    seed:  u64,
}

impl PairDataset {
    pub fn new(index: Arc<GlyphIndex>, len: usize, seed: u64) -> Result<Self> {
        index.ensure_trainable()?;
        Ok(Self { index, len, seed })
    }
}

impl Dataset<PairSample> for PairDataset {
    fn get(&self, index: usize) -> Option<PairSample> {
        if index >= self.len {
            return None;
        }
        let mut rng = sample_rng(self.seed, index);
        let (first, second) = if index % 2 == 0 {
            self.index.sample_same(&mut rng)
        } else {
            self.index.sample_different(&mut rng)
        };
        let target = if first.same_class(&second) { 1.0 } else { 0.0 };
        Some(PairSample { first, second, target })
    }

    fn len(&self) -> usize {
        self.len
    }
}

// ─── TripletDataset ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TripletSample {
    pub anchor:   Glyph,
    pub positive: Glyph,
    pub negative: Glyph,
}

pub struct TripletDataset {
    index: Arc<GlyphIndex>,
    len:   usize,
    seed:  u64,
}

impl TripletDataset {
    pub fn new(index: Arc<GlyphIndex>, len: usize, seed: u64) -> Result<Self> {
        index.ensure_trainable()?;
        Ok(Self { index, len, seed })
    }
}

impl Dataset<TripletSample> for TripletDataset {
    fn get(&self, index: usize) -> Option<TripletSample> {
        if index >= self.len {
            return None;
        }
        let (anchor, positive, negative) =
            self.index.sample_triplet(&mut sample_rng(self.seed, index));
        Some(TripletSample { anchor, positive, negative })
    }

    fn len(&self) -> usize {
        self.len
    }
}

/// Split an index by character into (train, validation) indices.
pub fn split_by_character<R: Rng>(
    index:          GlyphIndex,
    train_fraction: f64,
    rng:            &mut R,
) -> (GlyphIndex, GlyphIndex) {
    let mut classes = index.into_classes();
    // Sort first so the split depends only on the seed
    classes.sort_by(|a, b| a.id.cmp(&b.id));
    let (train, val) = crate::data::splitter::split_train_val(classes, train_fraction, rng);
    (GlyphIndex::from_classes(train), GlyphIndex::from_classes(val))
}
