// ============================================================
// Layer 4 — Pair and Triplet Batchers
// ============================================================
// Implements Burn's Batcher trait to convert a Vec of samples
// into tensors the Siamese network can consume.
//
// Image tensors use the NCHW layout Burn's Conv2d expects:
//   [batch_size, 1, side, side]
//
// Every glyph's u8 pixels are scaled to f32 in [0, 1] and laid
// out one after another, then reshaped:
//   [g1_p1, ..., g1_pS², g2_p1, ..., gN_pS²] → [N, 1, S, S]
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::{PairSample, TripletSample};
use crate::domain::glyph::Glyph;

/// Stack glyphs into a single `[n, 1, side, side]` tensor.
/// All glyphs must share the same side length.
pub fn stack_glyphs<'a, B: Backend>(
    glyphs: impl IntoIterator<Item = &'a Glyph>,
    device: &B::Device,
) -> Tensor<B, 4> {
    let mut side  = 0;
    let mut count = 0;
    let mut flat: Vec<f32> = Vec::new();

    for g in glyphs {
        side   = g.side;
        count += 1;
        flat.extend(g.normalized());
    }

    Tensor::<B, 4>::from_data(TensorData::new(flat, [count, 1, side, side]), device)
}

// ─── PairBatch ────────────────────────────────────────────────────────────────
/// A batch of labelled pairs ready for the forward pass.
#[derive(Debug, Clone)]
pub struct PairBatch<B: Backend> {
    /// Left images, shape [batch_size, 1, side, side]
    pub first: Tensor<B, 4>,

    /// Right images, shape [batch_size, 1, side, side]
    pub second: Tensor<B, 4>,

    /// Targets, shape [batch_size, 1], 1.0 = same character
    pub targets: Tensor<B, 2>,
}

#[derive(Clone, Debug)]
pub struct PairBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> PairBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<PairSample, PairBatch<B>> for PairBatcher<B> {
    fn batch(&self, items: Vec<PairSample>) -> PairBatch<B> {
        let batch_size = items.len();

        let first  = stack_glyphs::<B>(items.iter().map(|s| &s.first), &self.device);
        let second = stack_glyphs::<B>(items.iter().map(|s| &s.second), &self.device);

        let targets: Vec<f32> = items.iter().map(|s| s.target).collect();
        let targets = Tensor::<B, 2>::from_data(
            TensorData::new(targets, [batch_size, 1]),
            &self.device,
        );

        PairBatch { first, second, targets }
    }
}

// ─── TripletBatch ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct TripletBatch<B: Backend> {
    pub anchor:   Tensor<B, 4>,
    pub positive: Tensor<B, 4>,
    pub negative: Tensor<B, 4>,
}

#[derive(Clone, Debug)]
pub struct TripletBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> TripletBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<TripletSample, TripletBatch<B>> for TripletBatcher<B> {
    fn batch(&self, items: Vec<TripletSample>) -> TripletBatch<B> {
        TripletBatch {
            anchor:   stack_glyphs::<B>(items.iter().map(|s| &s.anchor), &self.device),
            positive: stack_glyphs::<B>(items.iter().map(|s| &s.positive), &self.device),
            negative: stack_glyphs::<B>(items.iter().map(|s| &s.negative), &self.device),
        }
    }
}
