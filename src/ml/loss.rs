// ============================================================
// Layer 5 — Loss Functions
// ============================================================
// Hand-written objectives for the Siamese network:
//
//   binary_crossentropy  L = mean(-(t·ln p + (1-t)·ln(1-p)))
//
//   contrastive_loss     L = mean(-(t·ln p + (1-t)·ln(1-p))) + α
//                        The cross-entropy between the predicted
//                        "same character" probability and the pair
//                        target t ∈ {0, 1}, plus a small margin α.
//                        The λ·‖w‖² regulariser of the original
//                        formulation is applied through the
//                        optimizer's weight decay.
//
//   triplet_loss         L = Σ max(d(A,P) - d(A,N) + α, 0)
//                        Pushes every anchor-negative distance at
//                        least α above the anchor-positive distance.
//
// Predictions are clamped to [ε, 1-ε] before taking logs so a
// saturated sigmoid never produces ln(0).
//
// Reference: Koch et al. (2015) §3.1
//            Schroff et al. (2015) FaceNet

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ml::model::DistanceKind;

/// Clamp applied to probabilities before ln()
pub const EPSILON: f64 = 1e-7;

/// Default margin for contrastive and triplet losses
pub const DEFAULT_MARGIN: f64 = 0.2;

/// Which objective the training loop optimises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Objective {
    /// Pairs, plain binary cross-entropy on the prediction
    BinaryCrossentropy,
    /// Pairs, cross-entropy plus margin
    Contrastive,
    /// Triplets, margin between embedding distances
    Triplet,
}

impl Objective {
    pub fn uses_triplets(&self) -> bool {
        matches!(self, Self::Triplet)
    }
}

pub fn binary_crossentropy<B: Backend, const D: usize>(
    y_true: Tensor<B, D>,
    y_pred: Tensor<B, D>,
) -> Tensor<B, 1> {
    let p = y_pred.clamp(EPSILON, 1.0 - EPSILON);

    let log_p     = p.clone().log();
    let log_not_p = p.neg().add_scalar(1.0).log();
    let not_t     = y_true.clone().neg().add_scalar(1.0);

    (y_true * log_p + not_t * log_not_p).neg().mean()
}

pub fn contrastive_loss<B: Backend, const D: usize>(
    y_true: Tensor<B, D>,
    y_pred: Tensor<B, D>,
    alpha:  f64,
) -> Tensor<B, 1> {
    binary_crossentropy(y_true, y_pred).add_scalar(alpha)
}

/// `positive_dist`, `negative_dist`: [batch, 1] summed distances
/// anchor→positive and anchor→negative.
pub fn triplet_loss<B: Backend>(
    positive_dist: Tensor<B, 2>,
    negative_dist: Tensor<B, 2>,
    alpha:         f64,
) -> Tensor<B, 1> {
    (positive_dist - negative_dist)
        .add_scalar(alpha)
        .clamp_min(0.0)
        .sum()
}

/// Per-row distance between two embedding batches: [batch, dim] → [batch, 1]
pub fn pairwise_distance<B: Backend>(
    a:    Tensor<B, 2>,
    b:    Tensor<B, 2>,
    kind: DistanceKind,
) -> Tensor<B, 2> {
    kind.apply(a, b).sum_dim(1)
}
