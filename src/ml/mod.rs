// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// The network, its losses, and the code that trains and runs
// it. Tensor math lives here; the data layer only turns
// drawings into tensors.
//
//   model.rs      — twin convolutional encoder with shared
//                   weights, elementwise distance layer and a
//                   sigmoid same/different head
//
//   loss.rs       — binary cross-entropy, contrastive and
//                   triplet losses, row-wise embedding distance
//
//   trainer.rs    — epoch loop: pair/triplet sampling, Adam,
//                   validation, checkpoints, Ctrl-C handling
//
//   inferencer.rs — loads a checkpoint and scores drawings
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Koch et al. (2015) Siamese Neural Networks for
//            One-shot Image Recognition

/// Siamese convolutional network
pub mod model;

/// Loss functions
pub mod loss;

/// Training loop with validation and checkpointing
pub mod trainer;

/// Checkpoint-backed similarity scoring
pub mod inferencer;
