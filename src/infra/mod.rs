// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by several layers:
//
//   checkpoint.rs — model weights via Burn's CompactRecorder,
//                   plus the TrainConfig JSON needed to rebuild
//                   the architecture for inference
//
//   metrics.rs    — per-epoch metrics appended to a CSV file
//
//   interrupt.rs  — Ctrl-C → shared flag checked by the
//                   training loop
//
//   backend.rs    — GPU (wgpu) or CPU (ndarray) backend choice
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

/// Ctrl-C handling for the training loop
pub mod interrupt;

/// Backend aliases and device selection
pub mod backend;
