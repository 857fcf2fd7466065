// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from Omniglot PNG files to GPU-ready batches:
//
//   images_background/<alphabet>/<character>/*.png
//       │
//       ▼
//   OmniglotLoader    → walks the tree, decodes each drawing
//       │
//       ▼
//   Preprocessor      → grayscale, resize, invert
//       │
//       ▼
//   GlyphIndex        → drawings grouped by character
//       │
//       ├──► split_by_character → train / validation characters
//       │
//       ▼
//   PairDataset /     → implement Burn's Dataset trait,
//   TripletDataset      sampling pairs or triplets on the fly
//       │
//       ▼
//   PairBatcher /     → stack samples into [N, 1, S, S] tensors
//   TripletBatcher
//
//   TaskSampler       → N-way one-shot tasks for evaluation
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Walks an Omniglot image directory
pub mod loader;

/// Decodes and normalises drawings
pub mod preprocessor;

/// Glyph index plus Burn Dataset implementations
pub mod dataset;

/// Burn Batcher implementations
pub mod batcher;

/// Seeded train/validation split
pub mod splitter;

/// N-way one-shot task sampling
pub mod task;
