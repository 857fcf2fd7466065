// ============================================================
// Layer 5 — Siamese Network
// ============================================================
// Two images go through the SAME convolutional encoder (one set
// of weights, called twice), the two embeddings are compared
// element by element, and a dense sigmoid layer turns the
// comparison into "probability these show the same character".
//
//   image A ─┐                          ┌─ embedding A ─┐
//            ├─ encoder (shared) ───────┤               ├─ distance ─ dense ─ σ ─ p(same)
//   image B ─┘                          └─ embedding B ─┘
//
// Encoder with the default config (105x105 grayscale input):
//
//   conv 64@10x10  + ReLU → [64, 96, 96]   → maxpool 2 → [64, 48, 48]
//   conv 128@7x7   + ReLU → [128, 42, 42]  → maxpool 2 → [128, 21, 21]
//   conv 128@4x4   + ReLU → [128, 18, 18]  → maxpool 2 → [128, 9, 9]
//   conv 256@4x4   + ReLU → [256, 6, 6]    → maxpool 2 → [256, 3, 3]
//   flatten (2304) → dense 4096 + sigmoid
//
// Reference: Koch et al. (2015) Siamese Neural Networks for
//            One-shot Image Recognition
//            Burn Book §3 (Building Blocks)

use anyhow::{bail, Result};
use burn::{
    module::Ignored,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::{relu, sigmoid},
};
use serde::{Deserialize, Serialize};

// ─── Distance Layer ───────────────────────────────────────────────────────────
/// How two embeddings are compared, element by element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistanceKind {
    /// |a - b|², i.e. (a - b)²
    SquaredDifference,
    /// |a - b| (component-wise L1)
    Absolute,
}

impl DistanceKind {
    /// Element-wise distance; output has the same shape as the inputs.
    pub fn apply<B: Backend>(&self, a: Tensor<B, 2>, b: Tensor<B, 2>) -> Tensor<B, 2> {
        let diff = a - b;
        match self {
            // Multiply instead of powf: pow() of a negative base is
            // undefined on some GPU backends.
            Self::SquaredDifference => diff.clone() * diff,
            Self::Absolute => diff.abs(),
        }
    }
}

// ─── Configuration ────────────────────────────────────────────────────────────
// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct SiameseConfig {
    /// Units in the prediction layer (1 = same/different)
    #[config(default = 1)]
    pub num_classes: usize,

    /// Input images are `image_size` x `image_size`, one channel
    #[config(default = 105)]
    pub image_size: usize,

    /// Filters per convolution block
    #[config(default = "vec![64, 128, 128, 256]")]
    pub conv_filters: Vec<usize>,

    /// Square kernel size per convolution block
    #[config(default = "vec![10, 7, 4, 4]")]
    pub conv_kernels: Vec<usize>,

    /// Max-pool kernel and stride after every convolution
    #[config(default = 2)]
    pub pool_size: usize,

    /// Width of the sigmoid embedding layer
    #[config(default = 4096)]
    pub embedding_dim: usize,

    #[config(default = "DistanceKind::SquaredDifference")]
    pub distance: DistanceKind,
}

impl SiameseConfig {
    /// Spatial side length after the last conv/pool block.
    pub fn feature_side(&self) -> Result<usize> {
        if self.conv_filters.is_empty() {
            bail!("At least one convolution block is required");
        }
        if self.conv_filters.len() != self.conv_kernels.len() {
            bail!(
                "conv_filters has {} entries but conv_kernels has {}",
                self.conv_filters.len(),
                self.conv_kernels.len()
            );
        }
        if self.pool_size == 0 {
            bail!("pool_size must be at least 1");
        }

        let mut side = self.image_size;
        for (block, &kernel) in self.conv_kernels.iter().enumerate() {
            if kernel == 0 || side < kernel {
                bail!(
                    "Block {} kernel {}x{} does not fit a {}x{} feature map",
                    block + 1, kernel, kernel, side, side
                );
            }
            // valid convolution, then pooling with stride = kernel
            side = (side - kernel + 1) / self.pool_size;
            if side == 0 {
                bail!(
                    "Block {} pools the feature map away; image_size {} is too small",
                    block + 1, self.image_size
                );
            }
        }
        Ok(side)
    }

    /// Number of features entering the embedding layer.
    pub fn flatten_size(&self) -> Result<usize> {
        let side = self.feature_side()?;
        // feature_side() guarantees conv_filters is non-empty
        let channels = self.conv_filters.last().copied().unwrap_or_default();
        Ok(channels * side * side)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<SiameseNetwork<B>> {
        let flatten_size = self.flatten_size()?;

        let mut in_channels = 1;
        let convs = self
            .conv_filters
            .iter()
            .zip(&self.conv_kernels)
            .map(|(&filters, &kernel)| {
                let conv = Conv2dConfig::new([in_channels, filters], [kernel, kernel])
                    .with_padding(PaddingConfig2d::Valid)
                    .init(device);
                in_channels = filters;
                conv
            })
            .collect();

        let pool = MaxPool2dConfig::new([self.pool_size, self.pool_size])
            .with_strides([self.pool_size, self.pool_size])
            .init();

        Ok(SiameseNetwork {
            convs,
            pool,
            dense:       LinearConfig::new(flatten_size, self.embedding_dim).init(device),
            prediction:  LinearConfig::new(self.embedding_dim, self.num_classes).init(device),
            distance:    Ignored(self.distance),
            num_classes: self.num_classes,
        })
    }
}

// ─── SiameseNetwork ───────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct SiameseNetwork<B: Backend> {
    /// Shared encoder convolutions (ReLU, each followed by `pool`)
    pub convs:       Vec<Conv2d<B>>,
    pub pool:        MaxPool2d,
    /// Shared encoder embedding layer (sigmoid)
    pub dense:       Linear<B>,
    /// Output layer applied to the distance vector (sigmoid)
    pub prediction:  Linear<B>,
    pub distance:    Ignored<DistanceKind>,
    pub num_classes: usize,
}

impl<B: Backend> SiameseNetwork<B> {
    /// Encoder: images [batch, 1, H, W] → embeddings [batch, embedding_dim]
    pub fn embed(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for conv in &self.convs {
            x = self.pool.forward(relu(conv.forward(x)));
        }
        let x = x.flatten::<2>(1, 3);
        sigmoid(self.dense.forward(x))
    }

    /// Element-wise distance between two embedding batches.
    pub fn distance(&self, a: Tensor<B, 2>, b: Tensor<B, 2>) -> Tensor<B, 2> {
        self.distance.0.apply(a, b)
    }

    /// first, second: [batch, 1, H, W] → probabilities [batch, num_classes]
    pub fn forward(&self, first: Tensor<B, 4>, second: Tensor<B, 4>) -> Tensor<B, 2> {
        let distance = self.distance(self.embed(first), self.embed(second));
        sigmoid(self.prediction.forward(distance))
    }

    pub fn distance_kind(&self) -> DistanceKind {
        self.distance.0
    }

    /// Output shape for a given input shape: the last dimension
    /// becomes `num_classes`.
    pub fn output_shape(&self, input_shape: &[usize]) -> Vec<usize> {
        let mut shape = input_shape.to_vec();
        if let Some(last) = shape.last_mut() {
            *last = self.num_classes;
        }
        shape
    }

    /// One-line description, e.g. `SiameseNetwork(num_classes=1)`.
    pub fn summary(&self) -> String {
        format!("SiameseNetwork(num_classes={})", self.num_classes)
    }
}

/// Copy a tensor's values to the host as f32.
pub fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Cannot read tensor data: {e:?}"))
}
