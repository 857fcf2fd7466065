// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `train`, `compare` and
// `evaluate`, and all their configurable flags.
//
// Training flags are optional: anything left out keeps the
// value from `--config <file.json>` if given, otherwise the
// built-in default. So a saved `train_config.json` can be
// re-run with just one or two values changed.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::{evaluate_use_case::EvaluateConfig, train_use_case::TrainConfig};
use crate::infra::backend::DeviceKind;
use crate::ml::{loss::Objective, model::DistanceKind};

/// The top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the Siamese network on an Omniglot-style image directory
    Train(TrainArgs),

    /// Score how likely two drawings show the same character
    Compare(CompareArgs),

    /// Measure N-way one-shot accuracy on unseen characters
    Evaluate(EvaluateArgs),
}

// ─── Value enums ──────────────────────────────────────────────────────────────
// clap-facing mirrors of the application enums, so the
// application layer never depends on clap.

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ObjectiveArg {
    BinaryCrossentropy,
    Contrastive,
    Triplet,
}

impl From<ObjectiveArg> for Objective {
    fn from(a: ObjectiveArg) -> Self {
        match a {
            ObjectiveArg::BinaryCrossentropy => Objective::BinaryCrossentropy,
            ObjectiveArg::Contrastive        => Objective::Contrastive,
            ObjectiveArg::Triplet            => Objective::Triplet,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum DeviceArg {
    /// GPU through WebGPU
    Wgpu,
    /// CPU through ndarray
    Cpu,
}

impl From<DeviceArg> for DeviceKind {
    fn from(a: DeviceArg) -> Self {
        match a {
            DeviceArg::Wgpu => DeviceKind::Wgpu,
            DeviceArg::Cpu  => DeviceKind::Cpu,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum DistanceArg {
    /// (a - b)²
    SquaredDifference,
    /// |a - b|
    Absolute,
}

impl From<DistanceArg> for DistanceKind {
    fn from(a: DistanceArg) -> Self {
        match a {
            DistanceArg::SquaredDifference => DistanceKind::SquaredDifference,
            DistanceArg::Absolute          => DistanceKind::Absolute,
        }
    }
}

// ─── train ────────────────────────────────────────────────────────────────────

/// All arguments for the `train` command.
#[derive(Args, Debug, Default)]
pub struct TrainArgs {
    /// JSON training config to start from (e.g. a saved train_config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory laid out as <alphabet>/<character>/<drawing>.png
    /// [default: data/images_background]
    #[arg(long)]
    pub train_dir: Option<String>,

    /// Separate validation directory; without it, characters are
    /// held out of --train-dir
    #[arg(long)]
    pub valid_dir: Option<String>,

    /// Where checkpoints, metrics.csv and train_config.json go [default: checkpoints]
    #[arg(long)]
    pub checkpoint_dir: Option<String>,

    /// Share of characters held out for validation [default: 0.2]
    #[arg(long)]
    pub validation_fraction: Option<f64>,

    /// Validation batches per epoch [default: 64]
    #[arg(long)]
    pub validation_steps: Option<usize>,

    /// Pairs (or triplets) per batch [default: 64]
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Epochs to train in this run, on top of any resumed checkpoint [default: 1]
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Batches per epoch [default: 128]
    #[arg(long)]
    pub steps_per_epoch: Option<usize>,

    /// Adam learning rate [default: 0.001]
    #[arg(long)]
    pub lr: Option<f64>,

    /// L2 penalty applied by the optimizer [default: 0]
    #[arg(long)]
    pub weight_decay: Option<f64>,

    /// Alpha in the contrastive and triplet losses [default: 0.2]
    #[arg(long)]
    pub margin: Option<f64>,

    /// Loss to optimise [default: contrastive]
    #[arg(long, value_enum)]
    pub objective: Option<ObjectiveArg>,

    /// Seed for pair sampling and the validation split [default: 42]
    #[arg(long)]
    pub seed: Option<u64>,

    /// Data loader worker threads [default: 1]
    #[arg(long)]
    pub num_workers: Option<usize>,

    /// Debug-log the running loss every N batches [default: 16]
    #[arg(long)]
    pub log_interval: Option<usize>,

    /// Start from scratch even if a checkpoint exists
    #[arg(long)]
    pub no_resume: bool,

    /// Backend to train on [default: wgpu]
    #[arg(long, value_enum)]
    pub device: Option<DeviceArg>,

    /// Side length images are resized to [default: 105]
    #[arg(long)]
    pub image_size: Option<usize>,

    /// Filters per conv block, comma separated [default: 64,128,128,256]
    #[arg(long, value_delimiter = ',')]
    pub conv_filters: Option<Vec<usize>>,

    /// Kernel size per conv block, comma separated [default: 10,7,4,4]
    #[arg(long, value_delimiter = ',')]
    pub conv_kernels: Option<Vec<usize>>,

    /// Max-pool size after each conv block [default: 2]
    #[arg(long)]
    pub pool_size: Option<usize>,

    /// Width of the embedding layer [default: 4096]
    #[arg(long)]
    pub embedding_dim: Option<usize>,

    /// Elementwise distance between embeddings [default: squared-difference]
    #[arg(long, value_enum)]
    pub distance: Option<DistanceArg>,
}

impl TrainArgs {
    /// Overlay every flag that was given onto `base`.
    pub fn apply(self, base: TrainConfig) -> TrainConfig {
        let mut cfg = base;

        if let Some(v) = self.train_dir           { cfg.train_dir = v; }
        if let Some(v) = self.valid_dir           { cfg.valid_dir = Some(v); }
        if let Some(v) = self.checkpoint_dir      { cfg.checkpoint_dir = v; }
        if let Some(v) = self.validation_fraction { cfg.validation_fraction = v; }
        if let Some(v) = self.validation_steps    { cfg.validation_steps = v; }
        if let Some(v) = self.batch_size          { cfg.batch_size = v; }
        if let Some(v) = self.epochs              { cfg.epochs = v; }
        if let Some(v) = self.steps_per_epoch     { cfg.steps_per_epoch = v; }
        if let Some(v) = self.lr                  { cfg.lr = v; }
        if let Some(v) = self.weight_decay        { cfg.weight_decay = v; }
        if let Some(v) = self.margin              { cfg.margin = v; }
        if let Some(v) = self.objective           { cfg.objective = v.into(); }
        if let Some(v) = self.seed                { cfg.seed = v; }
        if let Some(v) = self.num_workers         { cfg.num_workers = v; }
        if let Some(v) = self.log_interval        { cfg.log_interval = v; }
        if self.no_resume                         { cfg.resume = false; }
        if let Some(v) = self.device              { cfg.device = v.into(); }

        // Architecture
        if let Some(v) = self.image_size          { cfg.model.image_size = v; }
        if let Some(v) = self.conv_filters        { cfg.model.conv_filters = v; }
        if let Some(v) = self.conv_kernels        { cfg.model.conv_kernels = v; }
        if let Some(v) = self.pool_size           { cfg.model.pool_size = v; }
        if let Some(v) = self.embedding_dim       { cfg.model.embedding_dim = v; }
        if let Some(v) = self.distance            { cfg.model.distance = v.into(); }

        cfg
    }
}

/// Flags over the built-in defaults. Layer 2 only ever sees the
/// resulting TrainConfig, never clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        a.apply(TrainConfig::default())
    }
}

// ─── compare ──────────────────────────────────────────────────────────────────

/// All arguments for the `compare` command
#[derive(Args, Debug)]
pub struct CompareArgs {
    /// First drawing (PNG)
    pub first: PathBuf,

    /// Second drawing (PNG)
    pub second: PathBuf,

    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Backend override; defaults to the one used for training
    #[arg(long, value_enum)]
    pub device: Option<DeviceArg>,
}

// ─── evaluate ─────────────────────────────────────────────────────────────────

/// All arguments for the `evaluate` command
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Directory of characters not used in training
    #[arg(long, default_value = "data/images_evaluation")]
    pub data_dir: String,

    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Candidate characters per task
    #[arg(long, default_value_t = 20)]
    pub n_way: usize,

    /// Number of tasks to sample
    #[arg(long, default_value_t = 400)]
    pub trials: usize,

    /// Seed for task sampling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Backend override; defaults to the one used for training
    #[arg(long, value_enum)]
    pub device: Option<DeviceArg>,
}

impl From<EvaluateArgs> for EvaluateConfig {
    fn from(a: EvaluateArgs) -> Self {
        EvaluateConfig {
            data_dir:       a.data_dir,
            checkpoint_dir: a.checkpoint_dir,
            n_way:          a.n_way,
            trials:         a.trials,
            seed:           a.seed,
            device:         a.device.map(Into::into),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(subcommand)]
        command: Commands,
    }

    fn parse(args: &[&str]) -> Commands {
        TestCli::try_parse_from(std::iter::once("test").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn test_train_defaults() {
        let Commands::Train(args) = parse(&["train"]) else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        let def = TrainConfig::default();
        assert_eq!(cfg.batch_size, def.batch_size);
        assert_eq!(cfg.model.conv_filters, vec![64, 128, 128, 256]);
        assert!(cfg.resume);
    }

    #[test]
    fn test_train_flags_override() {
        let Commands::Train(args) = parse(&[
            "train",
            "--epochs", "3",
            "--objective", "triplet",
            "--device", "cpu",
            "--conv-filters", "8,16,16,32",
            "--distance", "absolute",
            "--no-resume",
        ]) else {
            panic!("expected train")
        };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.epochs, 3);
        assert_eq!(cfg.objective, Objective::Triplet);
        assert_eq!(cfg.device, DeviceKind::Cpu);
        assert_eq!(cfg.model.conv_filters, vec![8, 16, 16, 32]);
        assert_eq!(cfg.model.distance, DistanceKind::Absolute);
        assert!(!cfg.resume);
    }

    #[test]
    fn test_flags_overlay_a_base_config() {
        let base = TrainConfig { epochs: 9, lr: 0.5, ..TrainConfig::default() };
        let args = TrainArgs { lr: Some(0.01), ..TrainArgs::default() };
        let cfg  = args.apply(base);
        assert_eq!(cfg.epochs, 9);
        assert_eq!(cfg.lr, 0.01);
    }

    #[test]
    fn test_compare_and_evaluate() {
        let Commands::Compare(args) = parse(&["compare", "a.png", "b.png", "--device", "cpu"]) else {
            panic!("expected compare")
        };
        assert_eq!(args.first, PathBuf::from("a.png"));
        assert!(matches!(args.device, Some(DeviceArg::Cpu)));

        let Commands::Evaluate(args) = parse(&["evaluate", "--n-way", "5"]) else {
            panic!("expected evaluate")
        };
        let cfg: EvaluateConfig = args.into();
        assert_eq!(cfg.n_way, 5);
        assert_eq!(cfg.trials, 400);
        assert_eq!(cfg.device, None);
    }
}
