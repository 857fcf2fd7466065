// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Train + validation loop using Burn's DataLoader and Adam.
//
//   for each epoch:
//     - sample fresh pairs (or triplets) with seed + epoch
//     - forward → loss → backward → Adam step, per batch
//     - stop early if Ctrl-C raised the interrupt flag
//     - validate on held-out characters (plain backend, no autodiff)
//     - append metrics.csv, save model_epoch_{n}
//
// With `resume` set and a checkpoint present, training picks up
// at the epoch after the latest saved one and runs `epochs` more.
// Resuming with a different architecture is refused.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{bail, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{decay::WeightDecayConfig, AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::sync::Arc;

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{PairBatch, PairBatcher, TripletBatch, TripletBatcher},
    dataset::{GlyphIndex, PairDataset, TripletDataset},
};
use crate::infra::{
    backend::{gpu_device, CpuTrainBackend, DeviceKind, GpuTrainBackend},
    checkpoint::CheckpointManager,
    interrupt::InterruptFlag,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::loss::{
    binary_crossentropy, contrastive_loss, pairwise_distance, triplet_loss, Objective,
};
use crate::ml::model::{tensor_to_vec, SiameseNetwork};

/// Mixed into the seed so validation samples differ from any training epoch
const VALIDATION_SALT: u64 = 0x5EED_0F_0A11D;

#[derive(Debug, Clone, Copy)]
pub struct ValidationMetrics {
    pub loss:     f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// Epoch of the last checkpoint written (0 = none)
    pub last_epoch:      usize,
    /// Epochs trained during this run
    pub epochs_run:      usize,
    pub interrupted:     bool,
    pub last_train_loss: f64,
    pub last_validation: Option<ValidationMetrics>,
}

pub fn run_training(
    cfg:         &TrainConfig,
    train_index: GlyphIndex,
    val_index:   Option<GlyphIndex>,
    ckpt:        &CheckpointManager,
    interrupt:   &InterruptFlag,
) -> Result<TrainingReport> {
    match cfg.device {
        DeviceKind::Wgpu => {
            let device = gpu_device();
            tracing::info!("Using WGPU device: {:?}", device);
            train_loop::<GpuTrainBackend>(cfg, train_index, val_index, ckpt, interrupt, device)
        }
        DeviceKind::Cpu => {
            tracing::info!("Using CPU (ndarray) backend");
            train_loop::<CpuTrainBackend>(cfg, train_index, val_index, ckpt, interrupt, Default::default())
        }
    }
}

pub fn train_loop<B: AutodiffBackend>(
    cfg:         &TrainConfig,
    train_index: GlyphIndex,
    val_index:   Option<GlyphIndex>,
    ckpt:        &CheckpointManager,
    interrupt:   &InterruptFlag,
    device:      B::Device,
) -> Result<TrainingReport> {
    if cfg.model.num_classes != 1 {
        bail!(
            "Pair and triplet training need num_classes = 1, got {}",
            cfg.model.num_classes
        );
    }
    if cfg.batch_size == 0 || cfg.steps_per_epoch == 0 {
        bail!("batch_size and steps_per_epoch must both be at least 1");
    }
    train_index.ensure_trainable()?;
    let train_index = Arc::new(train_index);

    // ── Build or restore model ────────────────────────────────────────────────
    let mut model: SiameseNetwork<B> = cfg.model.init(&device)?;
    let mut start_epoch = 1;
    if cfg.resume {
        if let Some(epoch) = ckpt.latest_epoch()? {
            // Saved weights only fit the architecture they were trained with
            ckpt.ensure_same_architecture(&cfg.model)?;
            model = ckpt.load_model(model, &device)?;
            start_epoch = epoch + 1;
            tracing::info!("Resuming training after epoch {}", epoch);
        }
    }
    // Each run trains `epochs` more epochs on top of the checkpoint
    let end_epoch = start_epoch - 1 + cfg.epochs;

    // Only after the architecture check
    ckpt.save_config(cfg)?;

    tracing::info!(
        "Model ready: {} | embedding_dim={} | distance={:?} | objective={:?}",
        model.summary(),
        cfg.model.embedding_dim,
        model.distance_kind(),
        cfg.objective,
    );

    // ── Adam (+ optional L2 weight decay) ─────────────────────────────────────
    let weight_decay = (cfg.weight_decay > 0.0).then(|| WeightDecayConfig::new(cfg.weight_decay as f32));
    let mut optim = AdamConfig::new()
        .with_weight_decay(weight_decay)
        .init::<B, SiameseNetwork<B>>();

    let metrics = MetricsLogger::new(ckpt.dir())?;

    // ── Validation loader (InnerBackend, no autodiff) ──────────────────────────
    let validation = match val_index {
        Some(index) => Some(ValidationLoader::<B::InnerBackend>::new(
            Arc::new(index),
            cfg,
            device.clone(),
        )?),
        None => None,
    };

    let mut report = TrainingReport {
        last_epoch:      start_epoch - 1,
        epochs_run:      0,
        interrupted:     false,
        last_train_loss: f64::NAN,
        last_validation: None,
    };

    if cfg.epochs == 0 {
        tracing::warn!("epochs = 0; nothing to train");
    }

    let mut best_val_loss = f64::INFINITY;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in start_epoch..=end_epoch {
        let seed = cfg.seed.wrapping_add(epoch as u64);

        let (next_model, outcome) = if cfg.objective.uses_triplets() {
            triplet_epoch(model, &mut optim, &train_index, cfg, seed, &device, interrupt)?
        } else {
            pair_epoch(model, &mut optim, &train_index, cfg, seed, &device, interrupt)?
        };
        model = next_model;

        if outcome.interrupted {
            // Keep whatever the interrupted epoch learned
            tracing::warn!(
                "Training interrupted by user! ({} batches into epoch {})",
                outcome.batches,
                epoch
            );
            ckpt.save_model(&model, epoch)?;
            report.last_epoch  = epoch;
            report.interrupted = true;
            break;
        }

        let validation = match &validation {
            Some(loader) => Some(loader.run(&model.valid(), cfg)?),
            None => None,
        };

        let train_loss = outcome.mean_loss();
        let (val_loss, val_acc) = validation
            .map(|v| (v.loss, v.accuracy))
            .unwrap_or((f64::NAN, f64::NAN));

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | val_acc={:.1}%",
            epoch, end_epoch, train_loss, val_loss, val_acc * 100.0,
        );

        let epoch_metrics = EpochMetrics::new(epoch, train_loss, val_loss, val_acc);
        if epoch_metrics.is_improvement(best_val_loss) {
            best_val_loss = val_loss;
            tracing::info!("New best validation loss: {:.4}", val_loss);
        }
        metrics.log(&epoch_metrics)?;
        ckpt.save_model(&model, epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);

        report.last_epoch      = epoch;
        report.epochs_run     += 1;
        report.last_train_loss = train_loss;
        report.last_validation = validation;
    }

    tracing::info!(
        "Training finished at epoch {} (metrics in '{}')",
        report.last_epoch,
        metrics.csv_path().display()
    );
    Ok(report)
}

// ─── Per-epoch training ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct EpochOutcome {
    loss_sum:    f64,
    batches:     usize,
    interrupted: bool,
}

impl EpochOutcome {
    fn record(&mut self, loss: f64) {
        self.loss_sum += loss;
        self.batches  += 1;
    }

    fn mean_loss(&self) -> f64 {
        if self.batches > 0 { self.loss_sum / self.batches as f64 } else { f64::NAN }
    }
}

fn pair_epoch<B, O>(
    mut model: SiameseNetwork<B>,
    optim:     &mut O,
    index:     &Arc<GlyphIndex>,
    cfg:       &TrainConfig,
    seed:      u64,
    device:    &B::Device,
    interrupt: &InterruptFlag,
) -> Result<(SiameseNetwork<B>, EpochOutcome)>
where
    B: AutodiffBackend,
    O: Optimizer<SiameseNetwork<B>, B>,
{
    let dataset = PairDataset::new(index.clone(), cfg.steps_per_epoch * cfg.batch_size, seed)?;
    let loader  = loader_for(PairBatcher::<B>::new(device.clone()), dataset, cfg, seed);

    let mut outcome = EpochOutcome::default();
    for batch in loader.iter() {
        if interrupt.is_set() {
            outcome.interrupted = true;
            break;
        }

        let loss = pair_loss(&model, batch, cfg);
        outcome.record(loss.clone().into_scalar().elem::<f64>());
        log_progress(&outcome, cfg);

        // Backward pass + Adam update
        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optim.step(cfg.lr, model, grads);
    }
    Ok((model, outcome))
}

fn triplet_epoch<B, O>(
    mut model: SiameseNetwork<B>,
    optim:     &mut O,
    index:     &Arc<GlyphIndex>,
    cfg:       &TrainConfig,
    seed:      u64,
    device:    &B::Device,
    interrupt: &InterruptFlag,
) -> Result<(SiameseNetwork<B>, EpochOutcome)>
where
    B: AutodiffBackend,
    O: Optimizer<SiameseNetwork<B>, B>,
{
    let dataset = TripletDataset::new(index.clone(), cfg.steps_per_epoch * cfg.batch_size, seed)?;
    let loader  = loader_for(TripletBatcher::<B>::new(device.clone()), dataset, cfg, seed);

    let mut outcome = EpochOutcome::default();
    for batch in loader.iter() {
        if interrupt.is_set() {
            outcome.interrupted = true;
            break;
        }

        let (positive, negative) = triplet_distances(&model, batch);
        let loss = triplet_loss(positive, negative, cfg.margin);
        outcome.record(loss.clone().into_scalar().elem::<f64>());
        log_progress(&outcome, cfg);

        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optim.step(cfg.lr, model, grads);
    }
    Ok((model, outcome))
}

fn loader_for<I, O, Bt, D>(
    batcher: Bt,
    dataset: D,
    cfg:     &TrainConfig,
    seed:    u64,
) -> Arc<dyn DataLoader<O>>
where
    I: Send + Sync + Clone + std::fmt::Debug + 'static,
    O: Send + Clone + std::fmt::Debug + 'static,
    Bt: burn::data::dataloader::batcher::Batcher<I, O> + Clone + Send + Sync + 'static,
    D: burn::data::dataset::Dataset<I> + 'static,
{
    let mut builder = DataLoaderBuilder::new(batcher)
        .batch_size(cfg.batch_size)
        .shuffle(seed);
    if cfg.num_workers > 0 {
        builder = builder.num_workers(cfg.num_workers);
    }
    builder.build(dataset)
}

fn log_progress(outcome: &EpochOutcome, cfg: &TrainConfig) {
    if cfg.log_interval > 0 && outcome.batches % cfg.log_interval == 0 {
        tracing::debug!(
            "Batch {}/{}: mean loss={:.4}",
            outcome.batches,
            cfg.steps_per_epoch,
            outcome.mean_loss()
        );
    }
}

// ─── Shared forward helpers ───────────────────────────────────────────────────

fn pair_loss<B: Backend>(
    model: &SiameseNetwork<B>,
    batch: PairBatch<B>,
    cfg:   &TrainConfig,
) -> Tensor<B, 1> {
    let probs = model.forward(batch.first, batch.second);
    match cfg.objective {
        Objective::Contrastive => contrastive_loss(batch.targets, probs, cfg.margin),
        _ => binary_crossentropy(batch.targets, probs),
    }
}

/// (anchor→positive, anchor→negative) distances, each [batch, 1]
fn triplet_distances<B: Backend>(
    model: &SiameseNetwork<B>,
    batch: TripletBatch<B>,
) -> (Tensor<B, 2>, Tensor<B, 2>) {
    let kind     = model.distance_kind();
    let anchor   = model.embed(batch.anchor);
    let positive = pairwise_distance(anchor.clone(), model.embed(batch.positive), kind);
    let negative = pairwise_distance(anchor, model.embed(batch.negative), kind);
    (positive, negative)
}

// ─── Validation ───────────────────────────────────────────────────────────────

enum ValidationLoader<B: Backend> {
    Pairs(Arc<dyn DataLoader<PairBatch<B>>>),
    Triplets(Arc<dyn DataLoader<TripletBatch<B>>>),
}

impl<B: Backend> ValidationLoader<B> {
    fn new(index: Arc<GlyphIndex>, cfg: &TrainConfig, device: B::Device) -> Result<Self> {
        let len  = cfg.validation_steps * cfg.batch_size;
        let seed = cfg.seed ^ VALIDATION_SALT;

        // Validation order never needs shuffling; build without it
        let loader = if cfg.objective.uses_triplets() {
            let dataset = TripletDataset::new(index, len, seed)?;
            Self::Triplets(
                DataLoaderBuilder::new(TripletBatcher::<B>::new(device))
                    .batch_size(cfg.batch_size)
                    .build(dataset),
            )
        } else {
            let dataset = PairDataset::new(index, len, seed)?;
            Self::Pairs(
                DataLoaderBuilder::new(PairBatcher::<B>::new(device))
                    .batch_size(cfg.batch_size)
                    .build(dataset),
            )
        };
        Ok(loader)
    }

    fn run(&self, model: &SiameseNetwork<B>, cfg: &TrainConfig) -> Result<ValidationMetrics> {
        let mut loss_sum = 0.0f64;
        let mut batches  = 0usize;
        let mut correct  = 0usize;
        let mut total    = 0usize;

        match self {
            Self::Pairs(loader) => {
                for batch in loader.iter() {
                    let targets = tensor_to_vec(batch.targets.clone())?;
                    let probs   = model.forward(batch.first.clone(), batch.second.clone());
                    let loss    = match cfg.objective {
                        Objective::Contrastive => contrastive_loss(batch.targets, probs.clone(), cfg.margin),
                        _ => binary_crossentropy(batch.targets, probs.clone()),
                    };

                    loss_sum += loss.into_scalar().elem::<f64>();
                    batches  += 1;
                    correct  += correct_pairs(&tensor_to_vec(probs)?, &targets);
                    total    += targets.len();
                }
            }
            Self::Triplets(loader) => {
                for batch in loader.iter() {
                    let (positive, negative) = triplet_distances(model, batch);
                    let pos = tensor_to_vec(positive.clone())?;
                    let neg = tensor_to_vec(negative.clone())?;

                    loss_sum += triplet_loss(positive, negative, cfg.margin)
                        .into_scalar()
                        .elem::<f64>();
                    batches  += 1;
                    correct  += correct_triplets(&pos, &neg);
                    total    += pos.len();
                }
            }
        }

        Ok(ValidationMetrics {
            loss:     if batches > 0 { loss_sum / batches as f64 } else { f64::NAN },
            accuracy: if total   > 0 { correct as f64 / total as f64 } else { 0.0 },
        })
    }
}

/// Pairs whose prediction falls on the target's side of 0.5
fn correct_pairs(probs: &[f32], targets: &[f32]) -> usize {
    probs
        .iter()
        .zip(targets)
        .filter(|(&p, &t)| (p > 0.5) == (t > 0.5))
        .count()
}

/// Triplets whose positive is strictly closer than the negative
fn correct_triplets(positive: &[f32], negative: &[f32]) -> usize {
    positive.iter().zip(negative).filter(|(p, n)| p < n).count()
}
