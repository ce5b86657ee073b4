// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a full training run:
//
//   Step 1: Build word / relation vocabularies   (Layer 4 - data)
//   Step 2: Load train and dev splits            (Layer 4 - data)
//   Step 3: Save config and vocabularies         (Layer 6 - infra)
//   Step 4: Build model and optimiser            (Layer 5 - ml)
//   Step 5: Epoch loop: train, test on dev,
//           log metrics, checkpoint              (Layer 5 + 6)

use anyhow::{ensure, Result};
use burn::{
    backend::{wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    optim::{decay::WeightDecayConfig, AdaGradConfig, AdamConfig, Optimizer, SgdConfig},
    tensor::backend::AutodiffBackend,
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::{
    dataset::PairDataset,
    loader::{token_files, SplitLoader},
    vocab::Vocab,
};
use crate::domain::label::{LabelKind, LabelMapping};
use crate::domain::traits::PairSource;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger, Scores},
};
use crate::ml::{
    criterion::CriterionKind,
    model::{TreePairConfig, TreePairModel},
    trainer::{ModelKind, StepPolicy, Trainer, TrainerArgs},
};

pub type CpuBackend = Autodiff<NdArray>;
pub type GpuBackend = Autodiff<Wgpu>;

pub const SPLITS: [&str; 3] = ["train", "dev", "test"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Adam,
    #[default]
    Adagrad,
    Sgd,
}

// ─── Training Configuration ──────────────────────────────────────────────────
// Saved as train_config.json so `evaluate` can rebuild the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_dir:       String,
    pub checkpoint_dir: String,
    pub epochs:         usize,
    pub batch_size:     usize,
    pub lr:             f64,
    pub weight_decay:   f64,
    pub optimizer:      OptimizerKind,
    pub criterion:      CriterionKind,
    pub model_kind:     ModelKind,
    pub step_policy:    StepPolicy,
    pub label_kind:     LabelKind,
    pub num_classes:    usize,
    pub word_dim:       usize,
    pub edge_dim:       usize,
    pub mem_dim:        usize,
    pub hidden_dim:     usize,
    pub seed:           Option<u64>,
    pub gpu:            bool,
    pub log_every:      usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:       "data/sick".to_string(),
            checkpoint_dir: "checkpoints".to_string(),
            epochs:         15,
            batch_size:     25,
            lr:             0.01,
            weight_decay:   1e-4,
            optimizer:      OptimizerKind::Adagrad,
            criterion:      CriterionKind::KlDiv,
            model_kind:     ModelKind::Base,
            step_policy:    StepPolicy::Aligned,
            label_kind:     LabelKind::Similarity,
            num_classes:    5,
            word_dim:       300,
            edge_dim:       50,
            mem_dim:        150,
            hidden_dim:     50,
            seed:           None,
            gpu:            false,
            log_every:      500,
        }
    }
}

impl TrainConfig {
    pub fn label_mapping(&self) -> LabelMapping {
        LabelMapping::new(self.label_kind, self.num_classes)
    }

    pub fn trainer_args(&self) -> TrainerArgs {
        TrainerArgs {
            model_kind:    self.model_kind,
            batch_size:    self.batch_size,
            lr:            self.lr,
            step_policy:   self.step_policy,
            label_mapping: self.label_mapping(),
            seed:          self.seed,
            log_every:     self.log_every,
        }
    }

    /// Architecture for the given vocabulary sizes. Relation
    /// embeddings are only built for the edge model.
    pub fn model_config(&self, vocab_size: usize, num_relations: usize) -> TreePairConfig {
        let config = TreePairConfig::new(
            vocab_size, self.word_dim, self.mem_dim, self.hidden_dim, self.num_classes,
        );
        match self.model_kind {
            ModelKind::Base => config,
            ModelKind::Edge => config
                .with_num_relations(num_relations)
                .with_edge_dim(self.edge_dim),
        }
    }
}

/// Outcome of a training run.
#[derive(Debug, Clone, Copy)]
pub struct TrainSummary {
    pub epochs:          usize,
    pub best_epoch:      usize,
    pub best_dev_loss:   f64,
    pub last_train_loss: f64,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Pick the backend from the config and run the pipeline on it.
    pub fn execute(&self) -> Result<TrainSummary> {
        if self.config.gpu {
            let device = WgpuDevice::default();
            tracing::info!("Using WGPU device: {:?}", device);
            self.run::<GpuBackend>(device)
        } else {
            tracing::info!("Using NdArray CPU backend");
            self.run::<CpuBackend>(Default::default())
        }
    }

    pub fn run<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainSummary> {
        let cfg  = &self.config;
        let root = Path::new(&cfg.data_dir);
        ensure!(cfg.epochs > 0, "epochs must be at least 1");

        // ── Step 1: Vocabularies from every split present ────────────────────
        let words     = Vocab::from_files(&token_files(root, &SPLITS, "toks"))?;
        let relations = Vocab::from_files(&token_files(root, &SPLITS, "rels"))?;
        tracing::info!("Vocab: {} words, {} relations", words.len(), relations.len());

        // ── Step 2: Train / dev splits ────────────────────────────────────────
        let load  = |split: &str| SplitLoader::new(root.join(split), &words, &relations).load_all();
        let train = PairDataset::new(load("train")?);
        let dev   = PairDataset::new(load("dev")?);
        tracing::info!("Split: {} train, {} dev", train.pair_count(), dev.pair_count());

        // ── Step 3: Persist what evaluate needs ──────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt.save_config(cfg)?;
        ckpt.save_vocabs(&words, &relations)?;

        // ── Step 4: Model and optimiser ──────────────────────────────────────
        let model: TreePairModel<B> = cfg
            .model_config(words.len(), relations.len())
            .init(&device);
        tracing::info!(
            "Model ready: {:?} kind, mem_dim={}, {} parameters",
            cfg.model_kind,
            cfg.mem_dim,
            burn::module::Module::num_params(&model),
        );

        let decay = (cfg.weight_decay > 0.0).then(|| WeightDecayConfig::new(cfg.weight_decay as f32));
        let data  = Splits { train: &train, dev: &dev };

        match cfg.optimizer {
            OptimizerKind::Adam => {
                let optim = AdamConfig::new()
                    .with_weight_decay(decay)
                    .init::<B, TreePairModel<B>>();
                fit(cfg, model, optim, data, &ckpt, device)
            }
            OptimizerKind::Adagrad => {
                let optim = AdaGradConfig::new()
                    .with_weight_decay(decay)
                    .init::<B, TreePairModel<B>>();
                fit(cfg, model, optim, data, &ckpt, device)
            }
            OptimizerKind::Sgd => {
                let optim = SgdConfig::new()
                    .with_weight_decay(decay)
                    .init::<B, TreePairModel<B>>();
                fit(cfg, model, optim, data, &ckpt, device)
            }
        }
    }
}

struct Splits<'a> {
    train: &'a PairDataset,
    dev:   &'a PairDataset,
}

/// Epoch loop shared by every optimiser type.
fn fit<B, O>(
    cfg:    &TrainConfig,
    model:  TreePairModel<B>,
    optim:  O,
    data:   Splits<'_>,
    ckpt:   &CheckpointManager,
    device: B::Device,
) -> Result<TrainSummary>
where
    B: AutodiffBackend,
    O: Optimizer<TreePairModel<B>, B>,
{
    let mapping    = cfg.label_mapping();
    let dev_labels = data.dev.labels();
    let logger     = MetricsLogger::new(ckpt.dir())?;
    let mut trainer = Trainer::new(cfg.trainer_args(), model, cfg.criterion, optim, device)?;

    let mut best_dev_loss   = f64::INFINITY;
    let mut best_epoch      = 0;
    let mut last_train_loss = f64::NAN;

    for _ in 0..cfg.epochs {
        let train_loss            = trainer.train(data.train)?;
        let (dev_loss, predicted) = trainer.test(data.dev)?;
        let scores  = Scores::compute(&mapping, &predicted, &dev_labels);
        let epoch   = trainer.epoch();
        let metrics = EpochMetrics::new(epoch, train_loss, dev_loss, scores);

        tracing::info!(
            "Epoch {:>3}/{} | train_loss={:.4} | dev_loss={:.4} | dev_acc={:.1}% | dev_pearson={:.4}",
            epoch,
            cfg.epochs,
            train_loss,
            dev_loss,
            scores.accuracy * 100.0,
            scores.pearson,
        );

        logger.log(&metrics)?;
        ckpt.save_model(trainer.model(), epoch)?;

        if metrics.is_improvement(best_dev_loss) {
            best_dev_loss = dev_loss;
            best_epoch    = epoch;
            ckpt.mark_best(epoch)?;
            tracing::info!("New best dev loss at epoch {}", epoch);
        }
        last_train_loss = train_loss;
    }

    Ok(TrainSummary { epochs: trainer.epoch(), best_epoch, best_dev_loss, last_train_loss })
}
