// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Two subcommands: `train` and `evaluate`.

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::{
    evaluate_use_case::EvaluateRequest,
    train_use_case::{OptimizerKind, TrainConfig},
};
use crate::domain::label::LabelKind;
use crate::infra::checkpoint::CheckpointTag;
use crate::ml::{
    criterion::CriterionKind,
    trainer::{ModelKind, StepPolicy},
};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a Tree-LSTM on the train split, validating on dev
    Train(TrainArgs),

    /// Score a split with a trained checkpoint
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Corpus root holding train/, dev/ and optionally test/
    #[arg(long, default_value = "data/sick")]
    pub data_dir: String,

    /// Where checkpoints, vocabularies and metrics.csv are written
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[arg(long, default_value_t = 15)]
    pub epochs: usize,

    /// Examples whose gradients are accumulated per optimiser step
    #[arg(long, default_value_t = 25)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 0.01)]
    pub lr: f64,

    /// L2 penalty, 0 disables it
    #[arg(long, default_value_t = 1e-4)]
    pub weight_decay: f64,

    #[arg(long, value_enum, default_value_t = OptimizerKind::Adagrad)]
    pub optimizer: OptimizerKind,

    #[arg(long, value_enum, default_value_t = CriterionKind::KlDiv)]
    pub criterion: CriterionKind,

    /// `base` ignores dependency relations, `edge` embeds them
    #[arg(long, value_enum, default_value_t = ModelKind::Base)]
    pub model: ModelKind,

    /// `legacy` steps on the historical positions and drops the tail
    #[arg(long, value_enum, default_value_t = StepPolicy::Aligned)]
    pub step_policy: StepPolicy,

    #[arg(long, value_enum, default_value_t = LabelKind::Similarity)]
    pub labels: LabelKind,

    #[arg(long, default_value_t = 5)]
    pub num_classes: usize,

    #[arg(long, default_value_t = 300)]
    pub word_dim: usize,

    /// Relation embedding size (edge model only)
    #[arg(long, default_value_t = 50)]
    pub edge_dim: usize,

    /// Tree-LSTM cell and hidden state size
    #[arg(long, default_value_t = 150)]
    pub mem_dim: usize,

    /// Hidden layer of the pair head
    #[arg(long, default_value_t = 50)]
    pub hidden_dim: usize,

    /// Seed for the per-epoch shuffle
    #[arg(long)]
    pub seed: Option<u64>,

    /// Run on the WGPU backend instead of the CPU
    #[arg(long)]
    pub gpu: bool,

    /// Progress line every N examples at debug level, 0 disables
    #[arg(long, default_value_t = 500)]
    pub log_every: usize,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:       a.data_dir,
            checkpoint_dir: a.checkpoint_dir,
            epochs:         a.epochs,
            batch_size:     a.batch_size,
            lr:             a.lr,
            weight_decay:   a.weight_decay,
            optimizer:      a.optimizer,
            criterion:      a.criterion,
            model_kind:     a.model,
            step_policy:    a.step_policy,
            label_kind:     a.labels,
            num_classes:    a.num_classes,
            word_dim:       a.word_dim,
            edge_dim:       a.edge_dim,
            mem_dim:        a.mem_dim,
            hidden_dim:     a.hidden_dim,
            seed:           a.seed,
            gpu:            a.gpu,
            log_every:      a.log_every,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum WhichCheckpoint {
    Best,
    Latest,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Split directory to score, e.g. data/sick/test
    #[arg(long)]
    pub split_dir: PathBuf,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = WhichCheckpoint::Best, conflicts_with = "epoch")]
    pub checkpoint: WhichCheckpoint,

    /// Load this exact epoch instead of best/latest
    #[arg(long)]
    pub epoch: Option<usize>,

    /// Write one predicted class per line to this file
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub gpu: bool,
}

impl From<EvaluateArgs> for EvaluateRequest {
    fn from(a: EvaluateArgs) -> Self {
        let tag = match (a.epoch, a.checkpoint) {
            (Some(epoch), _)                  => CheckpointTag::Epoch(epoch),
            (None, WhichCheckpoint::Best)     => CheckpointTag::Best,
            (None, WhichCheckpoint::Latest)   => CheckpointTag::Latest,
        };
        EvaluateRequest {
            checkpoint_dir: a.checkpoint_dir,
            split_dir:      a.split_dir,
            tag,
            output:         a.output,
            gpu:            a.gpu,
        }
    }
}
