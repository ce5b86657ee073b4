// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Rebuilds a trained model from its checkpoint directory and
// scores one split:
//
//   Step 1: Load train_config.json and the vocabularies
//   Step 2: Load the split with the training vocabularies
//   Step 3: Rebuild the architecture, load the weights
//   Step 4: Trainer::test → loss + predicted classes
//   Step 5: Score and optionally write predictions

use anyhow::{Context, Result};
use burn::{
    backend::wgpu::WgpuDevice,
    optim::SgdConfig,
    tensor::backend::AutodiffBackend,
};
use std::{fs, path::PathBuf};

use crate::application::train_use_case::{CpuBackend, GpuBackend};
use crate::data::{dataset::PairDataset, loader::SplitLoader};
use crate::domain::traits::PairSource;
use crate::infra::{
    checkpoint::{CheckpointManager, CheckpointTag},
    metrics::Scores,
};
use crate::ml::{model::TreePairModel, trainer::Trainer};

#[derive(Debug, Clone)]
pub struct EvaluateRequest {
    pub checkpoint_dir: PathBuf,
    pub split_dir:      PathBuf,
    pub tag:            CheckpointTag,
    /// Where to write one predicted class per line
    pub output:         Option<PathBuf>,
    pub gpu:            bool,
}

#[derive(Debug, Clone)]
pub struct EvaluateReport {
    pub epoch:       usize,
    pub loss:        f64,
    pub scores:      Scores,
    pub predictions: Vec<usize>,
}

pub struct EvaluateUseCase {
    request: EvaluateRequest,
}

impl EvaluateUseCase {
    pub fn new(request: EvaluateRequest) -> Self {
        Self { request }
    }

    pub fn execute(&self) -> Result<EvaluateReport> {
        if self.request.gpu {
            self.run::<GpuBackend>(WgpuDevice::default())
        } else {
            self.run::<CpuBackend>(Default::default())
        }
    }

    pub fn run<B: AutodiffBackend>(&self, device: B::Device) -> Result<EvaluateReport> {
        let req  = &self.request;
        let ckpt = CheckpointManager::new(&req.checkpoint_dir)?;

        // ── Step 1: Config and vocabularies ──────────────────────────────────
        let cfg           = ckpt.load_config()?;
        let (words, rels) = ckpt.load_vocabs()?;
        let epoch         = ckpt.resolve(req.tag)?;

        // ── Step 2: Split ─────────────────────────────────────────────────────
        let dataset = PairDataset::new(SplitLoader::new(&req.split_dir, &words, &rels).load_all()?);

        // ── Step 3: Model ─────────────────────────────────────────────────────
        let model: TreePairModel<B> = cfg.model_config(words.len(), rels.len()).init(&device);
        let model = ckpt.load_model(model, CheckpointTag::Epoch(epoch), &device)?;

        // ── Step 4: Evaluate ──────────────────────────────────────────────────
        // test() never steps, any optimiser satisfies the trainer.
        let optim   = SgdConfig::new().init::<B, TreePairModel<B>>();
        let trainer = Trainer::new(cfg.trainer_args(), model, cfg.criterion, optim, device)?;
        let (loss, predictions) = trainer.test(&dataset)?;

        // ── Step 5: Score ─────────────────────────────────────────────────────
        let scores = Scores::compute(&cfg.label_mapping(), &predictions, &dataset.labels());
        tracing::info!(
            "Evaluated epoch {} on '{}': loss={:.4} acc={:.1}% pearson={:.4} mse={:.4}",
            epoch,
            req.split_dir.display(),
            loss,
            scores.accuracy * 100.0,
            scores.pearson,
            scores.mse,
        );

        if let Some(out) = &req.output {
            let body: String = predictions.iter().map(|p| format!("{p}\n")).collect();
            fs::write(out, body)
                .with_context(|| format!("Cannot write predictions to '{}'", out.display()))?;
            tracing::info!("Wrote {} predictions to '{}'", predictions.len(), out.display());
        }

        Ok(EvaluateReport { epoch, loss, scores, predictions })
    }
}
