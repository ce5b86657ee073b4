// ============================================================
// Layer 5 — Trainer
// ============================================================
// One-example-at-a-time driver for a tree model over sentence
// pairs. Two entry points:
//
//   train(dataset) → mean loss of one epoch, updates the model
//   test(dataset)  → (mean loss, predicted class per example)
//
// Training walks a fresh random permutation of the dataset,
// backpropagates every example and accumulates the gradients.
// The optimizer steps every `batch_size` examples according to
// the StepPolicy, then the accumulated gradients are reset.
//
// Burn 0.20 notes:
//   - GradientsAccumulator stands in for zero_grad / .grad sums
//   - optimizer.step consumes the model and returns it updated
//   - model.valid() gives the inner-backend copy: no autodiff
//     graph, dropout off

use anyhow::{ensure, Context, Result};
use burn::{
    data::dataset::Dataset,
    module::AutodiffModule,
    optim::{GradientsAccumulator, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use clap::ValueEnum;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::domain::label::LabelMapping;
use crate::domain::pair::SentencePair;
use crate::ml::criterion::Criterion;
use crate::ml::model::PairScorer;

/// Which forward signature the trainer calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// (tree, sentence, tree, sentence)
    #[default]
    Base,
    /// (tree, sentence, tree, sentence, edges, edges)
    Edge,
}

/// When accumulated gradients are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StepPolicy {
    /// Step at positions batch_size, 2·batch_size, ...; the first
    /// step covers batch_size + 1 examples and the tail is dropped.
    Legacy,
    /// Step after every batch_size examples, flush the tail.
    #[default]
    Aligned,
}

impl StepPolicy {
    /// Whether to step after the example at `position` of the epoch.
    pub fn should_step(self, position: usize, batch_size: usize) -> bool {
        match self {
            Self::Legacy  => position > 0 && position % batch_size == 0,
            Self::Aligned => (position + 1) % batch_size == 0,
        }
    }

    pub fn flushes_tail(self) -> bool {
        matches!(self, Self::Aligned)
    }
}

#[derive(Debug, Clone)]
pub struct TrainerArgs {
    pub model_kind:    ModelKind,
    pub batch_size:    usize,
    pub lr:            f64,
    pub step_policy:   StepPolicy,
    pub label_mapping: LabelMapping,
    /// Seed for the per-epoch permutation, None draws from entropy
    pub seed:          Option<u64>,
    /// Emit a progress line every this many examples, 0 = never
    pub log_every:     usize,
}

pub struct Trainer<B: AutodiffBackend, M, C, O> {
    args:      TrainerArgs,
    model:     M,
    criterion: C,
    optimizer: O,
    device:    B::Device,
    epoch:     usize,
    steps:     usize,
    rng:       StdRng,
}

impl<B, M, C, O> Trainer<B, M, C, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + PairScorer<B>,
    M::InnerModule: PairScorer<B::InnerBackend>,
    C: Criterion,
    O: Optimizer<M, B>,
{
    pub fn new(
        args:      TrainerArgs,
        model:     M,
        criterion: C,
        optimizer: O,
        device:    B::Device,
    ) -> Result<Self> {
        ensure!(args.batch_size > 0, "batch_size must be at least 1");
        if args.model_kind == ModelKind::Edge && !model.supports_edges() {
            tracing::warn!("Edge model kind selected but the model has no relation embedding");
        }
        let rng = match args.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None       => StdRng::from_entropy(),
        };
        Ok(Self { args, model, criterion, optimizer, device, epoch: 0, steps: 0, rng })
    }

    /// Number of completed training epochs.
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Optimizer steps taken during the last training epoch.
    pub fn steps_last_epoch(&self) -> usize {
        self.steps
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Run one epoch over `dataset` in random order and return its mean loss.
    ///
    /// If an example fails partway through, the steps already taken are
    /// kept: the model keeps the updates the optimizer has seen and the
    /// epoch counter is left unchanged.
    pub fn train<D: Dataset<SentencePair>>(&mut self, dataset: &D) -> Result<f64> {
        let len = dataset.len();
        ensure!(len > 0, "cannot train on an empty dataset");

        let mut indices: Vec<usize> = (0..len).collect();
        indices.shuffle(&mut self.rng);

        let epoch      = self.epoch + 1;
        let batch_size = self.args.batch_size;
        let policy     = self.args.step_policy;

        let mut model       = self.model.clone();
        let mut accumulator = GradientsAccumulator::<M>::new();
        let mut pending     = 0usize;
        let mut steps       = 0usize;
        let mut total_loss  = 0.0f64;

        for (position, &index) in indices.iter().enumerate() {
            let (loss, grads) = match self.example_gradients(&model, dataset, index, len) {
                Ok(found) => found,
                Err(err)  => {
                    self.model = model;
                    self.steps = steps;
                    return Err(err);
                }
            };

            total_loss += loss;
            accumulator.accumulate::<B>(&model, grads);
            pending += 1;

            if policy.should_step(position, batch_size) {
                model   = self.optimizer.step(self.args.lr, model, accumulator.grads());
                pending = 0;
                steps  += 1;
            }

            if self.args.log_every > 0 && (position + 1) % self.args.log_every == 0 {
                tracing::debug!(
                    "Training epoch {} [{}/{}] running loss={:.4}",
                    epoch,
                    position + 1,
                    len,
                    total_loss / (position + 1) as f64,
                );
            }
        }

        if pending > 0 && policy.flushes_tail() {
            model  = self.optimizer.step(self.args.lr, model, accumulator.grads());
            steps += 1;
        }

        self.model = model;
        self.steps = steps;
        self.epoch = epoch;

        let mean = total_loss / len as f64;
        tracing::info!("Training epoch {epoch}: loss={mean:.4} steps={steps}");
        Ok(mean)
    }

    /// Loss and gradients of one dataset item under `model`.
    fn example_gradients<D: Dataset<SentencePair>>(
        &self,
        model:   &M,
        dataset: &D,
        index:   usize,
        len:     usize,
    ) -> Result<(f64, GradientsParams)> {
        let pair = dataset
            .get(index)
            .with_context(|| format!("dataset has no item {index} (len {len})"))?;

        let target = target_tensor::<B>(&self.args.label_mapping, pair.label, &self.device)
            .with_context(|| format!("dataset item {index}"))?;
        let output = score_pair::<B, _>(model, self.args.model_kind, &pair, &self.device);
        let loss   = self.criterion.loss(output, target);
        let value  = loss.clone().into_scalar().elem::<f64>();

        Ok((value, GradientsParams::from_grads(loss.backward(), model)))
    }

    /// Evaluate `dataset` in order without touching the parameters.
    /// Returns the mean loss and one predicted class per example.
    pub fn test<D: Dataset<SentencePair>>(&self, dataset: &D) -> Result<(f64, Vec<usize>)> {
        let len = dataset.len();
        ensure!(len > 0, "cannot evaluate an empty dataset");

        let model = self.model.valid();
        let mut predictions = Vec::with_capacity(len);
        let mut total_loss  = 0.0f64;

        for index in 0..len {
            let pair = dataset
                .get(index)
                .with_context(|| format!("dataset has no item {index} (len {len})"))?;

            let target = target_tensor::<B::InnerBackend>(
                &self.args.label_mapping,
                pair.label,
                &self.device,
            )?;
            let output = score_pair::<B::InnerBackend, _>(
                &model,
                self.args.model_kind,
                &pair,
                &self.device,
            );
            let loss   = self.criterion.loss(output.clone(), target);

            total_loss += loss.into_scalar().elem::<f64>();

            let class = output.argmax(1).into_scalar().elem::<i64>();
            predictions.push(class as usize);

            if self.args.log_every > 0 && (index + 1) % self.args.log_every == 0 {
                tracing::debug!("Testing epoch {} [{}/{}]", self.epoch, index + 1, len);
            }
        }

        let mean = total_loss / len as f64;
        tracing::info!("Testing epoch {}: loss={mean:.4} over {len} pairs", self.epoch);
        Ok((mean, predictions))
    }
}

/// Build the pair's tensors on `device` and run the matching forward signature.
fn score_pair<B: Backend, M: PairScorer<B>>(
    model:  &M,
    kind:   ModelKind,
    pair:   &SentencePair,
    device: &B::Device,
) -> Tensor<B, 2> {
    let linput = ids_tensor::<B>(&pair.lsent, device);
    let rinput = ids_tensor::<B>(&pair.rsent, device);

    match kind {
        ModelKind::Base => model.forward(&pair.ltree, linput, &pair.rtree, rinput),
        ModelKind::Edge => model.forward_with_edges(
            &pair.ltree,
            linput,
            &pair.rtree,
            rinput,
            ids_tensor::<B>(&pair.ledge, device),
            ids_tensor::<B>(&pair.redge, device),
        ),
    }
}

fn ids_tensor<B: Backend>(ids: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    let data: Vec<i64> = ids.iter().map(|&id| id as i64).collect();
    Tensor::from_data(TensorData::new(data, [ids.len()]), device)
}

fn target_tensor<B: Backend>(
    mapping: &LabelMapping,
    label:   f32,
    device:  &B::Device,
) -> Result<Tensor<B, 2>> {
    let target = mapping.target(label)?;
    let n      = target.len();
    Ok(Tensor::from_data(TensorData::new(target, [1, n]), device))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::PairDataset;
    use crate::domain::pair::Sentence;
    use crate::domain::tree::Tree;
    use crate::ml::criterion::CriterionKind;
    use crate::ml::model::{TreePairConfig, TreePairModel};
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::SgdConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type B = Autodiff<NdArray>;

    /// Yields items normally for the first `after` lookups, then runs dry.
    struct FailsAfter {
        inner: PairDataset,
        calls: AtomicUsize,
        after: usize,
    }

    impl Dataset<SentencePair> for FailsAfter {
        fn get(&self, index: usize) -> Option<SentencePair> {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.after {
                return None;
            }
            self.inner.get(index)
        }

        fn len(&self) -> usize {
            self.inner.len()
        }
    }

    fn sentence(tokens: &[usize], parents: &[i64]) -> Sentence {
        Sentence {
            tree:   Tree::from_parents(parents).unwrap(),
            tokens: tokens.to_vec(),
            edges:  vec![2; tokens.len()],
        }
    }

    fn dataset(n: usize) -> PairDataset {
        let pairs = (0..n)
            .map(|i| {
                let label = 1.0 + (i % 5) as f32 * 0.9;
                SentencePair::new(
                    sentence(&[2, 3 + i % 4, 4], &[2, 3, 0]),
                    sentence(&[5, 6], &[0, 1]),
                    label.min(5.0),
                )
            })
            .collect();
        PairDataset::new(pairs)
    }

    fn args(kind: ModelKind, batch_size: usize, policy: StepPolicy) -> TrainerArgs {
        TrainerArgs {
            model_kind:    kind,
            batch_size,
            lr:            0.05,
            step_policy:   policy,
            label_mapping: LabelMapping::similarity(5),
            seed:          Some(7),
            log_every:     0,
        }
    }

    fn model() -> TreePairModel<B> {
        TreePairConfig::new(10, 4, 6, 5, 5)
            .with_num_relations(4)
            .with_edge_dim(2)
            .init::<B>(&Default::default())
    }

    fn trainer(
        args:  TrainerArgs,
        model: TreePairModel<B>,
    ) -> Trainer<B, TreePairModel<B>, CriterionKind, impl Optimizer<TreePairModel<B>, B>> {
        let optim = SgdConfig::new().init::<B, TreePairModel<B>>();
        Trainer::new(args, model, CriterionKind::KlDiv, optim, Default::default()).unwrap()
    }

    /// Inference outputs of the trainer's current model over `data`.
    fn outputs<C, O>(t: &Trainer<B, TreePairModel<B>, C, O>, data: &PairDataset) -> Vec<f32>
    where
        C: Criterion,
        O: Optimizer<TreePairModel<B>, B>,
    {
        let model  = t.model().valid();
        let device = Default::default();
        (0..data.len())
            .flat_map(|i| {
                let pair = data.get(i).unwrap();
                score_pair::<NdArray, _>(&model, ModelKind::Base, &pair, &device)
                    .into_data()
                    .to_vec::<f32>()
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_epoch_counter_increments_once_per_train() {
        let mut t = trainer(args(ModelKind::Base, 2, StepPolicy::Aligned), model());
        let data  = dataset(5);
        assert_eq!(t.epoch(), 0);

        let loss = t.train(&data).unwrap();
        assert_eq!(t.epoch(), 1);
        assert!(loss.is_finite() && loss >= 0.0);

        t.train(&data).unwrap();
        assert_eq!(t.epoch(), 2);
    }

    #[test]
    fn test_predictions_cover_dataset() {
        let t    = trainer(args(ModelKind::Base, 2, StepPolicy::Aligned), model());
        let data = dataset(7);
        let (loss, predictions) = t.test(&data).unwrap();
        assert_eq!(predictions.len(), 7);
        assert!(predictions.iter().all(|&c| c < 5));
        assert!(loss.is_finite());
    }

    #[test]
    fn test_evaluation_is_deterministic_and_read_only() {
        let mut t = trainer(args(ModelKind::Edge, 3, StepPolicy::Aligned), model());
        let data  = dataset(6);
        t.train(&data).unwrap();

        let first  = t.test(&data).unwrap();
        let second = t.test(&data).unwrap();
        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
        assert_eq!(t.epoch(), 1);
    }

    #[test]
    fn test_same_seed_same_epoch_loss() {
        let m    = model();
        let data = dataset(6);
        let mut a = trainer(args(ModelKind::Base, 2, StepPolicy::Aligned), m.clone());
        let mut b = trainer(args(ModelKind::Base, 2, StepPolicy::Aligned), m);
        assert_eq!(a.train(&data).unwrap(), b.train(&data).unwrap());
    }

    #[test]
    fn test_step_counts_per_policy() {
        let data = dataset(5);

        // positions 1 and 3, then the tail (position 4)
        let mut aligned = trainer(args(ModelKind::Base, 2, StepPolicy::Aligned), model());
        aligned.train(&data).unwrap();
        assert_eq!(aligned.steps_last_epoch(), 3);

        // positions 2 and 4, position 0 rides along in the first step
        let mut legacy = trainer(args(ModelKind::Base, 2, StepPolicy::Legacy), model());
        legacy.train(&data).unwrap();
        assert_eq!(legacy.steps_last_epoch(), 2);
    }

    #[test]
    fn test_step_policy_positions() {
        let legacy: Vec<usize> = (0..10).filter(|&p| StepPolicy::Legacy.should_step(p, 3)).collect();
        assert_eq!(legacy, vec![3, 6, 9]);

        let aligned: Vec<usize> = (0..10).filter(|&p| StepPolicy::Aligned.should_step(p, 3)).collect();
        assert_eq!(aligned, vec![2, 5, 8]);
        assert!(StepPolicy::Aligned.flushes_tail());
        assert!(!StepPolicy::Legacy.flushes_tail());
    }

    #[test]
    fn test_empty_dataset_is_an_error() {
        let mut t = trainer(args(ModelKind::Base, 2, StepPolicy::Aligned), model());
        let empty = PairDataset::new(Vec::new());
        assert!(t.train(&empty).is_err());
        assert!(t.test(&empty).is_err());
        assert_eq!(t.epoch(), 0);
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let optim = SgdConfig::new().init::<B, TreePairModel<B>>();
        let result = Trainer::<B, _, _, _>::new(
            args(ModelKind::Base, 0, StepPolicy::Aligned),
            model(),
            CriterionKind::KlDiv,
            optim,
            Default::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_label_aborts_epoch() {
        let mut t = trainer(args(ModelKind::Base, 2, StepPolicy::Aligned), model());
        let data  = PairDataset::new(vec![SentencePair::new(
            sentence(&[2, 3], &[2, 0]),
            sentence(&[4], &[0]),
            9.0,
        )]);
        assert!(t.train(&data).is_err());
        assert_eq!(t.epoch(), 0);
    }

    #[test]
    fn test_legacy_drops_tail_and_aligned_applies_it() {
        let data = dataset(1);
        let m    = model();

        let mut legacy = trainer(args(ModelKind::Base, 2, StepPolicy::Legacy), m.clone());
        let before     = outputs(&legacy, &data);
        legacy.train(&data).unwrap();
        assert_eq!(legacy.steps_last_epoch(), 0);
        assert_eq!(outputs(&legacy, &data), before);

        let mut aligned = trainer(args(ModelKind::Base, 2, StepPolicy::Aligned), m);
        aligned.train(&data).unwrap();
        assert_eq!(aligned.steps_last_epoch(), 1);
        assert_ne!(outputs(&aligned, &data), before);
    }

    #[test]
    fn test_legacy_steps_update_weights() {
        let data  = dataset(3);
        let mut t = trainer(args(ModelKind::Base, 2, StepPolicy::Legacy), model());
        let before = outputs(&t, &data);
        t.train(&data).unwrap();
        assert_eq!(t.steps_last_epoch(), 1);
        assert_ne!(outputs(&t, &data), before);
    }

    #[test]
    fn test_evaluation_keeps_weights() {
        let data = dataset(4);
        let t    = trainer(args(ModelKind::Base, 2, StepPolicy::Aligned), model());
        let before = outputs(&t, &data);
        t.test(&data).unwrap();
        assert_eq!(outputs(&t, &data), before);
    }

    #[test]
    fn test_failed_epoch_keeps_steps_taken() {
        let plain  = dataset(5);
        let broken = FailsAfter { inner: dataset(5), calls: AtomicUsize::new(0), after: 3 };

        let mut t  = trainer(args(ModelKind::Base, 1, StepPolicy::Aligned), model());
        let before = outputs(&t, &plain);

        assert!(t.train(&broken).is_err());
        assert_eq!(t.epoch(), 0);
        assert_eq!(t.steps_last_epoch(), 3);
        assert_ne!(outputs(&t, &plain), before);

        // the trainer stays usable
        t.train(&plain).unwrap();
        assert_eq!(t.epoch(), 1);
    }
}
