// ============================================================
// Layer 5 — Criteria
// ============================================================
// A criterion reduces (output, target) to a scalar loss. Both
// tensors are [1, num_classes]; targets are distributions built
// by LabelMapping.
//
// The method is generic over the backend so the same criterion
// value scores the autodiff model during training and the inner
// model during evaluation.

use burn::{prelude::*, tensor::activation};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub trait Criterion {
    fn loss<B: Backend>(&self, output: Tensor<B, 2>, target: Tensor<B, 2>) -> Tensor<B, 1>;
}

/// KL(target ‖ exp(output)) averaged over elements.
/// Expects `output` to already be log-probabilities.
#[derive(Debug, Clone, Copy, Default)]
pub struct KlDivLoss;

impl Criterion for KlDivLoss {
    fn loss<B: Backend>(&self, output: Tensor<B, 2>, target: Tensor<B, 2>) -> Tensor<B, 1> {
        // 0 · ln 0 counts as 0
        let log_target = target.clone().clamp_min(1e-12).log();
        (target * (log_target - output)).mean()
    }
}

/// Cross entropy against a soft target, `output` as logits.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftCrossEntropy;

impl Criterion for SoftCrossEntropy {
    fn loss<B: Backend>(&self, output: Tensor<B, 2>, target: Tensor<B, 2>) -> Tensor<B, 1> {
        let log_probs = activation::log_softmax(output, 1);
        (target * log_probs).sum_dim(1).mean().neg()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CriterionKind {
    #[default]
    KlDiv,
    CrossEntropy,
}

impl Criterion for CriterionKind {
    fn loss<B: Backend>(&self, output: Tensor<B, 2>, target: Tensor<B, 2>) -> Tensor<B, 1> {
        match self {
            Self::KlDiv        => KlDivLoss.loss(output, target),
            Self::CrossEntropy => SoftCrossEntropy.loss(output, target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    fn row(v: [f32; 3]) -> Tensor<B, 2> {
        Tensor::from_data(TensorData::new(v.to_vec(), [1, 3]), &Default::default())
    }

    fn scalar(t: Tensor<B, 1>) -> f32 {
        t.into_scalar().elem()
    }

    #[test]
    fn test_kl_is_zero_on_exact_match() {
        let target = row([0.0, 0.4, 0.6]);
        let output = target.clone().clamp_min(1e-12).log();
        assert!(scalar(KlDivLoss.loss(output, target)).abs() < 1e-6);
    }

    #[test]
    fn test_kl_matches_hand_computation() {
        // target one-hot on class 1, output uniform: KL = ln 3, averaged over 3 elements
        let target = row([0.0, 1.0, 0.0]);
        let output = row([(1.0f32 / 3.0).ln(); 3]);
        let expected = 3.0f32.ln() / 3.0;
        assert!((scalar(KlDivLoss.loss(output, target)) - expected).abs() < 1e-5);
    }

    #[test]
    fn test_cross_entropy_of_uniform_logits() {
        let target = row([1.0, 0.0, 0.0]);
        let output = row([0.0, 0.0, 0.0]);
        let loss   = scalar(SoftCrossEntropy.loss(output, target));
        assert!((loss - 3.0f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_kind_dispatches() {
        let target = row([0.0, 1.0, 0.0]);
        let output = row([(1.0f32 / 3.0).ln(); 3]);
        let a = scalar(CriterionKind::KlDiv.loss(output.clone(), target.clone()));
        let b = scalar(KlDivLoss.loss(output, target));
        assert_eq!(a, b);
    }
}
