// ============================================================
// Layer 3 — Label Mapping
// ============================================================
// Turns a raw gold label into the target distribution the
// criterion compares the model output against.
//
// Similarity labels are real scores on a 1..=K scale and are
// spread over the two neighbouring classes:
//
//   K = 5, y = 3.6   →   [0, 0, 0.4, 0.6, 0]
//   K = 5, y = 2.0   →   [0, 1, 0,   0,   0]
//
// Categorical labels are 0-based class indices, one-hot encoded.

use anyhow::{ensure, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LabelKind {
    Similarity,
    Categorical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMapping {
    pub kind:        LabelKind,
    pub num_classes: usize,
}

impl LabelMapping {
    pub fn new(kind: LabelKind, num_classes: usize) -> Self {
        Self { kind, num_classes }
    }

    pub fn similarity(num_classes: usize) -> Self {
        Self::new(LabelKind::Similarity, num_classes)
    }

    pub fn categorical(num_classes: usize) -> Self {
        Self::new(LabelKind::Categorical, num_classes)
    }

    /// Target distribution for `label`, `num_classes` entries summing to 1.
    pub fn target(&self, label: f32) -> Result<Vec<f32>> {
        let k = self.num_classes;
        ensure!(k > 0, "label mapping needs at least one class");
        let mut target = vec![0.0f32; k];

        match self.kind {
            LabelKind::Similarity => {
                ensure!(
                    label.is_finite() && label >= 1.0 && label <= k as f32,
                    "similarity label {label} outside 1..={k}"
                );
                let floor = label.floor();
                let ceil  = label.ceil();
                if floor == ceil {
                    target[floor as usize - 1] = 1.0;
                } else {
                    target[floor as usize - 1] = ceil - label;
                    target[ceil as usize - 1]  = label - floor;
                }
            }
            LabelKind::Categorical => {
                ensure!(
                    label.is_finite() && label >= 0.0 && label.fract() == 0.0 && (label as usize) < k,
                    "class label {label} outside 0..{k}"
                );
                target[label as usize] = 1.0;
            }
        }
        Ok(target)
    }

    /// The single class a gold label counts as when scoring accuracy.
    pub fn gold_class(&self, label: f32) -> usize {
        let class = match self.kind {
            LabelKind::Similarity  => label.round() as i64 - 1,
            LabelKind::Categorical => label.round() as i64,
        };
        class.clamp(0, self.num_classes.saturating_sub(1) as i64) as usize
    }

    /// Expected score of a predicted class, on the label's own scale.
    pub fn class_score(&self, class: usize) -> f32 {
        match self.kind {
            LabelKind::Similarity  => class as f32 + 1.0,
            LabelKind::Categorical => class as f32,
        }
    }
}
