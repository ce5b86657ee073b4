// ============================================================
// Layer 6 — Metrics
// ============================================================
// Scores predictions against gold labels and records one CSV
// row per epoch:
//
//   epoch,train_loss,dev_loss,dev_accuracy,dev_pearson
//   1,0.251200,0.240100,0.512000,0.611000
//   2,0.198700,0.203300,0.566000,0.702000
//
// Pearson compares the predicted class (mapped back onto the
// label scale) with the raw gold label.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::label::LabelMapping;

/// Fraction of predictions equal to the gold class.
pub fn accuracy(predictions: &[usize], gold: &[usize]) -> f64 {
    if predictions.is_empty() || predictions.len() != gold.len() {
        return 0.0;
    }
    let hits = predictions.iter().zip(gold).filter(|(p, g)| p == g).count();
    hits as f64 / predictions.len() as f64
}

/// Pearson correlation; 0 when either side has no variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len();
    if n == 0 || n != ys.len() {
        return 0.0;
    }
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let mut cov   = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov   += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }
    cov / (var_x.sqrt() * var_y.sqrt())
}

pub fn mse(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.is_empty() || xs.len() != ys.len() {
        return 0.0;
    }
    xs.iter().zip(ys).map(|(x, y)| (x - y).powi(2)).sum::<f64>() / xs.len() as f64
}

/// Accuracy, Pearson and MSE of `predictions` against raw `labels`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub accuracy: f64,
    pub pearson:  f64,
    pub mse:      f64,
}

impl Scores {
    pub fn compute(mapping: &LabelMapping, predictions: &[usize], labels: &[f32]) -> Self {
        let gold: Vec<usize> = labels.iter().map(|&l| mapping.gold_class(l)).collect();
        let predicted: Vec<f64> = predictions
            .iter()
            .map(|&c| mapping.class_score(c) as f64)
            .collect();
        let actual: Vec<f64> = labels.iter().map(|&l| l as f64).collect();

        Self {
            accuracy: accuracy(predictions, &gold),
            pearson:  pearson(&predicted, &actual),
            mse:      mse(&predicted, &actual),
        }
    }
}

/// One row of the metrics CSV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:        usize,
    pub train_loss:   f64,
    pub dev_loss:     f64,
    pub dev_accuracy: f64,
    pub dev_pearson:  f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, dev_loss: f64, scores: Scores) -> Self {
        Self {
            epoch,
            train_loss,
            dev_loss,
            dev_accuracy: scores.accuracy,
            dev_pearson:  scores.pearson,
        }
    }

    /// True if this epoch beat the best dev loss seen so far.
    pub fn is_improvement(&self, best_dev_loss: f64) -> bool {
        self.dev_loss < best_dev_loss
    }
}

/// Appends epoch metrics to `<dir>/metrics.csv`.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the header if the file does not exist yet.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "epoch,train_loss,dev_loss,dev_accuracy,dev_pearson")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6}",
            m.epoch, m.train_loss, m.dev_loss, m.dev_accuracy, m.dev_pearson,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, dev_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.dev_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
