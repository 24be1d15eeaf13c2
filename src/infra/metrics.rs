// ============================================================
// Layer 6 — Metrics
// ============================================================
// Everything the training loop needs to measure itself:
//
//   AverageMeter   — running (sum, count) for one scalar metric
//   topk_accuracy  — precision@k over a batch of logits
//   BestAccuracy   — best-so-far tracker deciding when to checkpoint
//   MetricsLogger  — appends one CSV row per epoch
//
// Accuracies are percentages in [0, 100].
//
// Example CSV output:
//   epoch,loss,top1,top5,val_loss,val_top1,val_top5
//   1,0.693100,51.250000,100.000000,0.512300,88.000000,100.000000

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};
use serde::{Deserialize, Serialize};

// ─── AverageMeter ────────────────────────────────────────────────────────────
/// Running mean of a scalar, weighted by how many samples each update covers.
#[derive(Debug, Clone)]
pub struct AverageMeter {
    name:  &'static str,
    sum:   f64,
    count: usize,
    last:  f64,
}

impl AverageMeter {
    pub fn new(name: &'static str) -> Self {
        Self { name, sum: 0.0, count: 0, last: 0.0 }
    }

    pub fn reset(&mut self) {
        self.sum   = 0.0;
        self.count = 0;
        self.last  = 0.0;
    }

    /// Record `value` as the mean over `n` samples.
    pub fn update(&mut self, value: f64, n: usize) {
        self.last   = value;
        self.sum   += value * n as f64;
        self.count += n;
    }

    /// sum / count, or 0 before the first update.
    pub fn avg(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.sum / self.count as f64 }
    }

    pub fn last(&self) -> f64 { self.last }

    pub fn count(&self) -> usize { self.count }

    pub fn name(&self) -> &'static str { self.name }
}

// ─── Top-k accuracy ──────────────────────────────────────────────────────────
/// Precision@k for each `k` in `topk`.
///
/// `logits` is a row-major `[labels.len(), num_classes]` matrix. An example
/// counts as correct for `k` when its label is among the `k` highest scores.
/// Any `k` larger than `num_classes` is reported as 100%.
pub fn topk_accuracy(logits: &[f32], labels: &[i64], num_classes: usize, topk: &[usize]) -> Vec<f64> {
    let batch = labels.len();
    if batch == 0 || num_classes == 0 {
        return topk.iter().map(|&k| if k > num_classes { 100.0 } else { 0.0 }).collect();
    }

    // Rank of the true label within its row: how many classes score higher.
    // Ties are resolved in favour of the lower class index, as a stable sort would.
    // A label outside [0, num_classes) never counts as correct.
    let ranks: Vec<usize> = labels
        .iter()
        .enumerate()
        .map(|(i, &label)| {
            let row = logits.get(i * num_classes..(i + 1) * num_classes);
            match (row, usize::try_from(label)) {
                (Some(row), Ok(label)) if label < num_classes => {
                    let score = row[label];
                    row.iter()
                        .enumerate()
                        .filter(|&(j, &s)| s > score || (s == score && j < label))
                        .count()
                }
                _ => usize::MAX,
            }
        })
        .collect();

    topk.iter()
        .map(|&k| {
            if k > num_classes {
                100.0
            } else {
                let correct = ranks.iter().filter(|&&r| r < k).count();
                correct as f64 * 100.0 / batch as f64
            }
        })
        .collect()
}

// ─── BestAccuracy ────────────────────────────────────────────────────────────
/// Best validation accuracy seen so far.
///
/// A new result that ties the best counts as an update, so the latest of
/// equally good models is the one kept on disk.
#[derive(Debug, Clone, Copy)]
pub struct BestAccuracy {
    best: f64,
}

impl BestAccuracy {
    pub fn new(baseline: f64) -> Self {
        Self { best: baseline }
    }

    /// Returns true (and records `acc`) when `acc >= best`.
    pub fn observe(&mut self, acc: f64) -> bool {
        if acc >= self.best {
            self.best = acc;
            true
        } else {
            false
        }
    }

    pub fn best(&self) -> f64 { self.best }
}

// ─── EpochMetrics ────────────────────────────────────────────────────────────
/// One row of metrics for a single training epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 1-based epoch number
    pub epoch: usize,
    pub loss:  f64,
    pub top1:  f64,
    pub top5:  f64,
    /// (loss, top1, top5) when this epoch was validated
    pub validation: Option<(f64, f64, f64)>,
}

impl EpochMetrics {
    pub fn new(epoch: usize, loss: f64, top1: f64, top5: f64) -> Self {
        Self { epoch, loss, top1, top5, validation: None }
    }

    pub fn with_validation(mut self, loss: f64, top1: f64, top5: f64) -> Self {
        self.validation = Some((loss, top1, top5));
        self
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger in `dir`.
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("metrics.csv");

        // Appending across runs keeps the whole history in one file.
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,loss,top1,top5,val_loss,val_top1,val_top5")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row. Unvalidated epochs leave
    /// the validation columns empty.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        let validation = match m.validation {
            Some((loss, top1, top5)) => format!("{loss:.6},{top1:.6},{top5:.6}"),
            None => ",,".to_string(),
        };
        writeln!(f, "{},{:.6},{:.6},{:.6},{}", m.epoch, m.loss, m.top1, m.top5, validation)?;

        tracing::debug!(
            "Logged epoch {} metrics: loss={:.4}, top1={:.3}",
            m.epoch, m.loss, m.top1,
        );

        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}
