// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting persistence and reporting:
//
//   checkpoint.rs — model weights (CompactRecorder), epoch
//                   pointers, TrainConfig JSON and vocabularies
//
//   metrics.rs    — accuracy / Pearson / MSE and the per-epoch
//                   metrics CSV

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Scoring helpers and the metrics CSV logger
pub mod metrics;
