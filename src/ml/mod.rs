// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model, loss and optimisation code lives here.
//
//   model.rs     — Child-Sum Tree-LSTM encoder and pair head,
//                  plus the PairScorer trait the trainer calls
//
//   criterion.rs — KL-divergence and soft cross-entropy losses
//
//   trainer.rs   — train-one-epoch / evaluate driver with
//                  gradient accumulation and step policies
//
// Reference: Tai, Socher & Manning (2015), Improved Semantic
//            Representations From Tree-Structured LSTM Networks

/// Tree-LSTM pair model and the PairScorer trait
pub mod model;

/// Loss functions over [1, num_classes] outputs
pub mod criterion;

/// Epoch training and evaluation driver
pub mod trainer;
