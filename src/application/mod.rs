// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: no model math, no printing, no
// direct file formats. Each use case wires the data, ml and
// infra layers together for one command.

/// The training workflow
pub mod train_use_case;

/// Scoring a split with a saved checkpoint
pub mod evaluate_use_case;
