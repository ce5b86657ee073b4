// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between the corpus on disk and the trainer:
//
//   split directory (a.toks, a.parents, a.rels, sim.txt, ...)
//       │
//       ▼
//   Vocab             → token / relation strings to ids
//       │
//       ▼
//   SplitLoader       → parses trees, aligns the files
//       │
//       ▼
//   PairDataset       → implements Burn's Dataset trait
//       │
//       ▼
//   Trainer           → indexes it one pair at a time

/// Word and relation vocabularies
pub mod vocab;

/// Reads a SICK-style split directory
pub mod loader;

/// Implements Burn's Dataset trait for sentence pairs
pub mod dataset;
