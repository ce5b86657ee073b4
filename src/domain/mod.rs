// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types for the concepts the rest of the system
// shares: parse trees, sentence pairs, label mapping and the
// traits the outer layers implement.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only plain structs, enums and traits

/// Arena parse tree built from parent pointers
pub mod tree;

/// A labelled pair of parsed sentences
pub mod pair;

/// Raw label → target distribution
pub mod label;

/// Abstractions implemented by the data and infra layers
pub mod traits;
