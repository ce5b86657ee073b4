// ============================================================
// Layer 3 — Core Traits
// ============================================================
// Abstractions the data and infra layers implement. The
// application layer only talks to these.

use anyhow::Result;
use std::path::Path;

use crate::domain::pair::SentencePair;

// ─── PairSource ───────────────────────────────────────────────────────────────
/// Anything that can produce labelled sentence pairs.
///
/// Implementations:
///   - SplitLoader → reads a SICK-style split directory
pub trait PairSource {
    fn load_all(&self) -> Result<Vec<SentencePair>>;
}

// ─── Persistable ──────────────────────────────────────────────────────────────
/// State that can be written to and restored from disk.
///
/// Implementations:
///   - Vocab → one token per line
pub trait Persistable: Sized {
    fn save(&self, path: &Path) -> Result<()>;

    fn load(path: &Path) -> Result<Self>;
}
