// ============================================================
// Layer 4 — Vocabulary
// ============================================================
// Bidirectional token ↔ id map. Ids 0 and 1 are reserved:
//
//   0  <blank>   padding / missing relation
//   1  <unk>     any token not seen when the vocab was built
//
// The same type serves the word vocabulary (built from *.toks)
// and the relation vocabulary (built from *.rels).
//
// On disk a vocab is one token per line, line number = id.

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    fs,
    path::Path,
};

use crate::domain::traits::Persistable;

pub const PAD_WORD: &str = "<blank>";
pub const UNK_WORD: &str = "<unk>";
pub const PAD: usize = 0;
pub const UNK: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocab {
    labels:  Vec<String>,
    indices: HashMap<String, usize>,
}

impl Vocab {
    /// Empty vocab holding only the reserved entries.
    pub fn new() -> Self {
        let mut v = Self { labels: Vec::new(), indices: HashMap::new() };
        v.add(PAD_WORD);
        v.add(UNK_WORD);
        v
    }

    /// Build from whitespace separated token streams.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut v = Self::new();
        for line in lines {
            for tok in line.split_whitespace() {
                v.add(tok);
            }
        }
        v
    }

    /// Build from every line of the given token files.
    /// Files that do not exist are skipped.
    pub fn from_files(paths: &[impl AsRef<Path>]) -> Result<Self> {
        let mut texts = Vec::new();
        for path in paths {
            let path = path.as_ref();
            if !path.exists() {
                tracing::debug!("Vocab source '{}' missing, skipped", path.display());
                continue;
            }
            texts.push(
                fs::read_to_string(path)
                    .with_context(|| format!("Cannot read '{}'", path.display()))?,
            );
        }
        let vocab = Self::from_lines(texts.iter().flat_map(|t| t.lines()));
        tracing::info!("Built vocab of {} entries from {} files", vocab.len(), texts.len());
        Ok(vocab)
    }

    /// Insert a token, returning its id.
    pub fn add(&mut self, token: &str) -> usize {
        if let Some(&id) = self.indices.get(token) {
            return id;
        }
        let id = self.labels.len();
        self.labels.push(token.to_string());
        self.indices.insert(token.to_string(), id);
        id
    }

    pub fn id(&self, token: &str) -> usize {
        self.indices.get(token).copied().unwrap_or(UNK)
    }

    pub fn token(&self, id: usize) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    /// Map a whitespace separated line to ids.
    pub fn encode(&self, line: &str) -> Vec<usize> {
        line.split_whitespace().map(|t| self.id(t)).collect()
    }

    /// Number of entries, reserved ones included, so never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.labels.len()
    }
}

impl Default for Vocab {
    fn default() -> Self {
        Self::new()
    }
}

impl Persistable for Vocab {
    fn save(&self, path: &Path) -> Result<()> {
        let mut body = self.labels.join("\n");
        body.push('\n');
        fs::write(path, body)
            .with_context(|| format!("Cannot write vocab to '{}'", path.display()))?;
        tracing::debug!("Saved {} vocab entries to '{}'", self.len(), path.display());
        Ok(())
    }

    fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read vocab '{}'", path.display()))?;
        let mut v = Self { labels: Vec::new(), indices: HashMap::new() };
        for line in text.lines() {
            v.add(line);
        }
        // Files written by hand may lack the reserved entries.
        if v.token(PAD) != Some(PAD_WORD) || v.token(UNK) != Some(UNK_WORD) {
            let mut fixed = Self::new();
            for label in &v.labels {
                fixed.add(label);
            }
            v = fixed;
        }
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_ids() {
        let v = Vocab::new();
        assert_eq!(v.id(PAD_WORD), PAD);
        assert_eq!(v.id(UNK_WORD), UNK);
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn test_unknown_maps_to_unk() {
        let v = Vocab::from_lines(["a man plays", "a guitar"]);
        assert_eq!(v.len(), 6);
        assert_eq!(v.encode("a banjo"), vec![2, UNK]);
    }

    #[test]
    fn test_save_and_load_keeps_ids() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.txt");
        let v    = Vocab::from_lines(["nsubj det root"]);
        v.save(&path).unwrap();
        let loaded = Vocab::load(&path).unwrap();
        assert_eq!(loaded, v);
        assert_eq!(loaded.id("root"), v.id("root"));
    }

    #[test]
    fn test_load_adds_missing_reserved_entries() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.txt");
        fs::write(&path, "cat\ndog\n").unwrap();
        let v = Vocab::load(&path).unwrap();
        assert_eq!(v.id("cat"), 2);
        assert_eq!(v.token(UNK), Some(UNK_WORD));
    }
}
