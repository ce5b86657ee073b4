// ============================================================
// Layer 4 — Split Loader
// ============================================================
// Reads one split (train / dev / test) of a SICK-style corpus.
// Each file holds one line per example, aligned by line number:
//
//   split/
//     a.toks      left sentence, space separated tokens
//     b.toks      right sentence
//     a.parents   left parent pointers (see domain::tree)
//     b.parents   right parent pointers
//     a.rels      left dependency relation per token (optional)
//     b.rels      right dependency relation per token (optional)
//     sim.txt     gold label
//
// Without .rels files every token gets the <unk> relation, so
// the edge-aware model still runs, it just learns nothing from
// the relations.

use anyhow::{ensure, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::vocab::{Vocab, UNK};
use crate::domain::pair::{Sentence, SentencePair};
use crate::domain::traits::PairSource;
use crate::domain::tree::Tree;

pub const SIDES: [&str; 2] = ["a", "b"];

/// Loads every pair in one split directory.
/// Implements the PairSource trait from Layer 3.
pub struct SplitLoader<'v> {
    dir:       PathBuf,
    vocab:     &'v Vocab,
    relations: &'v Vocab,
}

impl<'v> SplitLoader<'v> {
    pub fn new(dir: impl Into<PathBuf>, vocab: &'v Vocab, relations: &'v Vocab) -> Self {
        Self { dir: dir.into(), vocab, relations }
    }

    fn read_lines(&self, name: &str) -> Result<Vec<String>> {
        let path = self.dir.join(name);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        Ok(text.lines().map(str::to_string).collect())
    }

    fn read_side(&self, side: &str) -> Result<Vec<Sentence>> {
        let toks    = self.read_lines(&format!("{side}.toks"))?;
        let parents = self.read_lines(&format!("{side}.parents"))?;
        ensure!(
            toks.len() == parents.len(),
            "{side}.toks has {} lines but {side}.parents has {}",
            toks.len(),
            parents.len()
        );

        let rels_name = format!("{side}.rels");
        let rels = if self.dir.join(&rels_name).exists() {
            let rels = self.read_lines(&rels_name)?;
            ensure!(
                rels.len() == toks.len(),
                "{rels_name} has {} lines but {side}.toks has {}",
                rels.len(),
                toks.len()
            );
            Some(rels)
        } else {
            tracing::warn!(
                "'{}' has no {rels_name}, using <unk> relations",
                self.dir.display()
            );
            None
        };

        let mut sentences = Vec::with_capacity(toks.len());
        for (i, (tok_line, parent_line)) in toks.iter().zip(&parents).enumerate() {
            let line   = i + 1;
            let tokens = self.vocab.encode(tok_line);
            let tree   = Tree::parse(parent_line)
                .with_context(|| format!("{side}.parents line {line}"))?;
            let width  = parent_line.split_whitespace().count();
            ensure!(
                width == tokens.len(),
                "{side} line {line}: {} tokens but {width} parent pointers",
                tokens.len()
            );

            let edges = match &rels {
                Some(rels) => {
                    let edges = self.relations.encode(&rels[i]);
                    ensure!(
                        edges.len() == tokens.len(),
                        "{side} line {line}: {} tokens but {} relations",
                        tokens.len(),
                        edges.len()
                    );
                    edges
                }
                None => vec![UNK; tokens.len()],
            };
            sentences.push(Sentence { tree, tokens, edges });
        }
        Ok(sentences)
    }
}

impl PairSource for SplitLoader<'_> {
    fn load_all(&self) -> Result<Vec<SentencePair>> {
        ensure!(
            self.dir.is_dir(),
            "Split directory '{}' does not exist",
            self.dir.display()
        );

        let left   = self.read_side("a")?;
        let right  = self.read_side("b")?;
        let labels = self
            .read_lines("sim.txt")?
            .iter()
            .enumerate()
            .map(|(i, l)| {
                l.trim()
                    .parse::<f32>()
                    .with_context(|| format!("sim.txt line {}: bad label '{l}'", i + 1))
            })
            .collect::<Result<Vec<_>>>()?;

        ensure!(
            left.len() == right.len() && right.len() == labels.len(),
            "'{}' is misaligned: {} left, {} right, {} labels",
            self.dir.display(),
            left.len(),
            right.len(),
            labels.len()
        );

        let pairs: Vec<SentencePair> = left
            .into_iter()
            .zip(right)
            .zip(labels)
            .map(|((l, r), label)| SentencePair::new(l, r, label))
            .collect();

        tracing::info!("Loaded {} pairs from '{}'", pairs.len(), self.dir.display());
        Ok(pairs)
    }
}

/// Token files of every side of every split, for vocab building.
pub fn token_files(root: &Path, splits: &[&str], ext: &str) -> Vec<PathBuf> {
    splits
        .iter()
        .flat_map(|split| SIDES.iter().map(move |side| root.join(split).join(format!("{side}.{ext}"))))
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::{fs, path::Path};

    /// Write a tiny three-pair split into `dir`.
    pub fn write_split(dir: &Path, with_rels: bool) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("a.toks"), "a man plays\nthe cat sat\nkids run\n").unwrap();
        fs::write(dir.join("b.toks"), "a person plays\na dog sat down\nchildren run\n").unwrap();
        fs::write(dir.join("a.parents"), "2 3 0\n2 3 0\n2 0\n").unwrap();
        fs::write(dir.join("b.parents"), "2 3 0\n2 3 0 3\n2 0\n").unwrap();
        fs::write(dir.join("sim.txt"), "4.5\n2.0\n3.2\n").unwrap();
        if with_rels {
            fs::write(dir.join("a.rels"), "det nsubj root\ndet nsubj root\nnsubj root\n").unwrap();
            fs::write(dir.join("b.rels"), "det nsubj root\ndet nsubj root advmod\nnsubj root\n").unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocabs(dir: &Path) -> (Vocab, Vocab) {
        let words = Vocab::from_files(&token_files(dir, &["train"], "toks")).unwrap();
        let rels  = Vocab::from_files(&token_files(dir, &["train"], "rels")).unwrap();
        (words, rels)
    }

    #[test]
    fn test_loads_aligned_split() {
        let root = tempfile::tempdir().unwrap();
        fixtures::write_split(&root.path().join("train"), true);
        let (words, rels) = vocabs(root.path());

        let pairs = SplitLoader::new(root.path().join("train"), &words, &rels)
            .load_all()
            .unwrap();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[1].rsent.len(), 4);
        assert_eq!(pairs[1].redge.len(), 4);
        assert_eq!(pairs[1].rtree.size(), 4);
        assert_eq!(pairs[0].label, 4.5);
        assert_eq!(pairs[0].ledge[2], rels.id("root"));
    }

    #[test]
    fn test_missing_relations_fall_back_to_unk() {
        let root = tempfile::tempdir().unwrap();
        fixtures::write_split(&root.path().join("train"), false);
        let (words, rels) = vocabs(root.path());

        let pairs = SplitLoader::new(root.path().join("train"), &words, &rels)
            .load_all()
            .unwrap();
        assert!(pairs.iter().all(|p| p.ledge.iter().all(|&e| e == UNK)));
    }

    #[test]
    fn test_rejects_misaligned_labels() {
        let root = tempfile::tempdir().unwrap();
        let dir  = root.path().join("train");
        fixtures::write_split(&dir, true);
        fs::write(dir.join("sim.txt"), "4.5\n2.0\n").unwrap();
        let (words, rels) = vocabs(root.path());

        assert!(SplitLoader::new(&dir, &words, &rels).load_all().is_err());
    }

    #[test]
    fn test_rejects_token_parent_mismatch() {
        let root = tempfile::tempdir().unwrap();
        let dir  = root.path().join("train");
        fixtures::write_split(&dir, true);
        fs::write(dir.join("a.parents"), "2 0\n2 3 0\n2 0\n").unwrap();
        let (words, rels) = vocabs(root.path());

        assert!(SplitLoader::new(&dir, &words, &rels).load_all().is_err());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let words = Vocab::new();
        let rels  = Vocab::new();
        assert!(SplitLoader::new("/nonexistent/split", &words, &rels).load_all().is_err());
    }
}
