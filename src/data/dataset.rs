use burn::data::dataset::Dataset;

use crate::domain::pair::SentencePair;

/// In-memory split, indexable by the trainer through Burn's Dataset trait.
pub struct PairDataset {
    pairs: Vec<SentencePair>,
}

impl PairDataset {
    pub fn new(pairs: Vec<SentencePair>) -> Self { Self { pairs } }

    pub fn pair_count(&self) -> usize { self.pairs.len() }

    pub fn labels(&self) -> Vec<f32> {
        self.pairs.iter().map(|p| p.label).collect()
    }
}

impl Dataset<SentencePair> for PairDataset {
    fn get(&self, index: usize) -> Option<SentencePair> {
        self.pairs.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::{
            loader::{fixtures, token_files, SplitLoader},
            vocab::Vocab,
        },
        domain::traits::PairSource,
    };

    #[test]
    fn test_indexes_loaded_pairs() {
        let root = tempfile::tempdir().unwrap();
        fixtures::write_split(&root.path().join("train"), false);
        let words = Vocab::from_files(&token_files(root.path(), &["train"], "toks")).unwrap();
        let rels  = Vocab::new();

        let pairs = SplitLoader::new(root.path().join("train"), &words, &rels)
            .load_all()
            .unwrap();
        let data = PairDataset::new(pairs);

        assert_eq!(data.len(), 3);
        assert_eq!(data.labels(), vec![4.5, 2.0, 3.2]);
        assert_eq!(data.get(1).unwrap().rsent.len(), 4);
        assert!(data.get(3).is_none());
    }
}
