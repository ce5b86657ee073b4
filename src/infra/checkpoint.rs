// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores everything `evaluate` needs to rebuild a
// trained model:
//
//   checkpoints/
//     model_epoch_1.mpk.gz   ← weights after epoch 1 (CompactRecorder)
//     model_epoch_2.mpk.gz
//     ...
//     latest_epoch.json      ← last epoch written
//     best_epoch.json        ← epoch with the lowest dev loss
//     train_config.json      ← hyperparameters and architecture
//     vocab.txt              ← word vocabulary
//     relations.txt          ← relation vocabulary

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use std::{fs, path::PathBuf};

use crate::application::train_use_case::TrainConfig;
use crate::data::vocab::Vocab;
use crate::domain::traits::Persistable;
use crate::ml::model::TreePairModel;

const LATEST: &str = "latest_epoch.json";
const BEST:   &str = "best_epoch.json";
const CONFIG: &str = "train_config.json";
const WORDS:  &str = "vocab.txt";
const RELS:   &str = "relations.txt";

/// Which saved epoch to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointTag {
    Latest,
    Best,
    Epoch(usize),
}

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create the manager, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Save model weights for `epoch` and advance the latest pointer.
    pub fn save_model<B: Backend>(&self, model: &TreePairModel<B>, epoch: usize) -> Result<()> {
        // CompactRecorder appends its own extension
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        self.write_epoch(LATEST, epoch)?;
        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load weights into `model` (which must have the saved architecture).
    pub fn load_model<B: Backend>(
        &self,
        model:  TreePairModel<B>,
        tag:    CheckpointTag,
        device: &B::Device,
    ) -> Result<TreePairModel<B>> {
        let epoch = self.resolve(tag)?;
        let path  = self.dir.join(format!("model_epoch_{epoch}"));

        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?", path.display())
            })?;

        Ok(model.load_record(record))
    }

    /// Record `epoch` as the best so far.
    pub fn mark_best(&self, epoch: usize) -> Result<()> {
        self.write_epoch(BEST, epoch)
    }

    pub fn resolve(&self, tag: CheckpointTag) -> Result<usize> {
        match tag {
            CheckpointTag::Latest   => self.read_epoch(LATEST),
            CheckpointTag::Best     => self.read_epoch(BEST),
            CheckpointTag::Epoch(e) => Ok(e),
        }
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Make sure you have run 'train' before 'evaluate'.",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config '{}'", path.display()))
    }

    pub fn save_vocabs(&self, words: &Vocab, relations: &Vocab) -> Result<()> {
        words.save(&self.dir.join(WORDS))?;
        relations.save(&self.dir.join(RELS))
    }

    pub fn load_vocabs(&self) -> Result<(Vocab, Vocab)> {
        Ok((Vocab::load(&self.dir.join(WORDS))?, Vocab::load(&self.dir.join(RELS))?))
    }

    fn write_epoch(&self, name: &str, epoch: usize) -> Result<()> {
        let path = self.dir.join(name);
        fs::write(&path, serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write '{}'", path.display()))
    }

    fn read_epoch(&self, name: &str) -> Result<usize> {
        let path = self.dir.join(name);
        let s = fs::read_to_string(&path)
            .with_context(|| format!("Cannot find '{}'. Have you run 'train' first?", path.display()))?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::{PairScorer, TreePairConfig};
    use crate::domain::tree::Tree;
    use burn::backend::NdArray;

    type B = NdArray;

    #[test]
    fn test_round_trips_weights() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let ckpt   = CheckpointManager::new(dir.path()).unwrap();
        let config = TreePairConfig::new(8, 4, 4, 3, 5);

        let saved = config.init::<B>(&device);
        ckpt.save_model(&saved, 3).unwrap();
        assert_eq!(ckpt.resolve(CheckpointTag::Latest).unwrap(), 3);

        let fresh  = config.init::<B>(&device);
        let loaded = ckpt.load_model(fresh, CheckpointTag::Latest, &device).unwrap();

        let tree = Tree::from_parents(&[0, 1]).unwrap();
        let ids  = || Tensor::<B, 1, Int>::from_data(TensorData::new(vec![2i64, 3], [2]), &device);
        let a = saved.forward(&tree, ids(), &tree, ids());
        let b = loaded.forward(&tree, ids(), &tree, ids());
        let diff: f32 = (a - b).abs().sum().into_scalar().elem();
        // CompactRecorder stores half precision
        assert!(diff < 1e-2);
    }

    #[test]
    fn test_best_pointer() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        assert!(ckpt.resolve(CheckpointTag::Best).is_err());
        ckpt.mark_best(2).unwrap();
        assert_eq!(ckpt.resolve(CheckpointTag::Best).unwrap(), 2);
        assert_eq!(ckpt.resolve(CheckpointTag::Epoch(9)).unwrap(), 9);
    }

    #[test]
    fn test_config_and_vocabs_round_trip() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();

        let cfg = TrainConfig::default();
        ckpt.save_config(&cfg).unwrap();
        let back = ckpt.load_config().unwrap();
        assert_eq!(back.mem_dim, cfg.mem_dim);
        assert_eq!(back.model_kind, cfg.model_kind);

        let words = Vocab::from_lines(["a man plays"]);
        let rels  = Vocab::from_lines(["det nsubj root"]);
        ckpt.save_vocabs(&words, &rels).unwrap();
        assert_eq!(ckpt.load_vocabs().unwrap(), (words, rels));
    }
}
