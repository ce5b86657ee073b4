// ============================================================
// Layer 5 — Child-Sum Tree-LSTM Pair Model
// ============================================================
// Encodes each sentence bottom-up along its dependency tree and
// scores the pair from the two root states.
//
// Node update for node j with children C(j) (Tai et al., 2015):
//
//   h̃   = Σ_k h_k
//   i    = σ(W_i x + U_i h̃ + b_i)
//   o    = σ(W_o x + U_o h̃ + b_o)
//   u    = tanh(W_u x + U_u h̃ + b_u)
//   f_k  = σ(W_f x + U_f h_k + b_f)          one gate per child
//   c    = i ⊙ u + Σ_k f_k ⊙ c_k
//   h    = o ⊙ tanh(c)
//
// Leaves see a single all-zero child, which reduces to the same
// formulas with h̃ = 0 and Σ f_k ⊙ c_k = 0.
//
// Pair head:
//   [h_l ⊙ h_r ; |h_l − h_r|] → Linear → σ → Linear → log_softmax
//
// The edge-aware variant concatenates a relation embedding to
// every word embedding before it enters the tree.

use burn::{
    nn::{Embedding, EmbeddingConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation,
};

use crate::domain::tree::Tree;

// ─── PairScorer ───────────────────────────────────────────────────────────────
/// What the trainer needs from a model: a score for a pair of
/// parsed sentences, with or without relation ids.
///
/// Output shape is [1, num_classes].
pub trait PairScorer<B: Backend> {
    fn forward(
        &self,
        ltree:  &Tree,
        linput: Tensor<B, 1, Int>,
        rtree:  &Tree,
        rinput: Tensor<B, 1, Int>,
    ) -> Tensor<B, 2>;

    fn forward_with_edges(
        &self,
        ltree:  &Tree,
        linput: Tensor<B, 1, Int>,
        rtree:  &Tree,
        rinput: Tensor<B, 1, Int>,
        ledge:  Tensor<B, 1, Int>,
        redge:  Tensor<B, 1, Int>,
    ) -> Tensor<B, 2>;

    /// False when `forward_with_edges` ignores the relation ids.
    fn supports_edges(&self) -> bool {
        true
    }
}

#[derive(Config, Debug)]
pub struct TreePairConfig {
    pub vocab_size:  usize,
    pub word_dim:    usize,
    pub mem_dim:     usize,
    pub hidden_dim:  usize,
    pub num_classes: usize,
    /// Relation vocabulary size, 0 builds the base model
    #[config(default = 0)]
    pub num_relations: usize,
    #[config(default = 0)]
    pub edge_dim: usize,
}

impl TreePairConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TreePairModel<B> {
        let with_edges = self.num_relations > 0 && self.edge_dim > 0;
        let edge_dim   = if with_edges { self.edge_dim } else { 0 };
        let in_dim     = self.word_dim + edge_dim;
        let m          = self.mem_dim;

        let edge_embedding = with_edges
            .then(|| EmbeddingConfig::new(self.num_relations, self.edge_dim).init(device));

        let encoder = ChildSumTreeLstm {
            ioux:    LinearConfig::new(in_dim, 3 * m).init(device),
            iouh:    LinearConfig::new(m, 3 * m).init(device),
            fx:      LinearConfig::new(in_dim, m).init(device),
            fh:      LinearConfig::new(m, m).init(device),
            mem_dim: m,
        };
        let head = SimilarityHead {
            wh: LinearConfig::new(2 * m, self.hidden_dim).init(device),
            wp: LinearConfig::new(self.hidden_dim, self.num_classes).init(device),
        };

        TreePairModel {
            embedding: EmbeddingConfig::new(self.vocab_size, self.word_dim).init(device),
            edge_embedding,
            encoder,
            head,
            edge_dim,
        }
    }
}

// ─── Encoder ──────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct ChildSumTreeLstm<B: Backend> {
    pub ioux:    Linear<B>,
    pub iouh:    Linear<B>,
    pub fx:      Linear<B>,
    pub fh:      Linear<B>,
    pub mem_dim: usize,
}

impl<B: Backend> ChildSumTreeLstm<B> {
    /// inputs: [num_tokens, in_dim] → (c, h) of the root, each [1, mem_dim]
    pub fn forward(&self, tree: &Tree, inputs: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let device   = inputs.device();
        let [_, dim] = inputs.dims();
        let mut states: Vec<Option<(Tensor<B, 2>, Tensor<B, 2>)>> = vec![None; tree.size()];

        for node in tree.post_order() {
            let tok = tree.token(node);
            let x   = inputs.clone().slice([tok..tok + 1, 0..dim]);

            let (cs, hs): (Vec<_>, Vec<_>) = tree
                .children(node)
                .iter()
                .filter_map(|&child| states[child].take())
                .unzip();
            let (child_c, child_h) = if cs.is_empty() {
                (self.zeros(&device), self.zeros(&device))
            } else {
                (Tensor::cat(cs, 0), Tensor::cat(hs, 0))
            };

            states[node] = Some(self.node_forward(x, child_c, child_h));
        }

        states[tree.root()]
            .take()
            .unwrap_or_else(|| (self.zeros(&device), self.zeros(&device)))
    }

    fn zeros(&self, device: &B::Device) -> Tensor<B, 2> {
        Tensor::zeros([1, self.mem_dim], device)
    }

    /// x: [1, in_dim], child_c / child_h: [num_children, mem_dim]
    fn node_forward(
        &self,
        x:       Tensor<B, 2>,
        child_c: Tensor<B, 2>,
        child_h: Tensor<B, 2>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let m = self.mem_dim;
        let [num_children, _] = child_h.dims();

        let h_sum = child_h.clone().sum_dim(0);
        let iou   = self.ioux.forward(x.clone()) + self.iouh.forward(h_sum);

        let i = activation::sigmoid(iou.clone().slice([0..1, 0..m]));
        let o = activation::sigmoid(iou.clone().slice([0..1, m..2 * m]));
        let u = activation::tanh(iou.slice([0..1, 2 * m..3 * m]));

        let f = activation::sigmoid(
            self.fh.forward(child_h) + self.fx.forward(x).expand([num_children, m]),
        );
        let fc = (f * child_c).sum_dim(0);

        let c = i * u + fc;
        let h = o * activation::tanh(c.clone());
        (c, h)
    }
}

// ─── Head ─────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct SimilarityHead<B: Backend> {
    pub wh: Linear<B>,
    pub wp: Linear<B>,
}

impl<B: Backend> SimilarityHead<B> {
    /// lvec, rvec: [1, mem_dim] → log-probabilities [1, num_classes]
    pub fn forward(&self, lvec: Tensor<B, 2>, rvec: Tensor<B, 2>) -> Tensor<B, 2> {
        let mult = lvec.clone() * rvec.clone();
        let dist = (lvec - rvec).abs();
        let out  = activation::sigmoid(self.wh.forward(Tensor::cat(vec![mult, dist], 1)));
        activation::log_softmax(self.wp.forward(out), 1)
    }
}

// ─── Full model ───────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct TreePairModel<B: Backend> {
    pub embedding:      Embedding<B>,
    pub edge_embedding: Option<Embedding<B>>,
    pub encoder:        ChildSumTreeLstm<B>,
    pub head:           SimilarityHead<B>,
    pub edge_dim:       usize,
}

impl<B: Backend> TreePairModel<B> {
    /// tokens (and optionally relations): [num_tokens] → [num_tokens, in_dim]
    fn embed(&self, tokens: Tensor<B, 1, Int>, edges: Option<Tensor<B, 1, Int>>) -> Tensor<B, 2> {
        let words = lookup(&self.embedding, tokens);
        let Some(edge_embedding) = &self.edge_embedding else {
            return words;
        };

        // The base signature on an edge model behaves as if every
        // relation were the zero vector.
        let relations = match edges {
            Some(edges) => lookup(edge_embedding, edges),
            None => {
                let [n, _] = words.dims();
                Tensor::zeros([n, self.edge_dim], &words.device())
            }
        };
        Tensor::cat(vec![words, relations], 1)
    }

    fn score(&self, ltree: &Tree, lx: Tensor<B, 2>, rtree: &Tree, rx: Tensor<B, 2>) -> Tensor<B, 2> {
        let (_, lh) = self.encoder.forward(ltree, lx);
        let (_, rh) = self.encoder.forward(rtree, rx);
        self.head.forward(lh, rh)
    }
}

fn lookup<B: Backend>(table: &Embedding<B>, ids: Tensor<B, 1, Int>) -> Tensor<B, 2> {
    let [n]         = ids.dims();
    let out         = table.forward(ids.unsqueeze::<2>());
    let [_, _, dim] = out.dims();
    out.reshape([n, dim])
}

impl<B: Backend> PairScorer<B> for TreePairModel<B> {
    fn forward(
        &self,
        ltree:  &Tree,
        linput: Tensor<B, 1, Int>,
        rtree:  &Tree,
        rinput: Tensor<B, 1, Int>,
    ) -> Tensor<B, 2> {
        let lx = self.embed(linput, None);
        let rx = self.embed(rinput, None);
        self.score(ltree, lx, rtree, rx)
    }

    fn forward_with_edges(
        &self,
        ltree:  &Tree,
        linput: Tensor<B, 1, Int>,
        rtree:  &Tree,
        rinput: Tensor<B, 1, Int>,
        ledge:  Tensor<B, 1, Int>,
        redge:  Tensor<B, 1, Int>,
    ) -> Tensor<B, 2> {
        let lx = self.embed(linput, Some(ledge));
        let rx = self.embed(rinput, Some(redge));
        self.score(ltree, lx, rtree, rx)
    }

    fn supports_edges(&self) -> bool {
        self.edge_embedding.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    fn ids(v: &[i64]) -> Tensor<B, 1, Int> {
        Tensor::from_data(TensorData::new(v.to_vec(), [v.len()]), &Default::default())
    }

    #[test]
    fn test_output_is_log_distribution() {
        let device = Default::default();
        let model  = TreePairConfig::new(10, 4, 6, 5, 5).init::<B>(&device);
        let ltree  = Tree::from_parents(&[2, 3, 0]).unwrap();
        let rtree  = Tree::from_parents(&[0, 1]).unwrap();

        let out = model.forward(&ltree, ids(&[2, 3, 4]), &rtree, ids(&[5, 6]));
        assert_eq!(out.dims(), [1, 5]);

        let total: f32 = out.exp().sum().into_scalar().elem();
        assert!((total - 1.0).abs() < 1e-4);
        assert!(!model.supports_edges());
    }

    #[test]
    fn test_edge_variant_uses_relations() {
        let device = Default::default();
        let model  = TreePairConfig::new(10, 4, 6, 5, 3)
            .with_num_relations(4)
            .with_edge_dim(2)
            .init::<B>(&device);
        assert!(model.supports_edges());

        let tree = Tree::from_parents(&[2, 0]).unwrap();
        let out  = model.forward_with_edges(
            &tree, ids(&[2, 3]), &tree, ids(&[2, 3]), ids(&[1, 2]), ids(&[3, 1]),
        );
        assert_eq!(out.dims(), [1, 3]);

        // Base signature still runs on an edge model.
        let base = model.forward(&tree, ids(&[2, 3]), &tree, ids(&[2, 3]));
        assert_eq!(base.dims(), [1, 3]);
    }

    #[test]
    fn test_identical_sentences_share_root_state() {
        let device  = Default::default();
        let model   = TreePairConfig::new(10, 4, 6, 5, 5).init::<B>(&device);
        let tree    = Tree::from_parents(&[3, 3, 0]).unwrap();
        let x       = lookup(&model.embedding, ids(&[1, 2, 3]));
        let (_, h1) = model.encoder.forward(&tree, x.clone());
        let (_, h2) = model.encoder.forward(&tree, x);
        let diff: f32 = (h1 - h2).abs().sum().into_scalar().elem();
        assert_eq!(diff, 0.0);
    }
}
