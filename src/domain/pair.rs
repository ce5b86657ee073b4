// ============================================================
// Layer 3 — SentencePair Domain Type
// ============================================================
// One labelled example: two sentences, their parse trees, the
// dependency relation of every token and a gold label.
//
//   left:   "A man is playing a guitar"
//   right:  "A person plays an instrument"
//   label:  4.2   (relatedness on a 1..5 scale)
//
// Token and relation ids index into the vocabularies built by
// the data layer; the trees point back into those id lists.

use crate::domain::tree::Tree;

/// One side of a pair: its tree, token ids and relation ids.
#[derive(Debug, Clone)]
pub struct Sentence {
    pub tree:   Tree,
    pub tokens: Vec<usize>,
    pub edges:  Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct SentencePair {
    pub ltree: Tree,
    pub lsent: Vec<usize>,
    pub rtree: Tree,
    pub rsent: Vec<usize>,

    /// Raw gold label, mapped to a target distribution by `LabelMapping`
    pub label: f32,

    /// Relation id of every token in the left sentence
    pub ledge: Vec<usize>,

    /// Relation id of every token in the right sentence
    pub redge: Vec<usize>,
}

impl SentencePair {
    pub fn new(left: Sentence, right: Sentence, label: f32) -> Self {
        Self {
            ltree: left.tree,
            lsent: left.tokens,
            rtree: right.tree,
            rsent: right.tokens,
            label,
            ledge: left.edges,
            redge: right.edges,
        }
    }
}
