// ============================================================
// Layer 3 — Parse Tree
// ============================================================
// A dependency parse tree stored as an arena of nodes.
//
// Trees arrive as a line of parent pointers, one per token:
//
//   tokens:   The   cat   sat
//   parents:   2     3     0
//
// Parents are 1-based, 0 marks the root and -1 marks a token
// that is not attached to the tree (punctuation in some parsers).
// Every node remembers which token position it covers so the
// model can look up that token's embedding.

use anyhow::{bail, ensure, Context, Result};

/// One node of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// 0-based position of the token this node covers
    pub token: usize,

    /// Arena indices of the children, in token order
    pub children: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    nodes: Vec<TreeNode>,
    root:  usize,
}

impl Tree {
    /// Build a tree from parent pointers.
    pub fn from_parents(parents: &[i64]) -> Result<Self> {
        let n = parents.len();
        ensure!(n > 0, "parent pointer list is empty");

        // token position -> arena index
        let mut slot: Vec<Option<usize>> = vec![None; n];
        let mut nodes = Vec::new();
        let mut root  = None;

        for (pos, &parent) in parents.iter().enumerate() {
            if parent < -1 || parent > n as i64 {
                bail!("parent {parent} of token {} is out of range 1..={n}", pos + 1);
            }
            if parent == -1 {
                continue;
            }
            slot[pos] = Some(nodes.len());
            nodes.push(TreeNode { token: pos, children: Vec::new() });
        }

        for (pos, &parent) in parents.iter().enumerate() {
            let Some(node) = slot[pos] else { continue };
            if parent == 0 {
                if root.is_some() {
                    bail!("more than one root (token {})", pos + 1);
                }
                root = Some(node);
                continue;
            }
            let parent_pos = (parent - 1) as usize;
            let parent_node = slot[parent_pos].with_context(|| {
                format!("token {} hangs off detached token {parent}", pos + 1)
            })?;
            nodes[parent_node].children.push(node);
        }

        let root = root.context("parent pointers contain no root")?;
        let tree = Self { nodes, root };

        // A node unreachable from the root sits on a cycle.
        let reachable = tree.post_order().len();
        ensure!(
            reachable == tree.nodes.len(),
            "parent pointers contain a cycle ({} of {} nodes reachable)",
            reachable,
            tree.nodes.len()
        );
        Ok(tree)
    }

    /// Parse a whitespace separated parent pointer line.
    pub fn parse(line: &str) -> Result<Self> {
        let parents = line
            .split_whitespace()
            .map(|p| p.parse::<i64>().with_context(|| format!("bad parent pointer '{p}'")))
            .collect::<Result<Vec<_>>>()?;
        Self::from_parents(&parents)
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn children(&self, index: usize) -> &[usize] {
        &self.nodes[index].children
    }

    pub fn token(&self, index: usize) -> usize {
        self.nodes[index].token
    }

    /// Number of levels from the root down to the deepest leaf.
    pub fn depth(&self) -> usize {
        let mut best  = 0;
        let mut stack = vec![(self.root, 1usize)];
        while let Some((node, level)) = stack.pop() {
            best = best.max(level);
            for &child in &self.nodes[node].children {
                stack.push((child, level + 1));
            }
        }
        best
    }

    /// Arena indices with every child before its parent.
    pub fn post_order(&self) -> Vec<usize> {
        let mut order   = Vec::with_capacity(self.nodes.len());
        let mut visited = vec![false; self.nodes.len()];
        let mut stack   = vec![(self.root, false)];

        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                order.push(node);
                continue;
            }
            if visited[node] {
                continue;
            }
            visited[node] = true;
            stack.push((node, true));
            for &child in self.nodes[node].children.iter().rev() {
                stack.push((child, false));
            }
        }
        order
    }
}
