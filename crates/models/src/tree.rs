//! Flat binary decision trees as exported by the training scripts.
//!
//! Nodes live in a vector and reference children by index. A sample goes to
//! the left child when `x[feature] <= threshold`. Children always have a
//! larger index than their parent, which keeps traversal acyclic.

use crate::ModelError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Split {
    pub feature: usize,
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
}

pub(crate) trait TreeNode {
    fn split(&self) -> Option<Split>;
}

/// Structural checks shared by every tree kind.
pub(crate) fn validate_nodes<N: TreeNode>(
    nodes: &[N],
    n_features: usize,
    tree: usize,
) -> Result<(), ModelError> {
    if nodes.is_empty() {
        return Err(ModelError::Corrupt(format!("tree {tree} has no nodes")));
    }
    for (idx, node) in nodes.iter().enumerate() {
        let Some(split) = node.split() else {
            continue;
        };
        if split.feature >= n_features {
            return Err(ModelError::Corrupt(format!(
                "tree {tree} node {idx} splits on feature {} but the model has {n_features}",
                split.feature
            )));
        }
        if !split.threshold.is_finite() {
            return Err(ModelError::Corrupt(format!(
                "tree {tree} node {idx} has a non-finite threshold"
            )));
        }
        for child in [split.left, split.right] {
            if child <= idx || child >= nodes.len() {
                return Err(ModelError::Corrupt(format!(
                    "tree {tree} node {idx} points at invalid child {child}"
                )));
            }
        }
    }
    Ok(())
}

/// Walk from the root to a leaf. Returns `(leaf index, depth)`.
///
/// `None` only for trees that skipped [`validate_nodes`].
pub(crate) fn descend<N: TreeNode>(nodes: &[N], x: &[f64]) -> Option<(usize, usize)> {
    let mut idx = 0usize;
    let mut depth = 0usize;
    loop {
        let node = nodes.get(idx)?;
        match node.split() {
            None => return Some((idx, depth)),
            Some(split) => {
                let value = *x.get(split.feature)?;
                let next = if value <= split.threshold {
                    split.left
                } else {
                    split.right
                };
                if next <= idx {
                    return None;
                }
                idx = next;
                depth += 1;
            }
        }
    }
}
