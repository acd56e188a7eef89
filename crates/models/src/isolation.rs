use features::{FeatureVector, SchemaKind};
use serde::{Deserialize, Serialize};

use crate::estimator::{check_input, OutlierModel};
use crate::tree::{descend, validate_nodes, Split, TreeNode};
use crate::ModelError;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Node of an isolation tree. Leaves record how many training samples
/// reached them, which feeds the unbuilt-subtree path length correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IsolationNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        n_samples: usize,
    },
}

impl TreeNode for IsolationNode {
    fn split(&self) -> Option<Split> {
        match *self {
            IsolationNode::Split {
                feature,
                threshold,
                left,
                right,
            } => Some(Split {
                feature,
                threshold,
                left,
                right,
            }),
            IsolationNode::Leaf { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    pub nodes: Vec<IsolationNode>,
}

/// Average path length of an unsuccessful BST search over `n` points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Isolation forest scorer.
///
/// `score_samples = -2^(-E[h(x)] / c(max_samples))` where `h` is the leaf
/// depth plus `c(n_samples at leaf)`. The decision function subtracts the
/// fitted `offset`; negative decisions are outliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    pub format_version: u32,
    pub schema: SchemaKind,
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub model_version: String,
    pub max_samples: usize,
    pub offset: f64,
    pub trees: Vec<IsolationTree>,
}

impl IsolationForest {
    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::Corrupt("isolation forest has no trees".into()));
        }
        if self.max_samples < 2 {
            return Err(ModelError::Corrupt(format!(
                "max_samples must be at least 2, got {}",
                self.max_samples
            )));
        }
        if !self.offset.is_finite() {
            return Err(ModelError::Corrupt("offset is not finite".into()));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            validate_nodes(&tree.nodes, self.feature_names.len(), t)?;
        }
        Ok(())
    }

    /// Raw isolation score in `[-1, 0)`; lower is more abnormal.
    pub fn score_samples(&self, x: &[f64]) -> Result<f64, ModelError> {
        let mut total_depth = 0.0f64;
        for (t, tree) in self.trees.iter().enumerate() {
            let (idx, depth) = descend(&tree.nodes, x)
                .ok_or_else(|| ModelError::Corrupt(format!("tree {t} could not be traversed")))?;
            let n_samples = match tree.nodes.get(idx) {
                Some(IsolationNode::Leaf { n_samples }) => *n_samples,
                _ => return Err(ModelError::Corrupt(format!("tree {t} ended on a split"))),
            };
            total_depth += depth as f64 + average_path_length(n_samples);
        }
        let mean_depth = total_depth / self.trees.len() as f64;
        let normalizer = average_path_length(self.max_samples);
        Ok(-(2f64.powf(-mean_depth / normalizer)))
    }

    /// `score_samples - offset`.
    pub fn decision(&self, x: &[f64]) -> Result<f64, ModelError> {
        Ok(self.score_samples(x)? - self.offset)
    }
}

impl OutlierModel for IsolationForest {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn decision_function(&self, x: &FeatureVector) -> Result<f64, ModelError> {
        let values = check_input(&self.feature_names, x)?;
        self.decision(values)
    }

    fn model_version(&self) -> &str {
        &self.model_version
    }
}
