use features::{FeatureVector, SchemaKind};
use serde::{Deserialize, Serialize};

use crate::estimator::{check_input, QualityClassifier};
use crate::tree::{descend, validate_nodes, Split, TreeNode};
use crate::ModelError;

/// Node of a classification tree. Leaves carry per-class weights (counts or
/// fractions, normalized at prediction time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClassifierNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

impl TreeNode for ClassifierNode {
    fn split(&self) -> Option<Split> {
        match *self {
            ClassifierNode::Split {
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
            ClassifierNode::Leaf { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierTree {
    pub nodes: Vec<ClassifierNode>,
}

fn default_positive_class() -> i64 {
    1
}

/// Random forest classifier: the probability of each class is the mean over
/// trees of the normalized leaf class distribution, and the label is the
/// class with the highest mean probability (first one wins ties).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    pub format_version: u32,
    pub schema: SchemaKind,
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub model_version: String,
    pub classes: Vec<i64>,
    #[serde(default = "default_positive_class")]
    pub positive_class: i64,
    pub trees: Vec<ClassifierTree>,
    /// Position of `positive_class` in `classes`, set by validation.
    #[serde(skip)]
    positive_index: Option<usize>,
}

impl RandomForestClassifier {
    pub(crate) fn validate(&mut self) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::Corrupt("random forest has no trees".into()));
        }
        if self.classes.len() < 2 {
            return Err(ModelError::Corrupt(format!(
                "classifier needs at least 2 classes, found {}",
                self.classes.len()
            )));
        }
        let positive_index = self
            .classes
            .iter()
            .position(|c| *c == self.positive_class)
            .ok_or_else(|| {
                ModelError::Corrupt(format!(
                    "positive class {} is not one of {:?}",
                    self.positive_class, self.classes
                ))
            })?;
        for (t, tree) in self.trees.iter().enumerate() {
            validate_nodes(&tree.nodes, self.feature_names.len(), t)?;
            for (idx, node) in tree.nodes.iter().enumerate() {
                if let ClassifierNode::Leaf { value } = node {
                    if value.len() != self.classes.len() {
                        return Err(ModelError::Corrupt(format!(
                            "tree {t} leaf {idx} has {} class weights, expected {}",
                            value.len(),
                            self.classes.len()
                        )));
                    }
                    let total: f64 = value.iter().sum();
                    if value.iter().any(|w| !w.is_finite() || *w < 0.0) || total <= 0.0 {
                        return Err(ModelError::Corrupt(format!(
                            "tree {t} leaf {idx} has invalid class weights"
                        )));
                    }
                }
            }
        }
        self.positive_index = Some(positive_index);
        Ok(())
    }

    /// Mean class probabilities for a raw, schema-ordered sample.
    pub fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, ModelError> {
        let mut proba = vec![0.0f64; self.classes.len()];
        for (t, tree) in self.trees.iter().enumerate() {
            let leaf = descend(&tree.nodes, x)
                .and_then(|(idx, _)| tree.nodes.get(idx))
                .ok_or_else(|| ModelError::Corrupt(format!("tree {t} could not be traversed")))?;
            let ClassifierNode::Leaf { value } = leaf else {
                return Err(ModelError::Corrupt(format!("tree {t} ended on a split")));
            };
            let total: f64 = value.iter().sum();
            for (p, w) in proba.iter_mut().zip(value) {
                *p += w / total;
            }
        }
        let n = self.trees.len() as f64;
        for p in proba.iter_mut() {
            *p /= n;
        }
        Ok(proba)
    }

    /// Class label with the highest mean probability.
    pub fn predict(&self, x: &[f64]) -> Result<i64, ModelError> {
        let proba = self.predict_proba(x)?;
        Ok(self.classes[argmax(&proba)])
    }

    fn positive_index(&self) -> Result<usize, ModelError> {
        self.positive_index
            .ok_or_else(|| ModelError::Corrupt("random forest was not validated".into()))
    }
}

/// Index of the largest value; the first one wins ties.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0usize;
    for (idx, p) in values.iter().enumerate().skip(1) {
        if *p > values[best] {
            best = idx;
        }
    }
    best
}

impl QualityClassifier for RandomForestClassifier {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn pass_probability(&self, x: &FeatureVector) -> Result<f64, ModelError> {
        Ok(self.classify(x)?.1)
    }

    fn predict_pass(&self, x: &FeatureVector) -> Result<bool, ModelError> {
        Ok(self.classify(x)?.0)
    }

    fn classify(&self, x: &FeatureVector) -> Result<(bool, f64), ModelError> {
        let positive = self.positive_index()?;
        let values = check_input(&self.feature_names, x)?;
        let proba = self.predict_proba(values)?;
        let passed = self.classes[argmax(&proba)] == self.positive_class;
        Ok((passed, proba[positive].clamp(0.0, 1.0)))
    }

    fn model_version(&self) -> &str {
        &self.model_version
    }
}
