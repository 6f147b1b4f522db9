use serde::{Deserialize, Serialize};

use crate::inference::ArtifactError;

const LEAF: i64 = -1;

/// Something that maps one scaled feature row to an output index.
pub trait Decision {
    /// Number of distinct output indices.
    fn n_outputs(&self) -> usize;

    /// Validate internal shapes against the expected input width.
    fn check(&self, n_features: usize) -> Result<(), ArtifactError>;

    fn decide(&self, x: &[f64]) -> usize;
}

/// Index of the largest value, first one on ties.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// Multinomial linear decision function (e.g. logistic regression).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    /// One row of coefficients per class; a single row means binary.
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
}

impl LinearModel {
    pub fn scores(&self, x: &[f64]) -> Vec<f64> {
        self.coef.iter()
            .zip(&self.intercept)
            .map(|(row, b)| row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>() + b)
            .collect()
    }
}

impl Decision for LinearModel {
    fn n_outputs(&self) -> usize {
        if self.coef.len() == 1 { 2 } else { self.coef.len() }
    }

    fn check(&self, n_features: usize) -> Result<(), ArtifactError> {
        if self.coef.is_empty() || self.coef.len() != self.intercept.len() {
            return Err(ArtifactError::Shape(format!(
                "linear model has {} coefficient rows and {} intercepts", self.coef.len(), self.intercept.len()
            )));
        }
        if let Some(row) = self.coef.iter().position(|row| row.len() != n_features) {
            return Err(ArtifactError::Shape(format!(
                "coefficient row {} has {} values, expected {}", row, self.coef[row].len(), n_features
            )));
        }
        Ok(())
    }

    fn decide(&self, x: &[f64]) -> usize {
        let scores = self.scores(x);
        if scores.len() == 1 {
            (scores[0] > 0.) as usize
        } else {
            argmax(&scores)
        }
    }
}

/// A fitted decision tree in flat node-array form.
///
/// Node `i` is a leaf when `children_left[i] == -1`; otherwise the sample goes
/// left when `x[feature[i]] <= threshold[i]`. `value[i]` holds the class
/// weights (counts or fractions) seen at node `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<Vec<f64>>,
}

impl Tree {
    pub fn n_nodes(&self) -> usize {
        self.children_left.len()
    }

    fn check(&self, n_features: usize, n_classes: usize) -> Result<(), String> {
        let n = self.n_nodes();
        if n == 0 {
            return Err("no nodes".to_string());
        }
        if self.children_right.len() != n || self.feature.len() != n || self.threshold.len() != n || self.value.len() != n {
            return Err(format!("tree node arrays differ in length (expected {})", n));
        }

        for node in 0..n {
            if self.value[node].len() != n_classes {
                return Err(format!(
                    "node {} has {} class weights, expected {}", node, self.value[node].len(), n_classes
                ));
            }

            let (left, right) = (self.children_left[node], self.children_right[node]);
            if left == LEAF && right == LEAF {
                continue;
            }

            // Children always come after their parent, so traversal terminates
            let in_range = |child: i64| child > node as i64 && (child as usize) < n;
            if !in_range(left) || !in_range(right) {
                return Err(format!("node {} has invalid children ({}, {})", node, left, right));
            }
            if self.feature[node] < 0 || self.feature[node] as usize >= n_features {
                return Err(format!("node {} splits on unknown feature {}", node, self.feature[node]));
            }
        }
        Ok(())
    }

    pub fn leaf(&self, x: &[f64]) -> usize {
        let mut node = 0;
        while self.children_left[node] != LEAF {
            let goes_left = x[self.feature[node] as usize] <= self.threshold[node];
            node = if goes_left { self.children_left[node] } else { self.children_right[node] } as usize;
        }
        node
    }

    /// Normalized class weights of the leaf reached by `x`.
    pub fn predict_proba(&self, x: &[f64]) -> Vec<f64> {
        let weights = &self.value[self.leaf(x)];
        let total: f64 = weights.iter().sum();
        if total > 0. {
            weights.iter().map(|w| w / total).collect()
        } else {
            vec![0.; weights.len()]
        }
    }
}

/// Averaged ensemble of trees (a random forest, or a single tree).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forest {
    pub n_classes: usize,
    pub trees: Vec<Tree>,
}

impl Forest {
    pub fn predict_proba(&self, x: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.; self.n_classes];
        for tree in self.trees.iter() {
            for (acc, p) in proba.iter_mut().zip(tree.predict_proba(x)) {
                *acc += p;
            }
        }

        let n_trees = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n_trees);
        proba
    }
}

impl Decision for Forest {
    fn n_outputs(&self) -> usize {
        self.n_classes
    }

    fn check(&self, n_features: usize) -> Result<(), ArtifactError> {
        if self.trees.is_empty() {
            return Err(ArtifactError::Shape("forest has no trees".to_string()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.check(n_features, self.n_classes)
                .map_err(|msg| ArtifactError::Shape(format!("tree {}: {}", i, msg)))?;
        }
        Ok(())
    }

    fn decide(&self, x: &[f64]) -> usize {
        argmax(&self.predict_proba(x))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classifier {
    Linear(LinearModel),
    Forest(Forest),
}

impl Decision for Classifier {
    fn n_outputs(&self) -> usize {
        match self {
            Classifier::Linear(m) => m.n_outputs(),
            Classifier::Forest(m) => m.n_outputs(),
        }
    }

    fn check(&self, n_features: usize) -> Result<(), ArtifactError> {
        match self {
            Classifier::Linear(m) => m.check(n_features),
            Classifier::Forest(m) => m.check(n_features),
        }
    }

    fn decide(&self, x: &[f64]) -> usize {
        match self {
            Classifier::Linear(m) => m.decide(x),
            Classifier::Forest(m) => m.decide(x),
        }
    }
}
