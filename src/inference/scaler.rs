use serde::{Deserialize, Serialize};

use crate::inference::ArtifactError;

/// Fitted per-feature standardization: `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn check(&self) -> Result<(), ArtifactError> {
        let n = self.n_features();
        if self.mean.len() != n || self.scale.len() != n {
            return Err(ArtifactError::Shape(format!(
                "scaler has {} feature names, {} means and {} scales", n, self.mean.len(), self.scale.len()
            )));
        }
        if let Some(i) = self.mean.iter().chain(self.scale.iter()).position(|v| !v.is_finite()) {
            return Err(ArtifactError::Shape(format!("scaler statistic {} is not finite", i % n.max(1))));
        }
        Ok(())
    }

    pub fn transform_into(&self, x: &[f64], out: &mut [f64]) {
        for (((o, v), mean), scale) in out.iter_mut().zip(x).zip(&self.mean).zip(&self.scale) {
            // Constant features are fitted with a zero scale
            let scale = if *scale == 0. { 1. } else { *scale };
            *o = (v - mean) / scale;
        }
    }

    pub fn transform(&self, x: &[f64]) -> Vec<f64> {
        let mut out = vec![0.; self.n_features()];
        self.transform_into(x, &mut out);
        out
    }
}
