//! Small hand-built artifacts for tests.

use crate::inference::artifact::{ModelArtifact, ScalerArtifact, FORMAT_VERSION};
use crate::inference::classifier::{Classifier, Forest, LinearModel, Tree};
use crate::inference::scaler::StandardScaler;
use crate::shared_interface::{Feature, FEATURE_NAMES, N_FEATURES};

pub fn scaler() -> ScalerArtifact {
    ScalerArtifact {
        format_version: FORMAT_VERSION,
        scaler: StandardScaler {
            feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
            mean: vec![0., 0., 50., 6., 2., 100., 50., 1., 1., 5., 3., 0.1, 50., 0.5, 2., 2., 0., 2010., 6., 12.],
            scale: vec![30., 90., 100., 1., 2., 80., 40., 2., 0.5, 4., 3., 0.1, 60., 0.5, 2., 2., 0., 10., 3.5, 7.],
        },
    }
}

/// One tree over scaled magnitude and depth reaching all four alert codes:
/// small shallow events GREEN, small deep YELLOW, large ORANGE, very large RED.
pub fn forest_model() -> ModelArtifact {
    let mag = Feature::Mag.index() as i64;
    let depth = Feature::Depth.index() as i64;

    let tree = Tree {
        children_left: vec![1, 3, 5, -1, -1, -1, -1],
        children_right: vec![2, 4, 6, -1, -1, -1, -1],
        feature: vec![mag, depth, mag, -2, -2, -2, -2],
        threshold: vec![0., 0., 1., -2., -2., -2., -2.],
        value: vec![
            vec![12., 8., 10., 10.],
            vec![12., 0., 0., 8.],
            vec![0., 8., 10., 2.],
            vec![10., 0., 0., 0.],
            vec![2., 0., 0., 8.],
            vec![0., 7., 1., 2.],
            vec![0., 1., 9., 0.],
        ],
    };

    ModelArtifact {
        format_version: FORMAT_VERSION,
        n_features: N_FEATURES,
        classes: vec![0, 1, 2, 3],
        classifier: Classifier::Forest(Forest { n_classes: 4, trees: vec![tree] }),
    }
}

/// Linear scores over scaled magnitude `s`: GREEN -2s, ORANGE s,
/// RED 2s - 2, YELLOW 0.2.
pub fn linear_model() -> ModelArtifact {
    let row = |weight: f64| {
        let mut coef = vec![0.; N_FEATURES];
        coef[Feature::Mag.index()] = weight;
        coef
    };

    ModelArtifact {
        format_version: FORMAT_VERSION,
        n_features: N_FEATURES,
        classes: vec![0, 1, 2, 3],
        classifier: Classifier::Linear(LinearModel {
            coef: vec![row(-2.), row(1.), row(2.), row(0.)],
            intercept: vec![0., 0., -2., 0.2],
        }),
    }
}
