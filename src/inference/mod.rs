//! Scale → classify → label.
//!
//! A [`Pipeline`] binds one fitted scaler to one fitted classifier. Both are
//! validated against the feature layout when the pipeline is built, so a
//! mismatched artifact pair fails at startup instead of silently producing
//! wrong labels.

use std::path::Path;

use rayon::prelude::*;
use thiserror::Error;

use crate::shared_interface::{AlertLevel, FeatureVector, FEATURE_NAMES, N_FEATURES};

pub mod artifact;
pub mod classifier;
pub mod scaler;

#[cfg(test)]
pub(crate) mod fixtures;

use artifact::{ModelArtifact, ScalerArtifact};
use classifier::{Classifier, Decision};
use scaler::StandardScaler;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("I/O error for {0}: {1}")]
    IO(String, #[source] std::io::Error),
    #[error("Could not decode {0}: {1}")]
    Bincode(String, #[source] bincode::Error),
    #[error("Could not decode {0}: {1}")]
    Json(String, #[source] serde_json::Error),
    #[error("Unsupported {artifact} artifact version {found} (expected {expected})")]
    Version { artifact: &'static str, found: u32, expected: u32 },
    #[error("Scaler feature {position} is \"{found}\", expected \"{expected}\"")]
    FeatureOrder { position: usize, expected: String, found: String },
    #[error("Expected {expected} features, artifact has {found}")]
    FeatureCount { expected: usize, found: usize },
    #[error("Model has {classes} class codes for {outputs} classifier outputs")]
    ClassCount { classes: usize, outputs: usize },
    #[error("Model class code {0} is not an alert level")]
    UnknownClass(u32),
    #[error("Invalid artifact shape: {0}")]
    Shape(String),
}

/// Check that the scaler was fitted on exactly our feature order.
fn check_feature_order(scaler: &StandardScaler) -> Result<(), ArtifactError> {
    if scaler.n_features() != N_FEATURES {
        return Err(ArtifactError::FeatureCount { expected: N_FEATURES, found: scaler.n_features() });
    }

    for (position, (found, expected)) in scaler.feature_names.iter().zip(FEATURE_NAMES.iter()).enumerate() {
        if found != expected {
            return Err(ArtifactError::FeatureOrder {
                position,
                expected: expected.to_string(),
                found: found.clone(),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    scaler: StandardScaler,
    classifier: Classifier,
    labels: Vec<AlertLevel>,
}

impl Pipeline {
    pub fn new(scaler: ScalerArtifact, model: ModelArtifact) -> Result<Pipeline, ArtifactError> {
        artifact::check_version("scaler", scaler.format_version)?;
        artifact::check_version("model", model.format_version)?;

        let scaler = scaler.scaler;
        scaler.check()?;
        check_feature_order(&scaler)?;

        if model.n_features != N_FEATURES {
            return Err(ArtifactError::FeatureCount { expected: N_FEATURES, found: model.n_features });
        }
        model.classifier.check(model.n_features)?;

        let outputs = model.classifier.n_outputs();
        if model.classes.len() != outputs {
            return Err(ArtifactError::ClassCount { classes: model.classes.len(), outputs });
        }

        let labels = model.classes.iter()
            .map(|&code| AlertLevel::from_code(code).ok_or(ArtifactError::UnknownClass(code)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Pipeline { scaler, classifier: model.classifier, labels })
    }

    /// Load and validate both artifacts. Any failure is fatal for the caller.
    pub fn load(scaler_path: &Path, model_path: &Path) -> Result<Pipeline, ArtifactError> {
        let scaler: ScalerArtifact = artifact::load(scaler_path)?;
        let model: ModelArtifact = artifact::load(model_path)?;

        let pipeline = Pipeline::new(scaler, model)?;
        tracing::info!(
            scaler = %scaler_path.display(),
            model = %model_path.display(),
            kind = pipeline.kind(),
            "loaded inference pipeline"
        );
        Ok(pipeline)
    }

    pub fn kind(&self) -> &'static str {
        match &self.classifier {
            Classifier::Linear(_) => "linear",
            Classifier::Forest(_) => "forest",
        }
    }

    pub fn scale(&self, features: &FeatureVector) -> FeatureVector {
        let mut scaled = FeatureVector::default();
        self.scaler.transform_into(features.as_slice(), &mut scaled.0);
        scaled
    }

    pub fn predict(&self, features: &FeatureVector) -> AlertLevel {
        let scaled = self.scale(features);
        self.labels[self.classifier.decide(scaled.as_slice())]
    }

    /// One label per row, in row order.
    pub fn predict_batch(&self, rows: &[FeatureVector]) -> Vec<AlertLevel> {
        rows.par_iter().map(|row| self.predict(row)).collect()
    }
}


#[cfg(test)]
mod tests {
    use crate::encoding::form::tests::reference_form;
    use crate::inference::{fixtures, ArtifactError, Pipeline};
    use crate::inference::artifact;
    use crate::schema::Schema;
    use crate::shared_interface::{AlertLevel, Feature, FeatureVector};

    fn event(mag: f64, depth: f64) -> FeatureVector {
        let mut vector = FeatureVector::default();
        vector.set(Feature::Mag, mag);
        vector.set(Feature::Depth, depth);
        vector
    }

    #[test]
    fn forest_predictions() {
        let pipeline = Pipeline::new(fixtures::scaler(), fixtures::forest_model()).unwrap();

        assert_eq!("forest", pipeline.kind());
        assert_eq!(AlertLevel::Green, pipeline.predict(&event(5.0, 10.)));
        assert_eq!(AlertLevel::Yellow, pipeline.predict(&event(5.0, 300.)));
        assert_eq!(AlertLevel::Orange, pipeline.predict(&event(6.5, 10.)));
        assert_eq!(AlertLevel::Red, pipeline.predict(&event(7.5, 10.)));
    }

    #[test]
    fn linear_predictions() {
        let pipeline = Pipeline::new(fixtures::scaler(), fixtures::linear_model()).unwrap();

        assert_eq!(AlertLevel::Green, pipeline.predict(&event(4.0, 10.)));
        assert_eq!(AlertLevel::Yellow, pipeline.predict(&event(6.1, 10.)));
        assert_eq!(AlertLevel::Orange, pipeline.predict(&event(7.5, 10.)));
        assert_eq!(AlertLevel::Red, pipeline.predict(&event(9.0, 10.)));
    }

    #[test]
    fn reference_event() {
        let schema = Schema::default();
        let mut warnings = Vec::new();
        let features = reference_form().to_features(&schema, &mut warnings).unwrap();

        assert_eq!(3., features.get(Feature::MagType));
        assert_eq!(1., features.get(Feature::Status));
        assert_eq!(0., features.get(Feature::LocationSource));
        assert_eq!(0., features.get(Feature::MagSource));
        assert_eq!(0., features.get(Feature::EventType));

        for model in vec![fixtures::forest_model(), fixtures::linear_model()] {
            let pipeline = Pipeline::new(fixtures::scaler(), model).unwrap();
            let label = pipeline.predict(&features);
            assert!(AlertLevel::ALL.contains(&label));

            // Deterministic
            assert_eq!(label, pipeline.predict(&features));
        }
    }

    #[test]
    fn batch_returns_one_label_per_row() {
        let pipeline = Pipeline::new(fixtures::scaler(), fixtures::forest_model()).unwrap();
        let rows: Vec<FeatureVector> = (0..1000).map(|i| event(4.5 + (i % 60) as f64 / 10., (i % 7) as f64 * 100.)).collect();

        let labels = pipeline.predict_batch(&rows);
        assert_eq!(rows.len(), labels.len());

        let sequential: Vec<AlertLevel> = rows.iter().map(|r| pipeline.predict(r)).collect();
        assert_eq!(sequential, labels);
        assert!(pipeline.predict_batch(&[]).is_empty());
    }

    #[test]
    fn scaling() {
        let pipeline = Pipeline::new(fixtures::scaler(), fixtures::forest_model()).unwrap();
        let scaled = pipeline.scale(&event(7.5, 10.));

        assert_eq!(1.5, scaled.get(Feature::Mag));
        assert_eq!(-0.4, scaled.get(Feature::Depth));
        // Zero scale leaves the centered value
        assert_eq!(0., scaled.get(Feature::EventType));
    }

    #[test]
    fn reject_reordered_scaler() {
        let mut scaler = fixtures::scaler();
        scaler.scaler.feature_names.swap(6, 7);

        match Pipeline::new(scaler, fixtures::forest_model()) {
            Err(ArtifactError::FeatureOrder { position, expected, found }) => {
                assert_eq!(6, position);
                assert_eq!("gap", expected);
                assert_eq!("dmin", found);
            }
            other => panic!("expected feature order error, got {:?}", other.map(|p| p.kind())),
        }
    }

    #[test]
    fn reject_mismatched_artifacts() {
        let mut scaler = fixtures::scaler();
        scaler.scaler.feature_names.pop();
        scaler.scaler.mean.pop();
        scaler.scaler.scale.pop();
        assert!(matches!(Pipeline::new(scaler, fixtures::forest_model()), Err(ArtifactError::FeatureCount { .. })));

        let mut model = fixtures::forest_model();
        model.classes = vec![0, 1, 2];
        assert!(matches!(Pipeline::new(fixtures::scaler(), model), Err(ArtifactError::ClassCount { .. })));

        let mut model = fixtures::linear_model();
        model.classes[3] = 9;
        assert!(matches!(Pipeline::new(fixtures::scaler(), model), Err(ArtifactError::UnknownClass(9))));

        let mut model = fixtures::linear_model();
        model.format_version = 2;
        assert!(matches!(Pipeline::new(fixtures::scaler(), model), Err(ArtifactError::Version { .. })));
    }

    #[test]
    fn load_from_files() {
        let dir = std::env::temp_dir().join(format!("quake-alert-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let scaler_path = dir.join("scaler.json");
        let model_path = dir.join("model.bin");
        artifact::save(&fixtures::scaler(), &scaler_path).unwrap();
        artifact::save(&fixtures::forest_model(), &model_path).unwrap();

        let pipeline = Pipeline::load(&scaler_path, &model_path).unwrap();
        assert_eq!(AlertLevel::Red, pipeline.predict(&event(7.5, 10.)));

        let missing = Pipeline::load(&dir.join("nope.bin"), &model_path);
        assert!(matches!(missing, Err(ArtifactError::IO(..))));

        // A JSON file read as bincode is rejected
        let wrong_format = dir.join("scaler.bin");
        std::fs::copy(&scaler_path, &wrong_format).unwrap();
        assert!(Pipeline::load(&wrong_format, &model_path).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
