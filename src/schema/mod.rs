//! The shared encoding and defaults table.
//!
//! Both the single-record path and the batch path read categorical codes and
//! column defaults from one [`Schema`], so the two can never drift apart. The
//! built-in table is version 1; a JSON file may override individual entries.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared_interface::{Feature, N_FEATURES};

pub const BUILTIN_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("I/O error for {0}: {1}")]
    IO(String, #[source] std::io::Error),
    #[error("Invalid schema file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unknown feature \"{0}\" in schema")]
    UnknownFeature(String),
    #[error("Feature \"{0}\" is numeric and cannot have a code table")]
    NotCategorical(Feature),
    #[error("Default for \"{0}\" has the wrong type")]
    DefaultType(Feature),
    #[error("Default \"{token}\" for \"{feature}\" is not in its code table")]
    UnknownDefaultToken { feature: Feature, token: String },
    #[error("Default {value} for \"{feature}\" must be a finite number")]
    NotFinite { feature: Feature, value: f64 },
    #[error("Default {value} for \"{feature}\" must be a non-negative whole number")]
    NotWhole { feature: Feature, value: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Number(f64),
    Token(String),
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Number(n) => write!(f, "{}", n),
            DefaultValue::Token(t) => write!(f, "\"{}\"", t),
        }
    }
}

/// On-disk form of a schema override. Entries are keyed by feature name and
/// replace the built-in entry for that feature.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SchemaFile {
    pub version: u32,
    #[serde(default)]
    pub codes: BTreeMap<String, BTreeMap<String, u8>>,
    #[serde(default)]
    pub defaults: BTreeMap<String, DefaultValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    version: u32,
    codes: Vec<Option<BTreeMap<String, u8>>>,
    defaults: Vec<DefaultValue>,
}

fn table(entries: &[(&str, u8)]) -> BTreeMap<String, u8> {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

lazy_static! {
    static ref BUILTIN: Schema = {
        let sources = table(&[("ci", 0), ("hv", 1), ("nc", 2), ("nm", 3), ("se", 4), ("us", 5)]);

        let mut codes: Vec<Option<BTreeMap<String, u8>>> = vec![None; N_FEATURES];
        codes[Feature::MagType.index()] = Some(table(&[("mb", 0), ("ml", 1), ("ms", 2), ("mw", 3), ("mwc", 4), ("mwr", 5)]));
        codes[Feature::Status.index()] = Some(table(&[("automatic", 0), ("reviewed", 1)]));
        codes[Feature::LocationSource.index()] = Some(sources.clone());
        codes[Feature::MagSource.index()] = Some(sources);
        codes[Feature::EventType.index()] = Some(table(&[("earthquake", 0)]));

        use DefaultValue::{Number, Token};
        let defaults = vec![
            Number(0.),                    // latitude
            Number(0.),                    // longitude
            Number(10.),                   // depth
            Number(5.),                    // mag
            Token("mb".into()),            // magType
            Number(50.),                   // nst
            Number(50.),                   // gap
            Number(1.),                    // dmin
            Number(1.),                    // rms
            Number(1.),                    // horizontalError
            Number(1.),                    // depthError
            Number(0.1),                   // magError
            Number(10.),                   // magNst
            Token("reviewed".into()),      // status
            Token("ci".into()),            // locationSource
            Token("ci".into()),            // magSource
            Token("earthquake".into()),    // type
            Number(2023.),                 // year
            Number(6.),                    // month
            Number(12.),                   // hour
        ];

        Schema { version: BUILTIN_VERSION, codes, defaults }
    };
}

impl Default for Schema {
    fn default() -> Self {
        BUILTIN.clone()
    }
}

impl Schema {
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Code table of a categorical feature, `None` for numeric features.
    pub fn codes(&self, feature: Feature) -> Option<&BTreeMap<String, u8>> {
        self.codes[feature.index()].as_ref()
    }

    pub fn default_for(&self, feature: Feature) -> &DefaultValue {
        &self.defaults[feature.index()]
    }

    /// The default as it enters the feature vector (categoricals encoded).
    pub fn encoded_default(&self, feature: Feature) -> f64 {
        match self.default_for(feature) {
            DefaultValue::Number(n) => *n,
            DefaultValue::Token(t) => self.codes(feature)
                .and_then(|codes| codes.get(t))
                .map_or(0., |code| *code as f64),
        }
    }

    /// Built-in table with the entries of `file` applied on top.
    pub fn with_overrides(file: SchemaFile) -> Result<Schema, SchemaError> {
        let mut schema = Schema::default();
        schema.version = file.version;

        for (name, codes) in file.codes {
            let feature: Feature = name.parse().map_err(|_| SchemaError::UnknownFeature(name))?;
            if !feature.is_categorical() {
                return Err(SchemaError::NotCategorical(feature));
            }
            let codes = codes.into_iter().map(|(k, v)| (k.trim().to_lowercase(), v)).collect();
            schema.codes[feature.index()] = Some(codes);
        }

        for (name, default) in file.defaults {
            let feature: Feature = name.parse().map_err(|_| SchemaError::UnknownFeature(name))?;
            schema.defaults[feature.index()] = match default {
                DefaultValue::Token(token) => DefaultValue::Token(token.trim().to_lowercase()),
                number => number,
            };
        }

        schema.validate()?;
        Ok(schema)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Schema, SchemaError> {
        let file: SchemaFile = serde_json::from_reader(reader)?;
        Schema::with_overrides(file)
    }

    pub fn load(path: &Path) -> Result<Schema, SchemaError> {
        let file = std::fs::File::open(path)
            .map_err(|e| SchemaError::IO(path.display().to_string(), e))?;
        let schema = Schema::from_reader(std::io::BufReader::new(file))?;
        tracing::debug!(version = schema.version, path = %path.display(), "loaded schema overrides");
        Ok(schema)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        for feature in Feature::ALL.iter().copied() {
            match (self.default_for(feature), self.codes(feature)) {
                (DefaultValue::Number(value), None) => {
                    let value = *value;
                    if !value.is_finite() {
                        return Err(SchemaError::NotFinite { feature, value });
                    }
                    if feature.is_whole() && (value.fract() != 0. || value < 0. || value > u32::MAX as f64) {
                        return Err(SchemaError::NotWhole { feature, value });
                    }
                }
                (DefaultValue::Token(token), Some(codes)) => {
                    if !codes.contains_key(token) {
                        return Err(SchemaError::UnknownDefaultToken { feature, token: token.clone() });
                    }
                }
                _ => return Err(SchemaError::DefaultType(feature)),
            }
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use crate::schema::{DefaultValue, Schema, SchemaError, BUILTIN_VERSION};
    use crate::shared_interface::Feature;

    #[test]
    fn builtin_is_valid() {
        let schema = Schema::default();
        assert_eq!(BUILTIN_VERSION, schema.version());
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn builtin_codes() {
        let schema = Schema::default();
        assert_eq!(Some(&3), schema.codes(Feature::MagType).unwrap().get("mw"));
        assert_eq!(Some(&1), schema.codes(Feature::Status).unwrap().get("reviewed"));
        assert_eq!(Some(&5), schema.codes(Feature::MagSource).unwrap().get("us"));
        assert!(schema.codes(Feature::Mag).is_none());
    }

    #[test]
    fn encoded_defaults() {
        let schema = Schema::default();
        assert_eq!(50., schema.encoded_default(Feature::Gap));
        assert_eq!(0., schema.encoded_default(Feature::MagType));
        assert_eq!(1., schema.encoded_default(Feature::Status));
        assert_eq!(0., schema.encoded_default(Feature::LocationSource));
        assert_eq!(&DefaultValue::Token("ci".into()), schema.default_for(Feature::MagSource));
    }

    #[test]
    fn json_override() {
        let json = br#"{
            "version": 2,
            "codes": { "type": { "earthquake": 0, "Explosion": 1 } },
            "defaults": { "gap": 90.0, "type": "explosion" }
        }"#;
        let schema = Schema::from_reader(&json[..]).unwrap();

        assert_eq!(2, schema.version());
        assert_eq!(Some(&1), schema.codes(Feature::EventType).unwrap().get("explosion"));
        assert_eq!(90., schema.encoded_default(Feature::Gap));
        assert_eq!(1., schema.encoded_default(Feature::EventType));
        // Untouched entries keep the built-in values
        assert_eq!(Some(&3), schema.codes(Feature::MagType).unwrap().get("mw"));
    }

    #[test]
    fn reject_bad_overrides() {
        let unknown = br#"{ "version": 2, "defaults": { "magnitude": 5.0 } }"#;
        assert!(matches!(Schema::from_reader(&unknown[..]), Err(SchemaError::UnknownFeature(_))));

        let numeric_codes = br#"{ "version": 2, "codes": { "depth": { "deep": 1 } } }"#;
        assert!(matches!(Schema::from_reader(&numeric_codes[..]), Err(SchemaError::NotCategorical(Feature::Depth))));

        let wrong_type = br#"{ "version": 2, "defaults": { "status": 1.0 } }"#;
        assert!(matches!(Schema::from_reader(&wrong_type[..]), Err(SchemaError::DefaultType(Feature::Status))));

        let missing_token = br#"{ "version": 2, "defaults": { "status": "pending" } }"#;
        assert!(matches!(Schema::from_reader(&missing_token[..]), Err(SchemaError::UnknownDefaultToken { .. })));
    }

    #[test]
    fn reject_fractional_whole_number_defaults() {
        for json in &[
            &br#"{ "version": 2, "defaults": { "nst": 12.5 } }"#[..],
            &br#"{ "version": 2, "defaults": { "hour": -1.0 } }"#[..],
            &br#"{ "version": 2, "defaults": { "year": 2023.7 } }"#[..],
        ] {
            assert!(matches!(Schema::from_reader(*json), Err(SchemaError::NotWhole { .. })));
        }

        // Fractional values stay fine for continuous features
        let gap = br#"{ "version": 2, "defaults": { "gap": 12.5, "magNst": 3.0 } }"#;
        let schema = Schema::from_reader(&gap[..]).unwrap();
        assert_eq!(12.5, schema.encoded_default(Feature::Gap));
        assert_eq!(3., schema.encoded_default(Feature::MagNst));
    }
}
