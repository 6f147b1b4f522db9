use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const N_FEATURES: usize = 20;

/// Feature names in the order the scaler was fitted on.
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
    "latitude",
    "longitude",
    "depth",
    "mag",
    "magType",
    "nst",
    "gap",
    "dmin",
    "rms",
    "horizontalError",
    "depthError",
    "magError",
    "magNst",
    "status",
    "locationSource",
    "magSource",
    "type",
    "year",
    "month",
    "hour",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    Latitude,
    Longitude,
    Depth,
    Mag,
    MagType,
    Nst,
    Gap,
    Dmin,
    Rms,
    HorizontalError,
    DepthError,
    MagError,
    MagNst,
    Status,
    LocationSource,
    MagSource,
    EventType,
    Year,
    Month,
    Hour,
}

impl Feature {
    pub const ALL: [Feature; N_FEATURES] = [
        Feature::Latitude,
        Feature::Longitude,
        Feature::Depth,
        Feature::Mag,
        Feature::MagType,
        Feature::Nst,
        Feature::Gap,
        Feature::Dmin,
        Feature::Rms,
        Feature::HorizontalError,
        Feature::DepthError,
        Feature::MagError,
        Feature::MagNst,
        Feature::Status,
        Feature::LocationSource,
        Feature::MagSource,
        Feature::EventType,
        Feature::Year,
        Feature::Month,
        Feature::Hour,
    ];

    /// Position in the feature vector.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        FEATURE_NAMES[self.index()]
    }

    pub fn is_categorical(self) -> bool {
        matches!(
            self,
            Feature::MagType | Feature::Status | Feature::LocationSource | Feature::MagSource | Feature::EventType
        )
    }

    /// Counts and calendar fields, which only take non-negative whole values.
    pub fn is_whole(self) -> bool {
        matches!(self, Feature::Nst | Feature::MagNst | Feature::Year | Feature::Month | Feature::Hour)
    }

    pub fn categorical() -> impl Iterator<Item = Feature> {
        (0..N_FEATURES).map(|i| Feature::ALL[i]).filter(|f| f.is_categorical())
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL.iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| format!("unknown feature \"{}\"", s))
    }
}

/// One event as the classifier sees it (categoricals already encoded).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f64; N_FEATURES]);

impl FeatureVector {
    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.index()]
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        self.0[feature.index()] = value;
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        FeatureVector([0.; N_FEATURES])
    }
}

pub type FeatureMatrix = Vec<FeatureVector>;

/// Classifier output category. Codes follow the label encoding the model
/// was trained with (alphabetical), not severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Green,
    Orange,
    Red,
    Yellow,
}

impl AlertLevel {
    /// In order of increasing severity.
    pub const ALL: [AlertLevel; 4] = [AlertLevel::Green, AlertLevel::Yellow, AlertLevel::Orange, AlertLevel::Red];

    pub fn from_code(code: u32) -> Option<AlertLevel> {
        match code {
            0 => Some(AlertLevel::Green),
            1 => Some(AlertLevel::Orange),
            2 => Some(AlertLevel::Red),
            3 => Some(AlertLevel::Yellow),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            AlertLevel::Green => 0,
            AlertLevel::Orange => 1,
            AlertLevel::Red => 2,
            AlertLevel::Yellow => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::Green => "GREEN",
            AlertLevel::Orange => "ORANGE",
            AlertLevel::Red => "RED",
            AlertLevel::Yellow => "YELLOW",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AlertLevel::Green => "Low impact, no immediate danger.",
            AlertLevel::Yellow => "Moderate impact possible.",
            AlertLevel::Orange => "High risk of damage, stay alert.",
            AlertLevel::Red => "Critical situation, immediate action required.",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal conditions found while preparing features.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    MissingColumn { column: Feature, default: String },
    DerivedColumn { column: Feature, source: String },
    BlankCells { column: Feature, rows: usize },
    UnknownCategory { field: Feature, value: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingColumn { column, default } =>
                write!(f, "Missing column \"{}\", filled with default {}.", column, default),
            Warning::DerivedColumn { column, source } =>
                write!(f, "Missing column \"{}\", derived from \"{}\".", column, source),
            Warning::BlankCells { column, rows } =>
                write!(f, "Column \"{}\" has {} blank cell(s), filled with default.", column, rows),
            Warning::UnknownCategory { field, value } =>
                write!(f, "Unknown {} \"{}\", encoded as 0.", field, value),
        }
    }
}


#[cfg(test)]
mod tests {
    use crate::shared_interface::{AlertLevel, Feature, FEATURE_NAMES};

    #[test]
    fn feature_order_matches_names() {
        for (i, feature) in Feature::ALL.iter().enumerate() {
            assert_eq!(i, feature.index());
            assert_eq!(FEATURE_NAMES[i], feature.name());
            assert_eq!(Ok(*feature), feature.name().parse());
        }
    }

    #[test]
    fn categorical_features() {
        let names: Vec<&str> = Feature::categorical().map(|f| f.name()).collect();
        assert_eq!(vec!["magType", "status", "locationSource", "magSource", "type"], names);
    }

    #[test]
    fn alert_codes() {
        assert_eq!(Some(AlertLevel::Green), AlertLevel::from_code(0));
        assert_eq!(Some(AlertLevel::Orange), AlertLevel::from_code(1));
        assert_eq!(Some(AlertLevel::Red), AlertLevel::from_code(2));
        assert_eq!(Some(AlertLevel::Yellow), AlertLevel::from_code(3));
        assert_eq!(None, AlertLevel::from_code(4));

        for level in AlertLevel::ALL.iter() {
            assert_eq!(Some(*level), AlertLevel::from_code(level.code()));
        }
    }

    #[test]
    fn alert_serializes_uppercase() {
        assert_eq!("\"YELLOW\"", serde_json::to_string(&AlertLevel::Yellow).unwrap());
    }
}
