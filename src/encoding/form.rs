use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encoding::Encoder;
use crate::schema::{DefaultValue, Schema};
use crate::shared_interface::{Feature, FeatureVector, Warning};

#[derive(Debug, Error, PartialEq)]
pub enum FormError {
    #[error("{field} = {value} is outside the allowed range [{min}, {max}]")]
    OutOfRange { field: Feature, value: f64, min: f64, max: f64 },
    #[error("{0} must be a finite number")]
    NotFinite(Feature),
    #[error("{field}: \"{value}\" is not a valid number")]
    InvalidNumber { field: Feature, value: String },
    #[error("{field}: \"{value}\" must be a whole number")]
    NotWhole { field: Feature, value: String },
}

/// Inclusive input ranges for the numeric fields of a single record.
pub const RANGES: [(Feature, f64, f64); 15] = [
    (Feature::Latitude, -90., 90.),
    (Feature::Longitude, -180., 180.),
    (Feature::Depth, 0., 700.),
    (Feature::Mag, 4.5, 10.),
    (Feature::Nst, 0., 500.),
    (Feature::Gap, 0., 360.),
    (Feature::Dmin, 0., 20.),
    (Feature::Rms, 0., 5.),
    (Feature::HorizontalError, 0., 50.),
    (Feature::DepthError, 0., 50.),
    (Feature::MagError, 0., 10.),
    (Feature::MagNst, 0., 500.),
    (Feature::Year, 1976., 2025.),
    (Feature::Month, 1., 12.),
    (Feature::Hour, 0., 23.),
];

/// A single event as entered by a user, before encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventForm {
    pub latitude: f64,
    pub longitude: f64,
    pub depth: f64,
    pub mag: f64,
    pub mag_type: String,
    pub nst: u32,
    pub gap: f64,
    pub dmin: f64,
    pub rms: f64,
    pub horizontal_error: f64,
    pub depth_error: f64,
    pub mag_error: f64,
    pub mag_nst: u32,
    pub status: String,
    pub location_source: String,
    pub mag_source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub year: u32,
    pub month: u32,
    pub hour: u32,
}

impl EventForm {
    /// Form pre-filled with the schema's defaults.
    pub fn with_defaults(schema: &Schema) -> Self {
        let mut form = EventForm {
            latitude: 0.,
            longitude: 0.,
            depth: 0.,
            mag: 0.,
            mag_type: String::new(),
            nst: 0,
            gap: 0.,
            dmin: 0.,
            rms: 0.,
            horizontal_error: 0.,
            depth_error: 0.,
            mag_error: 0.,
            mag_nst: 0,
            status: String::new(),
            location_source: String::new(),
            mag_source: String::new(),
            event_type: String::new(),
            year: 0,
            month: 0,
            hour: 0,
        };

        for feature in Feature::ALL.iter().copied() {
            match schema.default_for(feature) {
                DefaultValue::Number(n) => form.set_number(feature, *n),
                DefaultValue::Token(t) => form.set_token(feature, t),
            }
        }
        form
    }

    fn token_mut(&mut self, feature: Feature) -> Option<&mut String> {
        match feature {
            Feature::MagType => Some(&mut self.mag_type),
            Feature::Status => Some(&mut self.status),
            Feature::LocationSource => Some(&mut self.location_source),
            Feature::MagSource => Some(&mut self.mag_source),
            Feature::EventType => Some(&mut self.event_type),
            _ => None,
        }
    }

    fn set_token(&mut self, feature: Feature, token: &str) {
        if let Some(slot) = self.token_mut(feature) {
            *slot = token.to_string();
        }
    }

    // Whole-number fields are only reached with values checked by `set`
    // or with validated schema defaults.
    fn set_number(&mut self, feature: Feature, value: f64) {
        match feature {
            Feature::Latitude => self.latitude = value,
            Feature::Longitude => self.longitude = value,
            Feature::Depth => self.depth = value,
            Feature::Mag => self.mag = value,
            Feature::Nst => self.nst = value as u32,
            Feature::Gap => self.gap = value,
            Feature::Dmin => self.dmin = value,
            Feature::Rms => self.rms = value,
            Feature::HorizontalError => self.horizontal_error = value,
            Feature::DepthError => self.depth_error = value,
            Feature::MagError => self.mag_error = value,
            Feature::MagNst => self.mag_nst = value as u32,
            Feature::Year => self.year = value as u32,
            Feature::Month => self.month = value as u32,
            Feature::Hour => self.hour = value as u32,
            _ => {}
        }
    }

    /// Numeric value of a field, `None` for categorical fields.
    pub fn number(&self, feature: Feature) -> Option<f64> {
        Some(match feature {
            Feature::Latitude => self.latitude,
            Feature::Longitude => self.longitude,
            Feature::Depth => self.depth,
            Feature::Mag => self.mag,
            Feature::Nst => self.nst as f64,
            Feature::Gap => self.gap,
            Feature::Dmin => self.dmin,
            Feature::Rms => self.rms,
            Feature::HorizontalError => self.horizontal_error,
            Feature::DepthError => self.depth_error,
            Feature::MagError => self.mag_error,
            Feature::MagNst => self.mag_nst as f64,
            Feature::Year => self.year as f64,
            Feature::Month => self.month as f64,
            Feature::Hour => self.hour as f64,
            _ => return None,
        })
    }

    /// Raw token of a categorical field, `None` for numeric fields.
    pub fn token(&self, feature: Feature) -> Option<&str> {
        match feature {
            Feature::MagType => Some(&self.mag_type),
            Feature::Status => Some(&self.status),
            Feature::LocationSource => Some(&self.location_source),
            Feature::MagSource => Some(&self.mag_source),
            Feature::EventType => Some(&self.event_type),
            _ => None,
        }
    }

    /// Set a field from user text. Numbers are parsed, tokens kept verbatim.
    pub fn set(&mut self, feature: Feature, raw: &str) -> Result<(), FormError> {
        if feature.is_categorical() {
            self.set_token(feature, raw.trim());
            return Ok(());
        }

        let text = raw.trim();
        let value = match fast_float::parse::<f64, _>(text) {
            Ok(value) => value,
            Err(_) => return Err(FormError::InvalidNumber { field: feature, value: text.to_string() }),
        };

        if !value.is_finite() {
            return Err(FormError::NotFinite(feature));
        }
        if feature.is_whole() && (value.fract() != 0. || value < 0.) {
            return Err(FormError::NotWhole { field: feature, value: text.to_string() });
        }

        self.set_number(feature, value);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), FormError> {
        for (field, min, max) in RANGES.iter().copied() {
            // Every field in RANGES is numeric
            let value = self.number(field).unwrap_or_default();
            if !value.is_finite() {
                return Err(FormError::NotFinite(field));
            }
            if value < min || value > max {
                return Err(FormError::OutOfRange { field, value, min, max });
            }
        }
        Ok(())
    }

    /// Validate and encode into the scaler's feature order.
    pub fn to_features(&self, schema: &Schema, warnings: &mut Vec<Warning>) -> Result<FeatureVector, FormError> {
        self.validate()?;

        let encoder = Encoder::new(schema);
        let mut features = FeatureVector::default();

        for feature in Feature::ALL.iter().copied() {
            let value = match self.token(feature) {
                Some(token) => encoder.encode_reporting(feature, token, warnings) as f64,
                None => self.number(feature).unwrap_or_default(),
            };
            features.set(feature, value);
        }

        Ok(features)
    }
}
