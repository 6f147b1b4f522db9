//! Aligns an uploaded table to the feature layout the scaler expects.
//!
//! Columns are matched by normalized name, missing columns are backfilled
//! with schema defaults (or derived from an ISO 8601 `time` column for the
//! date fields) and every row is encoded into a [`FeatureVector`] in scaler
//! order. Recoverable problems become [`Warning`]s; text that cannot be read
//! as a number fails the whole upload.

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike};
use regex::Regex;
use thiserror::Error;

use crate::encoding::Encoder;
use crate::schema::{DefaultValue, Schema};
use crate::shared_interface::{Feature, FeatureMatrix, FeatureVector, Warning, N_FEATURES};

pub mod table;

pub use table::Table;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("I/O error for {0}: {1}")]
    IO(String, #[source] std::io::Error),
    #[error("Could not parse table: {0}")]
    Csv(#[from] csv::Error),
    #[error("Could not read spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("Table is empty (no header line)")]
    Empty,
    #[error("Row {row}, column \"{column}\": \"{value}\" is not a number")]
    InvalidNumber { row: usize, column: String, value: String },
    #[error("Row {row}: \"{value}\" is not an ISO 8601 timestamp")]
    InvalidTime { row: usize, value: String },
    #[error("Row {row} has {found} cells but the header has {expected}")]
    RaggedRow { row: usize, expected: usize, found: usize },
}

lazy_static! {
    static ref NON_ALPHANUMERIC: Regex = Regex::new(r"[^a-z0-9]").unwrap();
}

const TIME_COLUMN: &str = "time";
const DATE_FEATURES: [Feature; 3] = [Feature::Year, Feature::Month, Feature::Hour];

/// Lower-case a header and strip everything but letters and digits, so that
/// `Horizontal_Error` and `horizontalError` compare equal.
pub fn normalize_header(header: &str) -> String {
    NON_ALPHANUMERIC.replace_all(&header.to_lowercase(), "").into_owned()
}

/// Index of the first column whose normalized header equals `name`'s.
pub fn find_column(headers: &[String], name: &str) -> Option<usize> {
    let wanted = normalize_header(name);
    headers.iter().position(|h| normalize_header(h) == wanted)
}

/// Parse the timestamp formats found in earthquake catalog exports.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    let raw = raw.trim_end_matches('Z');
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Source {
    Column(usize),
    Time(usize),
    Default,
}

/// Result of aligning an uploaded table.
#[derive(Debug)]
pub struct Reconciled {
    /// The uploaded table with backfilled columns appended.
    pub table: Table,
    /// One feature vector per table row, in scaler order.
    pub features: FeatureMatrix,
    pub warnings: Vec<Warning>,
}

fn default_text(default: &DefaultValue) -> String {
    match default {
        DefaultValue::Number(n) => n.to_string(),
        DefaultValue::Token(t) => t.clone(),
    }
}

fn date_part(dt: &NaiveDateTime, feature: Feature) -> f64 {
    match feature {
        Feature::Year => dt.year() as f64,
        Feature::Month => dt.month() as f64,
        _ => dt.hour() as f64,
    }
}

fn resolve_sources(table: &Table) -> [Source; N_FEATURES] {
    let mut sources = [Source::Default; N_FEATURES];
    for feature in Feature::ALL.iter().copied() {
        if let Some(idx) = find_column(&table.headers, feature.name()) {
            sources[feature.index()] = Source::Column(idx);
        }
    }

    if let Some(time_idx) = find_column(&table.headers, TIME_COLUMN) {
        for feature in DATE_FEATURES.iter().copied() {
            if sources[feature.index()] == Source::Default {
                sources[feature.index()] = Source::Time(time_idx);
            }
        }
    }

    sources
}

/// Align `table` to the scaler's feature order using the defaults and codes
/// of `schema`.
pub fn reconcile(mut table: Table, schema: &Schema) -> Result<Reconciled, TableError> {
    let encoder = Encoder::new(schema);
    let sources = resolve_sources(&table);
    let mut warnings = Vec::new();

    for feature in Feature::ALL.iter().copied() {
        match sources[feature.index()] {
            Source::Default => {
                let default = schema.default_for(feature);
                tracing::debug!(column = feature.name(), %default, "missing column filled with default");
                warnings.push(Warning::MissingColumn { column: feature, default: default.to_string() });
            }
            Source::Time(idx) => {
                tracing::debug!(column = feature.name(), source = %table.headers[idx], "missing column derived from timestamp");
                warnings.push(Warning::DerivedColumn { column: feature, source: table.headers[idx].clone() });
            }
            Source::Column(_) => {}
        }
    }

    let mut blanks = [0usize; N_FEATURES];
    let mut unknown = Vec::new();
    let mut derived: Vec<Vec<String>> = vec![Vec::with_capacity(table.len()); N_FEATURES];
    let mut features = Vec::with_capacity(table.len());
    let time_idx = sources.iter().find_map(|s| if let Source::Time(idx) = s { Some(*idx) } else { None });

    for (row_idx, row) in table.rows.iter().enumerate() {
        let mut vector = FeatureVector::default();

        // Rows are 1-based and the header is row 0, as in a spreadsheet
        let row_no = row_idx + 1;
        if row.len() != table.headers.len() {
            return Err(TableError::RaggedRow { row: row_no, expected: table.headers.len(), found: row.len() });
        }

        let timestamp = match time_idx {
            Some(idx) if !row[idx].trim().is_empty() => match parse_timestamp(&row[idx]) {
                Some(dt) => Some(dt),
                None => return Err(TableError::InvalidTime { row: row_no, value: row[idx].clone() }),
            },
            _ => None,
        };

        for feature in Feature::ALL.iter().copied() {
            let value = match sources[feature.index()] {
                Source::Default => schema.encoded_default(feature),
                Source::Time(_) => match &timestamp {
                    Some(dt) => {
                        let part = date_part(dt, feature);
                        derived[feature.index()].push(part.to_string());
                        part
                    }
                    None => {
                        blanks[feature.index()] += 1;
                        derived[feature.index()].push(default_text(schema.default_for(feature)));
                        schema.encoded_default(feature)
                    }
                },
                Source::Column(idx) => {
                    let cell = row[idx].trim();
                    if cell.is_empty() {
                        blanks[feature.index()] += 1;
                        schema.encoded_default(feature)
                    } else if feature.is_categorical() {
                        encoder.encode_reporting(feature, cell, &mut unknown) as f64
                    } else {
                        match fast_float::parse::<f64, _>(cell) {
                            // Missing-value markers like "NaN" count as blanks
                            Ok(value) if value.is_nan() => {
                                blanks[feature.index()] += 1;
                                schema.encoded_default(feature)
                            }
                            Ok(value) if value.is_finite() => value,
                            _ => return Err(TableError::InvalidNumber {
                                row: row_no,
                                column: table.headers[idx].clone(),
                                value: cell.to_string(),
                            }),
                        }
                    }
                }
            };
            vector.set(feature, value);
        }

        features.push(vector);
    }

    for feature in Feature::ALL.iter().copied() {
        if blanks[feature.index()] > 0 {
            tracing::debug!(column = feature.name(), rows = blanks[feature.index()], "blank cells filled with default");
            warnings.push(Warning::BlankCells { column: feature, rows: blanks[feature.index()] });
        }
    }
    warnings.extend(unknown);

    // Backfilled columns become part of the exported table
    for feature in Feature::ALL.iter().copied() {
        match sources[feature.index()] {
            Source::Default => table.push_constant_column(feature.name(), &default_text(schema.default_for(feature))),
            Source::Time(_) => {
                let values = std::mem::take(&mut derived[feature.index()]);
                table.push_column(feature.name(), values);
            }
            Source::Column(_) => {}
        }
    }

    Ok(Reconciled { table, features, warnings })
}
