use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::inference::ArtifactError;
use crate::inference::classifier::Classifier;
use crate::inference::scaler::StandardScaler;

/// Artifact layout understood by this build.
pub const FORMAT_VERSION: u32 = 1;

/// Upper bound on decoded bincode size, so a corrupt length prefix fails
/// instead of allocating.
pub const MAX_ARTIFACT_BYTES: u64 = 256 * 1024 * 1024;

fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(MAX_ARTIFACT_BYTES)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Json,
    Bincode,
}

impl ArtifactFormat {
    /// JSON for `.json` files, bincode for everything else.
    pub fn from_path(path: &Path) -> Self {
        match path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ArtifactFormat::Json,
            _ => ArtifactFormat::Bincode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerArtifact {
    pub format_version: u32,
    pub scaler: StandardScaler,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub n_features: usize,
    /// Alert code produced by each classifier output index.
    pub classes: Vec<u32>,
    pub classifier: Classifier,
}

fn io_error(path: &Path, e: std::io::Error) -> ArtifactError {
    ArtifactError::IO(path.display().to_string(), e)
}

pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    let reader = BufReader::new(file);

    match ArtifactFormat::from_path(path) {
        ArtifactFormat::Json => serde_json::from_reader(reader)
            .map_err(|e| ArtifactError::Json(path.display().to_string(), e)),
        ArtifactFormat::Bincode => bincode_options().deserialize_from(reader)
            .map_err(|e| ArtifactError::Bincode(path.display().to_string(), e)),
    }
}

pub fn save<T: Serialize>(value: &T, path: &Path) -> Result<(), ArtifactError> {
    let file = File::create(path).map_err(|e| io_error(path, e))?;
    let mut writer = BufWriter::new(file);

    match ArtifactFormat::from_path(path) {
        ArtifactFormat::Json => serde_json::to_writer_pretty(&mut writer, value)
            .map_err(|e| ArtifactError::Json(path.display().to_string(), e))?,
        ArtifactFormat::Bincode => bincode_options().serialize_into(&mut writer, value)
            .map_err(|e| ArtifactError::Bincode(path.display().to_string(), e))?,
    }

    writer.flush().map_err(|e| io_error(path, e))
}

pub fn check_version(artifact: &'static str, found: u32) -> Result<(), ArtifactError> {
    if found == FORMAT_VERSION {
        Ok(())
    } else {
        Err(ArtifactError::Version { artifact, found, expected: FORMAT_VERSION })
    }
}
