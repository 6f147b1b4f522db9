use thiserror::Error;

use crate::schema::Schema;
use crate::shared_interface::{Feature, Warning};

pub mod form;

#[derive(Debug, Error, PartialEq)]
pub enum EncodeError {
    #[error("\"{0}\" is not a categorical feature")]
    NotCategorical(Feature),
    #[error("Unknown {field} \"{value}\"")]
    UnknownToken { field: Feature, value: String },
}

/// Code used for tokens that are not in the table.
pub const FALLBACK_CODE: u8 = 0;

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Categorical encoder over one schema.
#[derive(Debug, Clone, Copy)]
pub struct Encoder<'a> {
    schema: &'a Schema,
}

impl<'a> Encoder<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    pub fn encode_checked(&self, field: Feature, raw: &str) -> Result<u8, EncodeError> {
        let codes = self.schema.codes(field).ok_or(EncodeError::NotCategorical(field))?;
        let token = normalize(raw);

        codes.get(&token)
            .copied()
            .ok_or(EncodeError::UnknownToken { field, value: token })
    }

    /// Lenient encoding: anything not in the table maps to [`FALLBACK_CODE`].
    pub fn encode(&self, field: Feature, raw: &str) -> u8 {
        self.encode_checked(field, raw).unwrap_or(FALLBACK_CODE)
    }

    /// Lenient encoding that records unknown tokens in `warnings`.
    pub fn encode_reporting(&self, field: Feature, raw: &str, warnings: &mut Vec<Warning>) -> u8 {
        match self.encode_checked(field, raw) {
            Ok(code) => code,
            Err(EncodeError::UnknownToken { field, value }) => {
                let warning = Warning::UnknownCategory { field, value };
                if !warnings.contains(&warning) {
                    tracing::debug!(%warning, "using fallback code");
                    warnings.push(warning);
                }
                FALLBACK_CODE
            }
            Err(EncodeError::NotCategorical(_)) => FALLBACK_CODE,
        }
    }
}

lazy_static! {
    static ref BUILTIN_SCHEMA: Schema = Schema::default();
}

/// Encode with the built-in table.
pub fn encode(field: Feature, raw: &str) -> u8 {
    Encoder::new(&BUILTIN_SCHEMA).encode(field, raw)
}
