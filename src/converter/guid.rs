use uuid::Uuid;

use super::{CellContext, Converter};
use crate::error::{ConfigError, ParseError};

/// Reads any textual UUID form (hyphenated, simple, braced, URN) and writes
/// the form named by the format, hyphenated by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidConverter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UuidConfig {
    #[default]
    Hyphenated,
    Simple,
    Braced,
    Urn,
}

impl Converter for UuidConverter {
    type Value = Uuid;
    type Config = UuidConfig;

    fn type_name(&self) -> &'static str {
        "uuid"
    }

    fn configure(&self, format: Option<&str>, _flags: u32) -> Result<UuidConfig, ConfigError> {
        let Some(format) = format else {
            return Ok(UuidConfig::default());
        };
        match format.trim().to_ascii_lowercase().as_str() {
            "hyphenated" => Ok(UuidConfig::Hyphenated),
            "simple" => Ok(UuidConfig::Simple),
            "braced" => Ok(UuidConfig::Braced),
            "urn" => Ok(UuidConfig::Urn),
            _ => Err(ConfigError::invalid_format(
                format,
                "expected hyphenated, simple, braced or urn",
            )),
        }
    }

    fn needs_quoting(&self, _config: &UuidConfig) -> bool {
        false
    }

    fn always_trims(&self) -> bool {
        true
    }

    fn to_text(&self, config: &UuidConfig, value: &Uuid) -> Option<String> {
        Some(match config {
            UuidConfig::Hyphenated => value.hyphenated().to_string(),
            UuidConfig::Simple => value.simple().to_string(),
            UuidConfig::Braced => value.braced().to_string(),
            UuidConfig::Urn => value.urn().to_string(),
        })
    }

    fn from_text(
        &self,
        cell: &CellContext<'_>,
        _config: &UuidConfig,
        error: &mut ParseError,
    ) -> Option<Uuid> {
        if cell.text.is_empty() {
            return None;
        }
        match Uuid::parse_str(cell.text) {
            Ok(value) => Some(value),
            Err(err) => {
                cell.invalid(error, format!("'{}' is not a UUID: {err}", cell.text));
                None
            }
        }
    }
}
