use super::{CellContext, Converter, flags, reject_format};
use crate::error::{ConfigError, ParseError};

#[derive(Debug, Clone, Copy, Default)]
pub struct StringConverter;

#[derive(Debug, Clone, Copy, Default)]
pub struct StringConfig {
    trim_output: bool,
    blank_is_null: bool,
}

impl Converter for StringConverter {
    type Value = String;
    type Config = StringConfig;

    fn configure(&self, format: Option<&str>, flags: u32) -> Result<StringConfig, ConfigError> {
        reject_format(format, "String")?;
        Ok(StringConfig {
            trim_output: flags & flags::TRIM_OUTPUT != 0,
            blank_is_null: flags & flags::BLANK_IS_NULL != 0,
        })
    }

    fn needs_quoting(&self, _config: &StringConfig) -> bool {
        true
    }

    fn to_text(&self, config: &StringConfig, value: &String) -> Option<String> {
        let text = if config.trim_output {
            value.trim()
        } else {
            value.as_str()
        };
        Some(text.to_string())
    }

    fn from_text(
        &self,
        cell: &CellContext<'_>,
        config: &StringConfig,
        _error: &mut ParseError,
    ) -> Option<String> {
        if cell.text.is_empty() && config.blank_is_null {
            return None;
        }
        Some(cell.text.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CharConverter;

impl Converter for CharConverter {
    type Value = char;
    type Config = ();

    fn configure(&self, format: Option<&str>, _flags: u32) -> Result<(), ConfigError> {
        reject_format(format, "char")
    }

    fn needs_quoting(&self, _config: &()) -> bool {
        false
    }

    fn to_text(&self, _config: &(), value: &char) -> Option<String> {
        Some(value.to_string())
    }

    fn from_text(&self, cell: &CellContext<'_>, _config: &(), error: &mut ParseError) -> Option<char> {
        let mut chars = cell.text.chars();
        match (chars.next(), chars.next()) {
            (None, _) => None,
            (Some(ch), None) => Some(ch),
            (Some(_), Some(_)) => {
                cell.invalid(
                    error,
                    format!("'{}' is longer than a single character", cell.text),
                );
                None
            }
        }
    }
}
