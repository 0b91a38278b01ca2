use std::marker::PhantomData;

use super::{CellContext, Converter, flags, short_type_name};
use crate::error::{ConfigError, ParseError};

/// A fieldless enum that can be stored in a cell by variant name.
pub trait CsvEnum: Copy + PartialEq + Send + Sync + 'static {
    fn variants() -> &'static [Self];
    fn name(&self) -> &'static str;
}

/// Reads enum variants by name, case-insensitively unless
/// [`flags::CASE_SENSITIVE`] is set. With [`flags::FALLBACK`] the format names
/// the variant that unknown literals map to.
#[derive(Debug)]
pub struct EnumConverter<T>(PhantomData<fn() -> T>);

impl<T> EnumConverter<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for EnumConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct EnumConfig<T> {
    case_sensitive: bool,
    fallback: Option<T>,
}

impl<T: CsvEnum> EnumConfig<T> {
    fn lookup(&self, text: &str) -> Option<T> {
        T::variants().iter().copied().find(|variant| {
            if self.case_sensitive {
                variant.name() == text
            } else {
                variant.name().eq_ignore_ascii_case(text)
            }
        })
    }
}

impl<T: CsvEnum> Converter for EnumConverter<T> {
    type Value = T;
    type Config = EnumConfig<T>;

    fn configure(&self, format: Option<&str>, flags: u32) -> Result<EnumConfig<T>, ConfigError> {
        let mut config = EnumConfig {
            case_sensitive: flags & flags::CASE_SENSITIVE != 0,
            fallback: None,
        };
        match (flags & flags::FALLBACK != 0, format) {
            (true, Some(name)) => {
                let fallback = config.lookup(name).ok_or_else(|| {
                    ConfigError::invalid_format(
                        name,
                        format!("no {} variant with this name", short_type_name::<T>()),
                    )
                })?;
                config.fallback = Some(fallback);
            }
            (true, None) => {
                return Err(ConfigError::conflicting_flags(
                    flags,
                    "FALLBACK requires the fallback variant name as format",
                ));
            }
            (false, Some(name)) => {
                return Err(ConfigError::invalid_format(
                    name,
                    "enum formats name a fallback variant and need the FALLBACK flag",
                ));
            }
            (false, None) => {}
        }
        Ok(config)
    }

    fn needs_quoting(&self, _config: &EnumConfig<T>) -> bool {
        false
    }

    fn always_trims(&self) -> bool {
        true
    }

    fn to_text(&self, _config: &EnumConfig<T>, value: &T) -> Option<String> {
        Some(value.name().to_string())
    }

    fn from_text(
        &self,
        cell: &CellContext<'_>,
        config: &EnumConfig<T>,
        error: &mut ParseError,
    ) -> Option<T> {
        if cell.text.is_empty() {
            return None;
        }
        if let Some(value) = config.lookup(cell.text).or(config.fallback) {
            return Some(value);
        }
        let names = T::variants()
            .iter()
            .map(|variant| variant.name())
            .collect::<Vec<_>>()
            .join(", ");
        cell.invalid(
            error,
            format!(
                "'{}' is not a {} (expected one of {names})",
                cell.text,
                short_type_name::<T>()
            ),
        );
        None
    }
}
