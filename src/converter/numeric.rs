use std::{fmt::Display, marker::PhantomData, str::FromStr};

use rust_decimal::{Decimal, RoundingStrategy};

use super::{CellContext, Converter, NumberPattern, short_type_name};
use crate::error::{ConfigError, ParseError};

/// Shared configuration of the numeric converters: an optional
/// [`NumberPattern`]. Without one, values use their canonical text form.
#[derive(Debug, Clone, Default)]
pub struct NumberConfig {
    pattern: Option<NumberPattern>,
}

impl NumberConfig {
    fn from_format(format: Option<&str>) -> Result<Self, ConfigError> {
        let pattern = format.map(NumberPattern::parse).transpose()?;
        Ok(Self { pattern })
    }

    fn needs_quoting(&self) -> bool {
        self.pattern
            .as_ref()
            .is_some_and(NumberPattern::may_need_quoting)
    }

    /// Canonical text for `cell`, or `None` after recording a format error.
    fn canonical(&self, cell: &CellContext<'_>, error: &mut ParseError) -> Option<String> {
        match &self.pattern {
            None => Some(cell.text.to_string()),
            Some(pattern) => match pattern.normalize(cell.text) {
                Ok(text) => Some(text),
                Err(message) => {
                    cell.invalid(error, message);
                    None
                }
            },
        }
    }
}

fn parse_canonical<T>(cell: &CellContext<'_>, canonical: &str, error: &mut ParseError) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    match canonical.parse::<T>() {
        Ok(value) => Some(value),
        Err(err) => {
            cell.invalid(
                error,
                format!(
                    "'{}' is not a valid {}: {err}",
                    cell.text,
                    short_type_name::<T>()
                ),
            );
            None
        }
    }
}

/// Converter for the primitive integer types.
#[derive(Debug)]
pub struct IntegerConverter<T>(PhantomData<fn() -> T>);

impl<T> IntegerConverter<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for IntegerConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Converter for IntegerConverter<T>
where
    T: Copy + Display + FromStr + 'static,
    T::Err: Display,
{
    type Value = T;
    type Config = NumberConfig;

    fn configure(&self, format: Option<&str>, _flags: u32) -> Result<NumberConfig, ConfigError> {
        NumberConfig::from_format(format)
    }

    fn needs_quoting(&self, config: &NumberConfig) -> bool {
        config.needs_quoting()
    }

    fn always_trims(&self) -> bool {
        true
    }

    fn to_text(&self, config: &NumberConfig, value: &T) -> Option<String> {
        let canonical = value.to_string();
        Some(match &config.pattern {
            Some(pattern) => pattern.render(&canonical),
            None => canonical,
        })
    }

    fn from_text(
        &self,
        cell: &CellContext<'_>,
        config: &NumberConfig,
        error: &mut ParseError,
    ) -> Option<T> {
        if cell.text.is_empty() {
            return None;
        }
        let canonical = config.canonical(cell, error)?;
        // A pattern with mandatory fraction digits renders integers as
        // `12.00`; only all-zero fractions are accepted back.
        let integral = match canonical.split_once('.') {
            Some((integer, fraction)) if config.pattern.is_some() => {
                if fraction.chars().any(|c| c != '0') {
                    cell.invalid(
                        error,
                        format!(
                            "'{}' has a fractional part but {} is an integer type",
                            cell.text,
                            short_type_name::<T>()
                        ),
                    );
                    return None;
                }
                integer
            }
            _ => canonical.as_str(),
        };
        parse_canonical(cell, integral, error)
    }
}

/// Converter for `f32` and `f64`.
#[derive(Debug)]
pub struct FloatConverter<T>(PhantomData<fn() -> T>);

impl<T> FloatConverter<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for FloatConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Converter for FloatConverter<T>
where
    T: Copy + Display + FromStr + 'static,
    T::Err: Display,
{
    type Value = T;
    type Config = NumberConfig;

    fn configure(&self, format: Option<&str>, _flags: u32) -> Result<NumberConfig, ConfigError> {
        NumberConfig::from_format(format)
    }

    fn needs_quoting(&self, config: &NumberConfig) -> bool {
        config.needs_quoting()
    }

    fn always_trims(&self) -> bool {
        true
    }

    fn to_text(&self, config: &NumberConfig, value: &T) -> Option<String> {
        Some(match &config.pattern {
            Some(pattern) => {
                let rounded = format!("{:.*}", pattern.max_fraction_digits(), value);
                // NaN and infinities have no digits to lay out.
                if rounded.bytes().any(|b| b.is_ascii_digit()) {
                    pattern.render(&rounded)
                } else {
                    rounded
                }
            }
            None => value.to_string(),
        })
    }

    fn from_text(
        &self,
        cell: &CellContext<'_>,
        config: &NumberConfig,
        error: &mut ParseError,
    ) -> Option<T> {
        if cell.text.is_empty() {
            return None;
        }
        let canonical = config.canonical(cell, error)?;
        parse_canonical(cell, &canonical, error)
    }
}

/// Converter for [`rust_decimal::Decimal`]. With a pattern, values are
/// rounded half away from zero to the pattern's fraction digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecimalConverter;

impl Converter for DecimalConverter {
    type Value = Decimal;
    type Config = NumberConfig;

    fn configure(&self, format: Option<&str>, _flags: u32) -> Result<NumberConfig, ConfigError> {
        NumberConfig::from_format(format)
    }

    fn needs_quoting(&self, config: &NumberConfig) -> bool {
        config.needs_quoting()
    }

    fn always_trims(&self) -> bool {
        true
    }

    fn to_text(&self, config: &NumberConfig, value: &Decimal) -> Option<String> {
        Some(match &config.pattern {
            Some(pattern) => {
                let digits = u32::try_from(pattern.max_fraction_digits()).unwrap_or(u32::MAX);
                let rounded =
                    value.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero);
                pattern.render(&rounded.to_string())
            }
            None => value.to_string(),
        })
    }

    fn from_text(
        &self,
        cell: &CellContext<'_>,
        config: &NumberConfig,
        error: &mut ParseError,
    ) -> Option<Decimal> {
        if cell.text.is_empty() {
            return None;
        }
        let canonical = config.canonical(cell, error)?;
        parse_canonical(cell, &canonical, error)
    }
}
