use std::{fmt::Write as _, marker::PhantomData};

use chrono::{
    DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc,
    format::{self, Item, Parsed, StrftimeItems},
};

use super::{CellContext, Converter, short_type_name};
use crate::error::{ConfigError, ParseError};

/// A chrono type readable and writable through compiled strftime items.
pub trait Temporal: Sized + 'static {
    const DEFAULT_FORMAT: &'static str;

    /// A value used to check at configuration time that a pattern can render
    /// this type and read it back; chrono only reports missing fields while
    /// formatting or resolving.
    fn sample() -> Self;

    fn from_parsed(parsed: &Parsed) -> chrono::ParseResult<Self>;

    fn render(&self, items: &[Item<'static>], out: &mut String) -> std::fmt::Result;
}

impl Temporal for NaiveDate {
    const DEFAULT_FORMAT: &'static str = "%Y-%m-%d";

    fn sample() -> Self {
        NaiveDate::default()
    }

    fn from_parsed(parsed: &Parsed) -> chrono::ParseResult<Self> {
        parsed.to_naive_date()
    }

    fn render(&self, items: &[Item<'static>], out: &mut String) -> std::fmt::Result {
        write!(out, "{}", self.format_with_items(items.iter()))
    }
}

impl Temporal for NaiveDateTime {
    const DEFAULT_FORMAT: &'static str = "%Y-%m-%d %H:%M:%S%.f";

    fn sample() -> Self {
        NaiveDateTime::default()
    }

    fn from_parsed(parsed: &Parsed) -> chrono::ParseResult<Self> {
        parsed.to_naive_datetime_with_offset(0)
    }

    fn render(&self, items: &[Item<'static>], out: &mut String) -> std::fmt::Result {
        write!(out, "{}", self.format_with_items(items.iter()))
    }
}

impl Temporal for NaiveTime {
    const DEFAULT_FORMAT: &'static str = "%H:%M:%S%.f";

    fn sample() -> Self {
        NaiveTime::MIN
    }

    fn from_parsed(parsed: &Parsed) -> chrono::ParseResult<Self> {
        parsed.to_naive_time()
    }

    fn render(&self, items: &[Item<'static>], out: &mut String) -> std::fmt::Result {
        write!(out, "{}", self.format_with_items(items.iter()))
    }
}

impl Temporal for DateTime<Utc> {
    const DEFAULT_FORMAT: &'static str = "%Y-%m-%dT%H:%M:%S%.f%:z";

    fn sample() -> Self {
        DateTime::<Utc>::default()
    }

    /// Text without an offset is read as UTC.
    fn from_parsed(parsed: &Parsed) -> chrono::ParseResult<Self> {
        match parsed.to_datetime() {
            Ok(value) => Ok(value.with_timezone(&Utc)),
            Err(err) => parsed
                .to_naive_datetime_with_offset(0)
                .map(|naive| naive.and_utc())
                .map_err(|_| err),
        }
    }

    fn render(&self, items: &[Item<'static>], out: &mut String) -> std::fmt::Result {
        write!(out, "{}", self.format_with_items(items.iter()))
    }
}

#[derive(Debug)]
pub struct TemporalConverter<T>(PhantomData<fn() -> T>);

impl<T> TemporalConverter<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for TemporalConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A strftime pattern compiled once and validated against the converter's
/// type.
#[derive(Debug, Clone)]
pub struct TemporalConfig {
    pattern: String,
    items: Vec<Item<'static>>,
}

impl TemporalConfig {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn parse<T: Temporal>(&self, text: &str) -> chrono::ParseResult<T> {
        let mut parsed = Parsed::new();
        format::parse(&mut parsed, text, self.items.iter())?;
        T::from_parsed(&parsed)
    }
}

impl<T: Temporal> Converter for TemporalConverter<T> {
    type Value = T;
    type Config = TemporalConfig;

    fn configure(&self, format: Option<&str>, _flags: u32) -> Result<TemporalConfig, ConfigError> {
        let pattern = format.unwrap_or(T::DEFAULT_FORMAT);
        let items = StrftimeItems::new(pattern)
            .parse_to_owned()
            .map_err(|_| ConfigError::invalid_format(pattern, "not a valid strftime pattern"))?;
        let config = TemporalConfig {
            pattern: pattern.to_string(),
            items,
        };

        let mut sample = String::new();
        if T::sample().render(&config.items, &mut sample).is_err() {
            return Err(ConfigError::invalid_format(
                pattern,
                format!("pattern cannot render a {}", short_type_name::<T>()),
            ));
        }
        if let Err(err) = config.parse::<T>(&sample) {
            return Err(ConfigError::invalid_format(
                pattern,
                format!(
                    "pattern cannot read a {} back from '{sample}': {err}",
                    short_type_name::<T>()
                ),
            ));
        }
        Ok(config)
    }

    fn needs_quoting(&self, _config: &TemporalConfig) -> bool {
        false
    }

    fn always_trims(&self) -> bool {
        true
    }

    fn to_text(&self, config: &TemporalConfig, value: &T) -> Option<String> {
        let mut out = String::new();
        value.render(&config.items, &mut out).ok()?;
        Some(out)
    }

    fn from_text(
        &self,
        cell: &CellContext<'_>,
        config: &TemporalConfig,
        error: &mut ParseError,
    ) -> Option<T> {
        if cell.text.is_empty() {
            return None;
        }
        match config.parse::<T>(cell.text) {
            Ok(value) => Some(value),
            Err(err) => {
                cell.invalid(
                    error,
                    format!(
                        "'{}' does not match pattern '{}': {err}",
                        cell.text, config.pattern
                    ),
                );
                None
            }
        }
    }
}
