//! Typed cell codecs.
//!
//! A [`Converter`] turns the text of one cell into a typed value and back. It
//! is configured once per column with an optional format string and a flag
//! bitmask ([`flags`]); the resulting configuration is an associated type the
//! converter owns, so nothing outside the converter ever inspects it.
//!
//! Columns do not hold converters directly. [`configure`] pairs a converter
//! with its configuration and erases both behind [`CellCodec`], the object
//! safe view that the scanner and the schema work with.

mod boolean;
mod enumeration;
mod guid;
mod numeric;
mod pattern;
mod string;
mod temporal;

use std::{
    any::type_name,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

pub use boolean::{BoolConfig, BoolConverter};
pub use enumeration::{CsvEnum, EnumConfig, EnumConverter};
pub use guid::{UuidConfig, UuidConverter};
pub use numeric::{DecimalConverter, FloatConverter, IntegerConverter, NumberConfig};
pub use pattern::NumberPattern;
pub use string::{CharConverter, StringConfig, StringConverter};
pub use temporal::{Temporal, TemporalConfig, TemporalConverter};

use crate::error::{ConfigError, ErrorKind, ParseError};

/// Converter flag bits. Each converter documents which bits it honours;
/// the quoting bits are handled for every converter by [`configure`].
pub mod flags {
    pub const NONE: u32 = 0;
    /// Never quote because of the converter's static policy. Content that
    /// contains the separator, the quote or a control character is still
    /// quoted.
    pub const NO_QUOTES: u32 = 1;
    /// Always wrap non-empty output in quotes.
    pub const FORCE_QUOTES: u32 = 1 << 1;
    /// Strings: trim text on output.
    pub const TRIM_OUTPUT: u32 = 1 << 2;
    /// Strings: read an empty cell as an absent value instead of `""`.
    /// Values written as `""` do not survive a round-trip with this flag.
    pub const BLANK_IS_NULL: u32 = 1 << 3;
    /// Booleans and enums: compare literals case-sensitively.
    pub const CASE_SENSITIVE: u32 = 1 << 4;
    /// Booleans: an unknown literal is an error instead of `false`.
    pub const STRICT: u32 = 1 << 5;
    /// Enums: the format names the variant used for unknown literals.
    pub const FALLBACK: u32 = 1 << 6;

    /// Resolves a flag by the name used in schema files.
    pub fn by_name(name: &str) -> Option<u32> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "no_quotes" | "unquoted" => Some(NO_QUOTES),
            "force_quotes" | "quoted" => Some(FORCE_QUOTES),
            "trim_output" => Some(TRIM_OUTPUT),
            "blank_is_null" => Some(BLANK_IS_NULL),
            "case_sensitive" => Some(CASE_SENSITIVE),
            "strict" => Some(STRICT),
            "fallback" => Some(FALLBACK),
            _ => None,
        }
    }
}

/// Location and text of the cell handed to [`Converter::from_text`].
#[derive(Debug, Clone, Copy)]
pub struct CellContext<'a> {
    pub line: &'a str,
    pub line_number: usize,
    /// 0-based byte offset of the cell within `line`.
    pub offset: usize,
    /// Cell text after unquoting, trimming and default substitution.
    pub text: &'a str,
}

impl<'a> CellContext<'a> {
    pub fn new(line: &'a str, line_number: usize, offset: usize, text: &'a str) -> Self {
        Self {
            line,
            line_number,
            offset,
            text,
        }
    }

    /// Records an [`ErrorKind::InvalidFormat`] failure for this cell.
    pub fn invalid(&self, error: &mut ParseError, message: impl Into<String>) {
        error
            .set(
                ErrorKind::InvalidFormat,
                message,
                self.line,
                self.line_number,
                self.offset,
            )
            .with_cell(self.text);
    }
}

pub trait Converter: Send + Sync + 'static {
    type Value: 'static;
    type Config: Send + Sync + 'static;

    /// Human readable type name used in error messages.
    fn type_name(&self) -> &'static str {
        short_type_name::<Self::Value>()
    }

    fn configure(&self, format: Option<&str>, flags: u32) -> Result<Self::Config, ConfigError>;

    fn needs_quoting(&self, config: &Self::Config) -> bool;

    fn always_trims(&self) -> bool {
        false
    }

    fn to_text(&self, config: &Self::Config, value: &Self::Value) -> Option<String>;

    /// Returns `None` for an absent value or when `error` was populated;
    /// callers check `error.is_error()` to tell the two apart.
    fn from_text(
        &self,
        cell: &CellContext<'_>,
        config: &Self::Config,
        error: &mut ParseError,
    ) -> Option<Self::Value>;
}

/// A converter bound to one column's configuration.
pub trait CellCodec<T>: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn needs_quoting(&self) -> bool;
    fn always_trims(&self) -> bool;
    fn to_text(&self, value: &T) -> Option<String>;
    /// Like [`Converter::from_text`], except that a panic inside the converter
    /// is reported as [`ErrorKind::InternalError`].
    fn from_text(&self, cell: &CellContext<'_>, error: &mut ParseError) -> Option<T>;
}

pub struct Configured<C: Converter> {
    converter: Arc<C>,
    config: C::Config,
    quoting: Option<bool>,
}

impl<C: Converter> Configured<C> {
    pub fn config(&self) -> &C::Config {
        &self.config
    }
}

/// Configures `converter` for one column. The quoting flags are validated and
/// applied here so individual converters only deal with their own bits.
pub fn configure<C: Converter>(
    converter: Arc<C>,
    format: Option<&str>,
    flags: u32,
) -> Result<Configured<C>, ConfigError> {
    let quoting = match (flags & flags::NO_QUOTES != 0, flags & flags::FORCE_QUOTES != 0) {
        (true, true) => {
            return Err(ConfigError::conflicting_flags(
                flags,
                "NO_QUOTES and FORCE_QUOTES are mutually exclusive",
            ));
        }
        (true, false) => Some(false),
        (false, true) => Some(true),
        (false, false) => None,
    };
    let format = format.filter(|f| !f.is_empty());
    let config = converter.configure(format, flags)?;
    Ok(Configured {
        converter,
        config,
        quoting,
    })
}

impl<C: Converter> CellCodec<C::Value> for Configured<C> {
    fn type_name(&self) -> &'static str {
        self.converter.type_name()
    }

    fn needs_quoting(&self) -> bool {
        self.quoting
            .unwrap_or_else(|| self.converter.needs_quoting(&self.config))
    }

    fn always_trims(&self) -> bool {
        self.converter.always_trims()
    }

    fn to_text(&self, value: &C::Value) -> Option<String> {
        self.converter.to_text(&self.config, value)
    }

    fn from_text(&self, cell: &CellContext<'_>, error: &mut ParseError) -> Option<C::Value> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.converter.from_text(cell, &self.config, error)
        }));
        match outcome {
            Ok(value) => value,
            Err(payload) => {
                error
                    .set(
                        ErrorKind::InternalError,
                        format!(
                            "converter for {} failed: {}",
                            self.converter.type_name(),
                            panic_message(payload.as_ref())
                        ),
                        cell.line,
                        cell.line_number,
                        cell.offset,
                    )
                    .with_cell(cell.text);
                None
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// `alloc::string::String` -> `String`, `chrono::naive::date::NaiveDate` ->
/// `NaiveDate`; generic arguments are shortened the same way.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    if full.contains('<') {
        return full;
    }
    full.rsplit("::").next().unwrap_or(full)
}

/// Rejects a format string for converters that do not take one.
pub(crate) fn reject_format(format: Option<&str>, type_name: &str) -> Result<(), ConfigError> {
    match format {
        Some(value) => Err(ConfigError::invalid_format(
            value,
            format!("{type_name} columns do not take a format"),
        )),
        None => Ok(()),
    }
}
