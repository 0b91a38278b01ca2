//! Error model shared by the scanner, converters, header reconciliation and
//! the row processor.
//!
//! Two families of failures exist:
//!
//! - [`ParseError`]: a recoverable, per-row (or per-header) problem. It is a
//!   reusable value that callers can reset between attempts and inspect with
//!   [`ParseError::is_error`]. Operations taking `Option<&mut ParseError>`
//!   record into it when present (collect mode) and return
//!   [`CsvError::Parse`] when absent (fail-fast mode).
//! - [`ConfigError`]: a fatal problem with the schema itself (bad format
//!   pattern, conflicting flags, cyclic `after` constraints...). These are
//!   raised while building the schema, never while parsing rows.

use std::{fmt, io};

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    #[default]
    None,
    InvalidFormat,
    TruncatedColumn,
    NoHeader,
    InvalidHeader,
    MustNotBeBlank,
    TooFewColumns,
    TooManyColumns,
    InvalidEntity,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::None => "NONE",
            ErrorKind::InvalidFormat => "INVALID_FORMAT",
            ErrorKind::TruncatedColumn => "TRUNCATED_COLUMN",
            ErrorKind::NoHeader => "NO_HEADER",
            ErrorKind::InvalidHeader => "INVALID_HEADER",
            ErrorKind::MustNotBeBlank => "MUST_NOT_BE_BLANK",
            ErrorKind::TooFewColumns => "TOO_FEW_COLUMNS",
            ErrorKind::TooManyColumns => "TOO_MANY_COLUMNS",
            ErrorKind::InvalidEntity => "INVALID_ENTITY",
            ErrorKind::InternalError => "INTERNAL_ERROR",
        }
    }

    /// The input could not be mapped at all, so no row can be read from it.
    pub fn is_header_failure(&self) -> bool {
        matches!(self, ErrorKind::NoHeader | ErrorKind::InvalidHeader)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recoverable failure while reading a header or a row.
///
/// `offset` is the 0-based byte offset in `line` where the offending cell (or
/// character) starts. `line_number` is 1-based and counts the header line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Error)]
#[error("{kind} at line {line_number}, offset {offset}: {message}")]
pub struct ParseError {
    pub kind: ErrorKind,
    pub message: String,
    pub line: String,
    pub line_number: usize,
    pub offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_type: Option<String>,
}

impl ParseError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_error(&self) -> bool {
        self.kind != ErrorKind::None
    }

    pub fn reset(&mut self) {
        self.kind = ErrorKind::None;
        self.message.clear();
        self.line.clear();
        self.line_number = 0;
        self.offset = 0;
        self.column = None;
        self.cell = None;
        self.expected_type = None;
    }

    /// Records a failure located in `line`. Any previous content is replaced.
    pub fn set(
        &mut self,
        kind: ErrorKind,
        message: impl Into<String>,
        line: &str,
        line_number: usize,
        offset: usize,
    ) -> &mut Self {
        self.kind = kind;
        self.message = message.into();
        self.line.clear();
        self.line.push_str(line);
        self.line_number = line_number;
        self.offset = offset;
        self.column = None;
        self.cell = None;
        self.expected_type = None;
        self
    }

    pub fn with_column(&mut self, column: &str) -> &mut Self {
        self.column = Some(column.to_string());
        self
    }

    pub fn with_cell(&mut self, cell: &str) -> &mut Self {
        self.cell = Some(cell.to_string());
        self
    }

    pub fn with_expected_type(&mut self, expected: &str) -> &mut Self {
        self.expected_type = Some(expected.to_string());
        self
    }

    /// Fills in column context that converters do not know about, keeping
    /// anything the converter already recorded.
    pub(crate) fn annotate(&mut self, column: &str, cell: &str, expected: &str) {
        if self.column.is_none() {
            self.column = Some(column.to_string());
        }
        if self.cell.is_none() {
            self.cell = Some(cell.to_string());
        }
        if self.expected_type.is_none() {
            self.expected_type = Some(expected.to_string());
        }
    }
}

/// Fatal schema problems detected while building a [`crate::schema::ColumnSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid format '{format}': {reason}")]
    InvalidFormat { format: String, reason: String },
    #[error("conflicting converter flags {flags:#x}: {reason}")]
    ConflictingFlags { flags: u32, reason: String },
    #[error("column '{column}': {source}")]
    Column {
        column: String,
        #[source]
        source: Box<ConfigError>,
    },
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),
    #[error("column '{column}' is declared after unknown column '{after}'")]
    UnknownAfter { column: String, after: String },
    #[error("cyclic 'after' constraints between columns: {}", .0.join(", "))]
    CyclicOrder(Vec<String>),
    #[error("no record factory was supplied")]
    MissingFactory,
    #[error("no converter registered for type {0}")]
    MissingConverter(&'static str),
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl ConfigError {
    pub fn invalid_format(format: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidFormat {
            format: format.to_string(),
            reason: reason.into(),
        }
    }

    pub fn conflicting_flags(flags: u32, reason: impl Into<String>) -> Self {
        ConfigError::ConflictingFlags {
            flags,
            reason: reason.into(),
        }
    }

    pub(crate) fn in_column(self, column: &str) -> Self {
        ConfigError::Column {
            column: column.to_string(),
            source: Box::new(self),
        }
    }
}

#[derive(Debug, Error)]
pub enum CsvError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type CsvResult<T> = std::result::Result<T, CsvError>;

/// Routes a failure that was recorded into `scratch` according to the
/// caller's choice of sink. Returns `Ok(())` when the error was stored in the
/// caller's sink.
pub(crate) fn deliver(scratch: ParseError, sink: Option<&mut ParseError>) -> CsvResult<()> {
    match sink {
        Some(target) => {
            *target = scratch;
            Ok(())
        }
        None => Err(CsvError::Parse(scratch)),
    }
}
