//! Row processor: headers and rows in, headers and rows out.
//!
//! A [`CsvProcessor`] pairs a shared [`ColumnSchema`] with the state that
//! belongs to one input stream: the position map produced by the header and
//! the current line number. Reading methods take `&mut self`, so a processor
//! serves one stream at a time. Build a new processor (or call
//! [`CsvProcessor::reset`]) for the next input; the schema itself is shared
//! through an `Arc`.
//!
//! Every fallible read takes `Option<&mut ParseError>`:
//!
//! - `None` fails fast with [`CsvError::Parse`].
//! - `Some(sink)` records the failure in `sink` and returns an empty result.
//!   The sink is reset at the start of each attempt.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use itertools::Itertools;
use log::{debug, warn};
use serde::Deserialize;

use crate::{
    converter::panic_message,
    error::{ConfigError, CsvResult, ErrorKind, ParseError, deliver},
    header::{ColumnNameMatcher, ExactMatcher, HeaderPolicy, PositionMap, reconcile},
    io_utils::{LineSink, LineSource},
    scanner::Scanner,
    schema::ColumnSchema,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CsvOptions {
    pub separator: char,
    pub quote: char,
    /// Appended after every written line.
    pub line_terminator: String,
    /// Rows may stop before the last mapped column.
    pub allow_partial_lines: bool,
    /// Trim every cell, not only those whose column or converter asks for it.
    pub always_trim: bool,
    /// Reconcile the header against the schema. When off, the header line is
    /// consumed and cells map in declaration order.
    pub validate_header: bool,
    pub first_line_is_header: bool,
    pub flexible_order: bool,
    pub ignore_unknown_columns: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            separator: ',',
            quote: '"',
            line_terminator: "\n".to_string(),
            allow_partial_lines: false,
            always_trim: false,
            validate_header: true,
            first_line_is_header: true,
            flexible_order: false,
            ignore_unknown_columns: false,
        }
    }
}

impl CsvOptions {
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_quote(mut self, quote: char) -> Self {
        self.quote = quote;
        self
    }

    pub fn with_line_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.line_terminator = terminator.into();
        self
    }

    pub fn with_partial_lines(mut self, allow: bool) -> Self {
        self.allow_partial_lines = allow;
        self
    }

    pub fn with_always_trim(mut self, trim: bool) -> Self {
        self.always_trim = trim;
        self
    }

    pub fn with_validate_header(mut self, validate: bool) -> Self {
        self.validate_header = validate;
        self
    }

    pub fn with_header(mut self, first_line_is_header: bool) -> Self {
        self.first_line_is_header = first_line_is_header;
        self
    }

    pub fn with_flexible_order(mut self, flexible: bool) -> Self {
        self.flexible_order = flexible;
        self
    }

    pub fn with_ignore_unknown_columns(mut self, ignore: bool) -> Self {
        self.ignore_unknown_columns = ignore;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.separator == self.quote {
            return Err(ConfigError::InvalidOptions(format!(
                "separator and quote are both '{}'",
                self.separator
            )));
        }
        for (role, ch) in [("separator", self.separator), ("quote", self.quote)] {
            if ch == '\r' || ch == '\n' {
                return Err(ConfigError::InvalidOptions(format!(
                    "{role} must not be a line break"
                )));
            }
        }
        Ok(())
    }

    fn header_policy(&self) -> HeaderPolicy {
        HeaderPolicy {
            flexible_order: self.flexible_order,
            ignore_unknown_columns: self.ignore_unknown_columns,
        }
    }
}

/// Whole-record check run after every column of a row converted cleanly.
/// An `Err` rejects the row as [`ErrorKind::InvalidEntity`].
pub trait RowValidator<E>: Send + Sync {
    fn validate(&self, record: &E) -> Result<(), String>;
}

impl<E, F> RowValidator<E> for F
where
    F: Fn(&E) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, record: &E) -> Result<(), String> {
        self(record)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome<E> {
    Row(E),
    /// The line was rejected; the failure is in the caller's sink.
    Invalid,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    NeedHeader,
    Rows,
    Eof,
}

pub struct CsvProcessor<E> {
    schema: Arc<ColumnSchema<E>>,
    options: CsvOptions,
    scanner: Scanner,
    matcher: Box<dyn ColumnNameMatcher>,
    validator: Option<Box<dyn RowValidator<E>>>,
    positions: PositionMap,
    state: ReadState,
    line_number: usize,
}

impl<E> CsvProcessor<E> {
    pub fn new(schema: Arc<ColumnSchema<E>>, options: CsvOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        let positions = PositionMap::declaration_order(schema.len());
        let state = initial_state(&options);
        Ok(Self {
            scanner: Scanner::new(options.separator, options.quote),
            schema,
            options,
            matcher: Box::new(ExactMatcher),
            validator: None,
            positions,
            state,
            line_number: 0,
        })
    }

    pub fn with_matcher(mut self, matcher: impl ColumnNameMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn with_boxed_matcher(mut self, matcher: Box<dyn ColumnNameMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_validator(mut self, validator: impl RowValidator<E> + 'static) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn schema(&self) -> &Arc<ColumnSchema<E>> {
        &self.schema
    }

    pub fn options(&self) -> &CsvOptions {
        &self.options
    }

    pub fn positions(&self) -> &PositionMap {
        &self.positions
    }

    /// Number of physical lines consumed from the current source.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Forgets the current stream so the processor can read another one.
    pub fn reset(&mut self) {
        self.positions = PositionMap::declaration_order(self.schema.len());
        self.state = initial_state(&self.options);
        self.line_number = 0;
    }

    /// Header line in schema order, every name quoted. No terminator.
    pub fn build_header_line(&self) -> String {
        let separator = self.options.separator.to_string();
        self.schema
            .columns()
            .iter()
            .map(|column| {
                let mut cell = String::new();
                self.scanner.write_quoted(column.name(), &mut cell);
                cell
            })
            .join(&separator)
    }

    /// Reconciles `line` against the schema and installs the resulting
    /// position map. Returns `Ok(false)` when the failure went to `error`; the
    /// map is then back in declaration order.
    pub fn parse_header_line(
        &mut self,
        line: &str,
        line_number: usize,
        mut error: Option<&mut ParseError>,
    ) -> CsvResult<bool> {
        if let Some(sink) = error.as_deref_mut() {
            sink.reset();
        }
        let mut scratch = ParseError::new();

        let mut names = Vec::new();
        let mut starts = Vec::new();
        let mut offset = 0;
        let mut more = !line.is_empty();
        while more {
            let Some(cell) = self.scanner.read_cell(line, offset, line_number, &mut scratch) else {
                scratch.kind = ErrorKind::InvalidHeader;
                return self.reject_header(scratch, error);
            };
            starts.push(cell.start);
            names.push(cell.text.into_owned());
            offset = cell.end.next;
            more = cell.end.more;
        }

        match reconcile(
            &self.schema,
            &names,
            self.matcher.as_ref(),
            self.options.header_policy(),
        ) {
            Ok(map) => {
                self.positions = map;
                Ok(true)
            }
            Err(mismatch) => {
                let at = mismatch.cell.and_then(|idx| starts.get(idx).copied());
                scratch.set(
                    ErrorKind::InvalidHeader,
                    mismatch.message,
                    line,
                    line_number,
                    at.unwrap_or(0),
                );
                if let Some(cell) = mismatch.cell.and_then(|idx| names.get(idx)) {
                    scratch.with_cell(cell);
                }
                if let Some(column) = mismatch.column.as_deref() {
                    scratch.with_column(column);
                }
                self.reject_header(scratch, error)
            }
        }
    }

    fn reject_header(
        &mut self,
        scratch: ParseError,
        error: Option<&mut ParseError>,
    ) -> CsvResult<bool> {
        self.positions = PositionMap::declaration_order(self.schema.len());
        debug!("Header rejected: {scratch}");
        deliver(scratch, error)?;
        Ok(false)
    }

    /// Parses one data line into a new record. Returns `Ok(None)` when the
    /// failure went to `error`.
    pub fn parse_row(
        &self,
        line: &str,
        line_number: usize,
        mut error: Option<&mut ParseError>,
    ) -> CsvResult<Option<E>> {
        if let Some(sink) = error.as_deref_mut() {
            sink.reset();
        }
        let mut scratch = ParseError::new();
        match self.parse_into(line, line_number, &mut scratch) {
            Some(record) => Ok(Some(record)),
            None => {
                deliver(scratch, error)?;
                Ok(None)
            }
        }
    }

    fn parse_into(&self, line: &str, line_number: usize, error: &mut ParseError) -> Option<E> {
        let mut record = self.schema.new_record();
        let expected = self.positions.len();
        let mut offset = 0;
        // An empty line is a single empty cell.
        let mut more = expected > 0 || !line.is_empty();
        let mut cells = 0;

        while more && cells < expected {
            let end = match self.positions.get(cells).and_then(|p| self.schema.column(p)) {
                Some(column) => self.scanner.scan_column(
                    line,
                    offset,
                    line_number,
                    column,
                    &mut record,
                    self.options.always_trim,
                    error,
                )?,
                None => self.scanner.read_cell(line, offset, line_number, error)?.end,
            };
            offset = end.next;
            more = end.more;
            cells += 1;
        }

        if cells < expected && !self.options.allow_partial_lines {
            error.set(
                ErrorKind::TooFewColumns,
                format!("expected {expected} cells but found {cells}"),
                line,
                line_number,
                line.len(),
            );
            if let Some(column) = self.positions.get(cells).and_then(|p| self.schema.column(p)) {
                error.with_column(column.name());
            }
            return None;
        }
        if more && !self.options.ignore_unknown_columns {
            error
                .set(
                    ErrorKind::TooManyColumns,
                    format!("unexpected text after the last of {expected} cells"),
                    line,
                    line_number,
                    offset,
                )
                .with_cell(&line[offset..]);
            return None;
        }

        if let Some(validator) = &self.validator {
            let verdict = panic::catch_unwind(AssertUnwindSafe(|| validator.validate(&record)));
            let (kind, message) = match verdict {
                Ok(Ok(())) => return Some(record),
                Ok(Err(message)) => (ErrorKind::InvalidEntity, message),
                Err(payload) => (
                    ErrorKind::InternalError,
                    format!("row validator panicked: {}", panic_message(payload.as_ref())),
                ),
            };
            error.set(kind, message, line, line_number, 0);
            return None;
        }
        Some(record)
    }

    /// One data line in schema order. No terminator. A row that would be
    /// empty is written as a quoted empty cell.
    pub fn build_row(&self, record: &E) -> String {
        let mut line = String::new();
        for (idx, column) in self.schema.columns().iter().enumerate() {
            if idx > 0 {
                line.push(self.options.separator);
            }
            if let Some(text) = column.write(record) {
                self.scanner.write_cell(&text, column.needs_quoting(), &mut line);
            }
        }
        if line.is_empty() && !self.schema.is_empty() {
            // Keeps a lone empty cell from reading back as a blank line.
            line.push(self.options.quote);
            line.push(self.options.quote);
        }
        line
    }

    /// Consumes the header from `source`, skipping leading blank lines.
    ///
    /// Returns `Ok(false)` when a failure went to `error`: `NoHeader` for an
    /// empty input that should carry a header, `InvalidHeader` for a header
    /// that does not fit the schema. An empty input without header
    /// validation is not a failure; subsequent reads report end of input.
    pub fn read_header<S: LineSource + ?Sized>(
        &mut self,
        source: &mut S,
        mut error: Option<&mut ParseError>,
    ) -> CsvResult<bool> {
        if let Some(sink) = error.as_deref_mut() {
            sink.reset();
        }
        loop {
            let Some(line) = source.next_line()? else {
                self.state = ReadState::Eof;
                if !self.options.validate_header {
                    return Ok(true);
                }
                let mut scratch = ParseError::new();
                scratch.set(
                    ErrorKind::NoHeader,
                    "input ended before a header line",
                    "",
                    self.line_number + 1,
                    0,
                );
                deliver(scratch, error)?;
                return Ok(false);
            };
            self.line_number += 1;
            if line.is_empty() {
                continue;
            }
            self.state = ReadState::Rows;
            if !self.options.validate_header {
                debug!("Skipping unvalidated header on line {}", self.line_number);
                return Ok(true);
            }
            return self.parse_header_line(&line, self.line_number, error);
        }
    }

    /// Reads the next record, consuming the header first when one is
    /// expected and blank lines on the way.
    pub fn read_row<S: LineSource + ?Sized>(
        &mut self,
        source: &mut S,
        mut error: Option<&mut ParseError>,
    ) -> CsvResult<ReadOutcome<E>> {
        if self.state == ReadState::NeedHeader
            && !self.read_header(source, error.as_deref_mut())?
        {
            return Ok(ReadOutcome::Invalid);
        }
        if let Some(sink) = error.as_deref_mut() {
            sink.reset();
        }
        loop {
            if self.state == ReadState::Eof {
                return Ok(ReadOutcome::Eof);
            }
            let Some(line) = source.next_line()? else {
                self.state = ReadState::Eof;
                return Ok(ReadOutcome::Eof);
            };
            self.line_number += 1;
            if line.is_empty() {
                continue;
            }
            return self.read_record(source, line, error);
        }
    }

    /// Parses the record starting with `line`. A quoted cell left open at the
    /// end of a physical line continues on the next one, joined by `\n`;
    /// failures are reported at the record's first line.
    fn read_record<S: LineSource + ?Sized>(
        &mut self,
        source: &mut S,
        mut line: String,
        error: Option<&mut ParseError>,
    ) -> CsvResult<ReadOutcome<E>> {
        let first_line = self.line_number;
        loop {
            let mut scratch = ParseError::new();
            if let Some(record) = self.parse_row(&line, first_line, Some(&mut scratch))? {
                return Ok(ReadOutcome::Row(record));
            }
            if scratch.kind == ErrorKind::TruncatedColumn {
                match source.next_line()? {
                    Some(next) => {
                        self.line_number += 1;
                        line.push('\n');
                        line.push_str(&next);
                        continue;
                    }
                    None => self.state = ReadState::Eof,
                }
            }
            deliver(scratch, error)?;
            return Ok(ReadOutcome::Invalid);
        }
    }

    /// Reads every remaining record.
    ///
    /// With `errors`, each rejected line appends its own [`ParseError`] and
    /// reading continues; a rejected header ends the read since no row could
    /// be mapped. Without `errors`, the first failure is returned.
    pub fn read_all<S: LineSource + ?Sized>(
        &mut self,
        source: &mut S,
        mut errors: Option<&mut Vec<ParseError>>,
    ) -> CsvResult<Vec<E>> {
        let mut records = Vec::new();
        loop {
            let mut error = ParseError::new();
            let sink = errors.is_some().then_some(&mut error);
            match self.read_row(source, sink)? {
                ReadOutcome::Row(record) => records.push(record),
                ReadOutcome::Eof => break,
                ReadOutcome::Invalid => {
                    warn!("Rejected line {}: {error}", error.line_number);
                    let header_failed = error.kind.is_header_failure();
                    if let Some(list) = errors.as_mut() {
                        list.push(error);
                    }
                    if header_failed {
                        break;
                    }
                }
            }
        }
        debug!(
            "Read {} record(s) through line {}",
            records.len(),
            self.line_number
        );
        Ok(records)
    }

    /// Writes the header (when the options say the first line is one) and
    /// then every record. Returns the number of records written.
    pub fn write_all<'a, K, I>(&self, sink: &mut K, records: I) -> CsvResult<usize>
    where
        K: LineSink + ?Sized,
        I: IntoIterator<Item = &'a E>,
        E: 'a,
    {
        let terminator = self.options.line_terminator.as_str();
        if self.options.first_line_is_header {
            sink.write_line(&self.build_header_line(), terminator)?;
        }
        let mut written = 0;
        for record in records {
            sink.write_line(&self.build_row(record), terminator)?;
            written += 1;
        }
        sink.flush()?;
        Ok(written)
    }
}

fn initial_state(options: &CsvOptions) -> ReadState {
    if options.first_line_is_header {
        ReadState::NeedHeader
    } else {
        ReadState::Rows
    }
}
