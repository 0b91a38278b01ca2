//! Quote-aware cell scanner.
//!
//! This is the only place where quoting is resolved. A cell starting with
//! the quote character runs to the next quote that is followed by the
//! separator or the end of the line; a doubled quote inside it stands for one
//! literal quote. Any other cell runs to the next separator.
//!
//! Offsets are byte offsets into the line, so separators and quotes may be
//! any `char`.

use std::borrow::Cow;

use crate::{
    converter::CellContext,
    error::{ErrorKind, ParseError},
    schema::ColumnDescriptor,
};

/// Characters that force a written cell into quotes besides the separator
/// and the quote itself.
const FORCE_QUOTE_CHARS: [char; 4] = ['\r', '\n', '\t', '\u{8}'];

/// Where scanning stopped after a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellEnd {
    /// Offset just past the cell and its trailing separator.
    pub next: usize,
    /// Whether a separator was consumed, i.e. another cell follows.
    pub more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCell<'a> {
    pub text: Cow<'a, str>,
    pub start: usize,
    pub quoted: bool,
    pub end: CellEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scanner {
    separator: char,
    quote: char,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(',', '"')
    }
}

impl Scanner {
    pub fn new(separator: char, quote: char) -> Self {
        Self { separator, quote }
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    pub fn quote(&self) -> char {
        self.quote
    }

    /// Reads the cell starting at `start`. Returns `None` after recording
    /// [`ErrorKind::TruncatedColumn`] or [`ErrorKind::InvalidFormat`].
    pub fn read_cell<'a>(
        &self,
        line: &'a str,
        start: usize,
        line_number: usize,
        error: &mut ParseError,
    ) -> Option<RawCell<'a>> {
        let rest = &line[start..];
        if !rest.starts_with(self.quote) {
            let (text, end) = match rest.find(self.separator) {
                Some(rel) => (
                    &rest[..rel],
                    CellEnd {
                        next: start + rel + self.separator.len_utf8(),
                        more: true,
                    },
                ),
                None => (
                    rest,
                    CellEnd {
                        next: line.len(),
                        more: false,
                    },
                ),
            };
            return Some(RawCell {
                text: Cow::Borrowed(text),
                start,
                quoted: false,
                end,
            });
        }

        let quote_len = self.quote.len_utf8();
        let body = start + quote_len;
        let mut buffer: Option<String> = None;
        let mut search = body;
        loop {
            let Some(rel) = line[search..].find(self.quote) else {
                error
                    .set(
                        ErrorKind::TruncatedColumn,
                        format!("quoted cell starting at offset {start} is never closed"),
                        line,
                        line_number,
                        start,
                    )
                    .with_cell(rest);
                return None;
            };
            let closing = search + rel;
            let after = closing + quote_len;
            let end = match line[after..].chars().next() {
                None => CellEnd {
                    next: line.len(),
                    more: false,
                },
                Some(ch) if ch == self.separator => CellEnd {
                    next: after + ch.len_utf8(),
                    more: true,
                },
                Some(ch) if ch == self.quote => {
                    buffer
                        .get_or_insert_with(String::new)
                        .push_str(&line[search..after]);
                    search = after + quote_len;
                    continue;
                }
                Some(ch) => {
                    error
                        .set(
                            ErrorKind::InvalidFormat,
                            format!(
                                "closing quote at offset {closing} is followed by '{ch}' instead of '{}'",
                                self.separator
                            ),
                            line,
                            line_number,
                            closing,
                        )
                        .with_cell(&line[start..]);
                    return None;
                }
            };
            let text = match buffer {
                Some(mut owned) => {
                    owned.push_str(&line[search..closing]);
                    Cow::Owned(owned)
                }
                None => Cow::Borrowed(&line[body..closing]),
            };
            return Some(RawCell {
                text,
                start,
                quoted: true,
                end,
            });
        }
    }

    /// Splits a whole line into raw cells (header mode). An empty line has no
    /// cells; a trailing separator yields a final empty cell.
    pub fn split(&self, line: &str, line_number: usize, error: &mut ParseError) -> Option<Vec<String>> {
        let mut cells = Vec::new();
        let mut offset = 0;
        let mut more = !line.is_empty();
        while more {
            let cell = self.read_cell(line, offset, line_number, error)?;
            cells.push(cell.text.into_owned());
            offset = cell.end.next;
            more = cell.end.more;
        }
        Some(cells)
    }

    /// Row mode: reads the cell at `start`, trims it, substitutes the
    /// column default, enforces `must_not_be_blank` and hands the text to the
    /// column's converter, which assigns the value to `record`.
    pub fn scan_column<E>(
        &self,
        line: &str,
        start: usize,
        line_number: usize,
        column: &ColumnDescriptor<E>,
        record: &mut E,
        always_trim: bool,
        error: &mut ParseError,
    ) -> Option<CellEnd> {
        let raw = match self.read_cell(line, start, line_number, error) {
            Some(raw) => raw,
            None => {
                error.with_column(column.name());
                return None;
            }
        };

        let mut text: &str = &raw.text;
        if always_trim || column.trims_input() {
            text = text.trim();
        }
        if text.is_empty()
            && let Some(default) = column.default_value()
        {
            text = default;
        }
        if text.is_empty() && column.must_not_be_blank() {
            error
                .set(
                    ErrorKind::MustNotBeBlank,
                    format!("column '{}' must not be blank", column.name()),
                    line,
                    line_number,
                    raw.start,
                )
                .with_column(column.name())
                .with_cell(&raw.text)
                .with_expected_type(column.type_name());
            return None;
        }

        let cell = CellContext::new(line, line_number, raw.start, text);
        column.read(record, &cell, error);
        if error.is_error() {
            error.annotate(column.name(), text, column.type_name());
            return None;
        }
        Some(raw.end)
    }

    /// Appends `text` as one cell, quoting it when the converter asks for it
    /// or when its content requires it.
    pub fn write_cell(&self, text: &str, needs_quoting: bool, out: &mut String) {
        if text.contains(self.quote) {
            self.write_quoted(text, out);
            return;
        }
        let forced = text
            .chars()
            .any(|ch| ch == self.separator || FORCE_QUOTE_CHARS.contains(&ch));
        if needs_quoting || forced {
            out.push(self.quote);
            out.push_str(text);
            out.push(self.quote);
        } else {
            out.push_str(text);
        }
    }

    /// Appends `text` wrapped in quotes with embedded quotes doubled.
    pub fn write_quoted(&self, text: &str, out: &mut String) {
        out.reserve(text.len() + 2);
        out.push(self.quote);
        for ch in text.chars() {
            if ch == self.quote {
                out.push(self.quote);
            }
            out.push(ch);
        }
        out.push(self.quote);
    }
}
