//! Line supply and line output.
//!
//! The processor reads through [`LineSource`] and writes through [`LineSink`]
//! and never touches files itself. This module provides the implementations
//! the command line uses:
//!
//! - **Decoding**: input is decoded to UTF-8 via `encoding_rs_io`, with BOM
//!   sniffing, defaulting to UTF-8.
//! - **Encoding**: output lines are transcoded with `encoding_rs` when an
//!   output encoding other than UTF-8 is requested.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.
//! - **In memory**: [`IterLines`] and `Vec<String>` for tests and embedding.

use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use encoding_rs_io::DecodeReaderBytesBuilder;

pub trait LineSource {
    /// The next line without its terminator, or `None` at end of input.
    fn next_line(&mut self) -> io::Result<Option<String>>;
}

pub trait LineSink {
    fn write_line(&mut self, line: &str, terminator: &str) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: LineSource + ?Sized> LineSource for &mut S {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        (**self).next_line()
    }
}

impl<K: LineSink + ?Sized> LineSink for &mut K {
    fn write_line(&mut self, line: &str, terminator: &str) -> io::Result<()> {
        (**self).write_line(line, terminator)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

/// Collects lines without terminators.
impl LineSink for Vec<String> {
    fn write_line(&mut self, line: &str, _terminator: &str) -> io::Result<()> {
        self.push(line.to_string());
        Ok(())
    }
}

/// Adapts any iterator of strings into a [`LineSource`].
#[derive(Debug, Clone)]
pub struct IterLines<I>(I);

impl<I> IterLines<I> {
    pub fn new<T>(lines: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self(lines.into_iter())
    }
}

impl<I, S> LineSource for IterLines<I>
where
    I: Iterator<Item = S>,
    S: Into<String>,
{
    fn next_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.0.next().map(Into::into))
    }
}

/// Reads `\n` or `\r\n` terminated lines from a buffered reader.
#[derive(Debug)]
pub struct LineReader<R> {
    reader: R,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineSource for LineReader<R> {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}

/// Writes lines, transcoding them when the target encoding is not UTF-8.
pub struct LineWriter<W> {
    writer: W,
    encoding: &'static Encoding,
}

impl<W: Write> LineWriter<W> {
    pub fn new(writer: W, encoding: &'static Encoding) -> Self {
        Self { writer, encoding }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> LineSink for LineWriter<W> {
    fn write_line(&mut self, line: &str, terminator: &str) -> io::Result<()> {
        if self.encoding == UTF_8 {
            self.writer.write_all(line.as_bytes())?;
            return self.writer.write_all(terminator.as_bytes());
        }
        for part in [line, terminator] {
            let (encoded, _, had_errors) = self.encoding.encode(part);
            if had_errors {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Failed to encode text using {}", self.encoding.name()),
                ));
            }
            self.writer.write_all(encoded.as_ref())?;
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn open_line_reader(
    path: &Path,
    encoding: &'static Encoding,
) -> Result<LineReader<Box<dyn BufRead>>> {
    let raw: Box<dyn io::Read> = if is_dash(path) {
        Box::new(io::stdin().lock())
    } else {
        Box::new(File::open(path).with_context(|| format!("Opening input file {path:?}"))?)
    };
    let decoded = DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding))
        .bom_override(true)
        .build(raw);
    Ok(LineReader::new(Box::new(BufReader::new(decoded))))
}

pub fn open_line_writer(
    path: Option<&Path>,
    encoding: &'static Encoding,
) -> Result<LineWriter<Box<dyn Write>>> {
    let writer: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(io::stdout()),
    };
    Ok(LineWriter::new(writer, encoding))
}
