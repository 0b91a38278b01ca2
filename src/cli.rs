use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about = "Read and write CSV files through typed column schemas", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check CSV files against a schema and report every rejected line
    Verify(VerifyArgs),
    /// Re-write a CSV file in schema order with canonical values and quoting
    Normalize(NormalizeArgs),
    /// Show the first rows of a CSV file as parsed by a schema
    Preview(PreviewArgs),
    /// Print the header line a schema writes
    Header(HeaderArgs),
}

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// YAML schema file describing the expected columns
    #[arg(short, long)]
    pub schema: PathBuf,
    /// One or more CSV files to verify ('-' reads stdin)
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Stop at the first rejected line
    #[arg(long)]
    pub fail_fast: bool,
    /// Report errors as JSON lines
    #[arg(long)]
    pub json: bool,
    /// CSV delimiter character, overriding the schema options
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<char>,
    /// Character encoding for input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    /// YAML schema file describing the columns
    #[arg(short, long)]
    pub schema: PathBuf,
    /// Input CSV file ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output CSV file (stdout when omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Abort on the first rejected line instead of skipping it
    #[arg(long)]
    pub fail_fast: bool,
    /// Do not write a header line
    #[arg(long)]
    pub no_header: bool,
    /// Input delimiter character, overriding the schema options
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<char>,
    /// Output delimiter character (defaults to the input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<char>,
    /// Line terminator for written lines
    #[arg(long = "line-ending", value_enum)]
    pub line_ending: Option<LineEnding>,
    /// Character encoding for the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Character encoding for the output file (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// YAML schema file describing the columns
    #[arg(short, long)]
    pub schema: PathBuf,
    /// Input CSV file to preview
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Number of parsed rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    /// Truncate cells wider than this many characters
    #[arg(long = "max-width")]
    pub max_width: Option<usize>,
    /// CSV delimiter character, overriding the schema options
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<char>,
    /// Character encoding for input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct HeaderArgs {
    /// YAML schema file describing the columns
    #[arg(short, long)]
    pub schema: PathBuf,
    /// Delimiter character, overriding the schema options
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<char>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LineEnding {
    Lf,
    Crlf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::Crlf => "\r\n",
        }
    }
}

pub fn parse_delimiter(value: &str) -> Result<char, String> {
    match value {
        "tab" | "\\t" | "\t" => Ok('\t'),
        "comma" | "," => Ok(','),
        "|" | "pipe" => Ok('|'),
        ";" | "semicolon" => Ok(';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if first == '\r' || first == '\n' {
                return Err("Delimiter cannot be a line break".to_string());
            }
            Ok(first)
        }
    }
}
