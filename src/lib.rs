//! Schema-driven CSV reading and writing.
//!
//! Records are described once by a [`ColumnSchema`] built from [`Column`]
//! declarations. A [`CsvProcessor`] then reconciles headers, parses rows into
//! records and writes records back out, reporting per-line problems as
//! [`ParseError`] values.
//!
//! ```
//! use std::sync::Arc;
//! use csv_mapper::{Column, ColumnSchema, CsvOptions, CsvProcessor};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Item {
//!     id: u32,
//!     label: String,
//! }
//!
//! let schema = ColumnSchema::builder()
//!     .default_factory()
//!     .column(Column::<Item, u32>::new("id").get(|r| Some(r.id)).set(|r, v| r.id = v))
//!     .column(
//!         Column::<Item, String>::new("label")
//!             .get(|r| Some(r.label.clone()))
//!             .set(|r, v| r.label = v),
//!     )
//!     .build()
//!     .unwrap();
//! let processor = CsvProcessor::new(Arc::new(schema), CsvOptions::default()).unwrap();
//!
//! let item = processor.parse_row(r#"7,"a ""quoted"" label""#, 2, None).unwrap().unwrap();
//! assert_eq!(item.label, r#"a "quoted" label"#);
//! assert_eq!(processor.build_row(&item), r#"7,"a ""quoted"" label""#);
//! ```

pub mod cli;
pub mod converter;
pub mod data;
pub mod error;
pub mod header;
pub mod io_utils;
pub mod processor;
pub mod registry;
pub mod scanner;
pub mod schema;
pub mod schema_file;
pub mod table;

mod normalize;
mod preview;
mod verify;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, info};

pub use crate::{
    converter::{CellContext, Converter, CsvEnum, flags},
    error::{ConfigError, CsvError, CsvResult, ErrorKind, ParseError},
    header::{ColumnNameMatcher, PositionMap},
    processor::{CsvOptions, CsvProcessor, ReadOutcome, RowValidator},
    registry::ConverterRegistry,
    schema::{Column, ColumnSchema},
};

use crate::{
    cli::{Cli, Commands},
    schema_file::LoadedSchema,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_mapper", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Verify(args) => verify::execute(&args),
        Commands::Normalize(args) => normalize::execute(&args),
        Commands::Preview(args) => preview::execute(&args),
        Commands::Header(args) => handle_header(&args),
    }
}

fn handle_header(args: &cli::HeaderArgs) -> Result<()> {
    let loaded = LoadedSchema::load(&args.schema)?;
    let mut options = loaded.options().clone();
    if let Some(delimiter) = args.delimiter {
        options.separator = delimiter;
    }
    info!(
        "Header for {} column(s) using delimiter '{}'",
        loaded.schema().len(),
        printable_delimiter(options.separator)
    );
    let processor = loaded.processor_with(options)?;
    println!("{}", processor.build_header_line());
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: char) -> String {
    match delimiter {
        '\t' => "\\t".to_string(),
        '\n' => "\\n".to_string(),
        other => other.to_string(),
    }
}
