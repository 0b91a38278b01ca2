use anyhow::{Context, Result};
use log::{info, warn};

use crate::{
    cli::PreviewArgs,
    error::ParseError,
    io_utils,
    processor::ReadOutcome,
    schema_file::LoadedSchema,
    table::TextTable,
};

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let loaded = LoadedSchema::load(&args.schema)?;
    let mut options = loaded.options().clone();
    if let Some(delimiter) = args.delimiter {
        options.separator = delimiter;
    }
    let mut processor = loaded.processor_with(options)?;
    let mut source = io_utils::open_line_reader(&args.input, encoding)?;

    let mut table = TextTable::new(loaded.column_names());
    if let Some(width) = args.max_width {
        table = table.with_max_width(width);
    }
    let mut error = ParseError::new();
    let mut skipped = 0usize;
    while table.len() < args.rows {
        match processor
            .read_row(&mut source, Some(&mut error))
            .with_context(|| format!("Reading {:?}", args.input))?
        {
            ReadOutcome::Row(record) => table.push_row(loaded.display_row(&record)),
            ReadOutcome::Invalid => {
                warn!("Skipping line {}: {error}", error.line_number);
                skipped += 1;
                if error.kind.is_header_failure() {
                    break;
                }
            }
            ReadOutcome::Eof => break,
        }
    }

    print!("{table}");
    info!(
        "Displayed {} row(s) from {:?}, skipped {skipped}",
        table.len(),
        args.input
    );
    Ok(())
}
