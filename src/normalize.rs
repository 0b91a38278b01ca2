use anyhow::{Context, Result, bail};
use log::{info, warn};

use crate::{cli::NormalizeArgs, io_utils, printable_delimiter, schema_file::LoadedSchema};

pub fn execute(args: &NormalizeArgs) -> Result<()> {
    let input_encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let output_encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
    let loaded = LoadedSchema::load(&args.schema)?;

    let mut read_options = loaded.options().clone();
    if let Some(delimiter) = args.delimiter {
        read_options.separator = delimiter;
    }
    let mut write_options = read_options.clone().with_header(!args.no_header);
    if let Some(delimiter) = args.output_delimiter {
        write_options.separator = delimiter;
    }
    if let Some(ending) = args.line_ending {
        write_options.line_terminator = ending.as_str().to_string();
    }
    info!(
        "Normalizing {:?} from '{}' to '{}' delimited output",
        args.input,
        printable_delimiter(read_options.separator),
        printable_delimiter(write_options.separator)
    );

    let mut reader = loaded.processor_with(read_options)?;
    let writer = loaded.processor_with(write_options)?;
    let mut source = io_utils::open_line_reader(&args.input, input_encoding)?;

    let mut errors = Vec::new();
    let rows = if args.fail_fast {
        reader.read_all(&mut source, None)
    } else {
        reader.read_all(&mut source, Some(&mut errors))
    }
    .with_context(|| format!("Reading {:?}", args.input))?;
    for error in &errors {
        warn!("Dropped line {}: {error}", error.line_number);
    }
    if let Some(error) = errors.iter().find(|e| e.kind.is_header_failure()) {
        bail!("Cannot map columns of {:?}: {error}", args.input);
    }

    let mut sink = io_utils::open_line_writer(args.output.as_deref(), output_encoding)?;
    let written = writer
        .write_all(&mut sink, &rows)
        .context("Writing normalized output")?;
    info!(
        "Wrote {written} row(s), dropped {} invalid line(s)",
        errors.len()
    );
    Ok(())
}
