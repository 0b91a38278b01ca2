use std::path::Path;

use anyhow::{Context, Result, bail};
use encoding_rs::Encoding;
use log::{info, warn};
use serde::Serialize;

use crate::{
    cli::VerifyArgs,
    error::ParseError,
    io_utils,
    schema_file::LoadedSchema,
};

#[derive(Debug, Serialize)]
struct Report<'a> {
    file: String,
    #[serde(flatten)]
    error: &'a ParseError,
}

pub fn execute(args: &VerifyArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let loaded = LoadedSchema::load(&args.schema)?;
    let mut invalid_files = 0usize;
    let mut total_errors = 0usize;
    for input in &args.inputs {
        let errors = verify_file(&loaded, input, args, encoding)?;
        if errors.is_empty() {
            info!("✓ {input:?} matches schema");
            continue;
        }
        warn!("✗ {input:?} has {} invalid line(s)", errors.len());
        invalid_files += 1;
        total_errors += errors.len();
        for error in &errors {
            print_error(input, error, args.json)?;
        }
    }
    if total_errors > 0 {
        bail!("{total_errors} invalid line(s) in {invalid_files} file(s)");
    }
    Ok(())
}

/// Reads `path` to the end and returns every rejected line. In fail-fast
/// mode the first rejection is an error instead.
pub fn verify_file(
    loaded: &LoadedSchema,
    path: &Path,
    args: &VerifyArgs,
    encoding: &'static Encoding,
) -> Result<Vec<ParseError>> {
    let mut options = loaded.options().clone();
    if let Some(delimiter) = args.delimiter {
        options.separator = delimiter;
    }
    let mut processor = loaded.processor_with(options)?;
    let mut source = io_utils::open_line_reader(path, encoding)?;

    if args.fail_fast {
        let rows = processor
            .read_all(&mut source, None)
            .with_context(|| format!("Verifying {path:?}"))?;
        info!("Verified {} row(s) in {path:?}", rows.len());
        return Ok(Vec::new());
    }

    let mut errors = Vec::new();
    let rows = processor
        .read_all(&mut source, Some(&mut errors))
        .with_context(|| format!("Reading {path:?}"))?;
    info!(
        "Verified {} row(s) in {path:?}, {} rejected",
        rows.len(),
        errors.len()
    );
    Ok(errors)
}

fn print_error(path: &Path, error: &ParseError, json: bool) -> Result<()> {
    if json {
        let report = Report {
            file: path.display().to_string(),
            error,
        };
        println!(
            "{}",
            serde_json::to_string(&report).context("Serializing error report")?
        );
    } else {
        let column = error
            .column
            .as_deref()
            .map(|c| format!(" [{c}]"))
            .unwrap_or_default();
        println!(
            "{}:{}:{}: {}{column}: {}",
            path.display(),
            error.line_number,
            error.offset,
            error.kind,
            error.message
        );
    }
    Ok(())
}
