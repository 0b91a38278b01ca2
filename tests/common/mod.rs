#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv_mapper::{Column, ColumnSchema, CsvEnum, CsvOptions, CsvProcessor, flags};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, contents).expect("write temp file bytes");
        path
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Grade {
    #[default]
    Junior,
    Senior,
    Principal,
}

impl CsvEnum for Grade {
    fn variants() -> &'static [Self] {
        &[Grade::Junior, Grade::Senior, Grade::Principal]
    }

    fn name(&self) -> &'static str {
        match self {
            Grade::Junior => "junior",
            Grade::Senior => "senior",
            Grade::Principal => "principal",
        }
    }
}

/// Record with the four classic columns: an int, a quoted string, a long and
/// a string written without quotes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Basic {
    pub int_value: i32,
    pub string: String,
    pub long_value: i64,
    pub unquoted: String,
}

pub fn basic_schema() -> ColumnSchema<Basic> {
    ColumnSchema::builder()
        .default_factory()
        .column(
            Column::<Basic, i32>::new("intValue")
                .get(|r| Some(r.int_value))
                .set(|r, v| r.int_value = v),
        )
        .column(
            Column::<Basic, String>::new("string")
                .get(|r| Some(r.string.clone()))
                .set(|r, v| r.string = v),
        )
        .column(
            Column::<Basic, i64>::new("longValue")
                .get(|r| Some(r.long_value))
                .set(|r, v| r.long_value = v),
        )
        .column(
            Column::<Basic, String>::new("unquoted")
                .flags(flags::NO_QUOTES)
                .get(|r| Some(r.unquoted.clone()))
                .set(|r, v| r.unquoted = v),
        )
        .build()
        .expect("basic schema")
}

pub fn basic_processor(options: CsvOptions) -> CsvProcessor<Basic> {
    CsvProcessor::new(Arc::new(basic_schema()), options).expect("basic processor")
}
