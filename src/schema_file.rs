//! YAML schema files.
//!
//! A schema file declares columns by data type name and carries the
//! processor options, so the command line can read and write files whose
//! layout is not known at compile time:
//!
//! ```yaml
//! matcher: case-insensitive
//! options:
//!   separator: ";"
//!   flexible_order: true
//! columns:
//!   - name: id
//!     datatype: integer
//!     required: true
//!   - name: amount
//!     datatype: decimal
//!     format: "#,##0.00"
//!   - name: note
//!     datatype: string
//!     flags: [blank-is-null]
//!     after: id
//! ```
//!
//! Loading produces a [`LoadedSchema`] whose rows are
//! [`DynamicRecord`]s, one slot per declared column.

use std::{fmt, fs::File, io::BufReader, path::Path, str::FromStr, sync::Arc};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    converter::flags,
    data::{DynamicRecord, Value},
    header::{CaseInsensitiveMatcher, ColumnNameMatcher, ExactMatcher, NormalizedMatcher},
    processor::{CsvOptions, CsvProcessor},
    schema::{Column, ColumnSchema, SchemaBuilder},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Timestamp,
    Time,
    Guid,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Decimal => "decimal",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Time => "time",
            ColumnType::Guid => "guid",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &[
            "string",
            "integer",
            "float",
            "decimal",
            "boolean",
            "date",
            "datetime",
            "timestamp",
            "time",
            "guid",
        ]
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "string" | "text" => Ok(ColumnType::String),
            "integer" | "int" | "long" => Ok(ColumnType::Integer),
            "float" | "double" => Ok(ColumnType::Float),
            "decimal" | "currency" => Ok(ColumnType::Decimal),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "date" => Ok(ColumnType::Date),
            "datetime" | "date-time" => Ok(ColumnType::DateTime),
            "timestamp" | "instant" => Ok(ColumnType::Timestamp),
            "time" => Ok(ColumnType::Time),
            "guid" | "uuid" => Ok(ColumnType::Guid),
            _ => Err(anyhow!(
                "Unknown column type '{value}'. Supported types: {}",
                ColumnType::variants().join(", ")
            )),
        }
    }
}

impl TryFrom<String> for ColumnType {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatcherKind {
    #[default]
    Exact,
    CaseInsensitive,
    Normalized,
}

impl MatcherKind {
    pub fn matcher(&self) -> Box<dyn ColumnNameMatcher> {
        match self {
            MatcherKind::Exact => Box::new(ExactMatcher),
            MatcherKind::CaseInsensitive => Box::new(CaseInsensitiveMatcher),
            MatcherKind::Normalized => Box::new(NormalizedMatcher),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnEntry {
    pub name: String,
    pub datatype: ColumnType,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub not_blank: bool,
    #[serde(default)]
    pub trim: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
}

impl ColumnEntry {
    fn flag_bits(&self) -> Result<u32> {
        self.flags.iter().try_fold(flags::NONE, |bits, name| {
            flags::by_name(name)
                .map(|bit| bits | bit)
                .ok_or_else(|| anyhow!("Unknown flag '{name}' on column '{}'", self.name))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaFile {
    pub columns: Vec<ColumnEntry>,
    #[serde(default)]
    pub options: CsvOptions,
    #[serde(default)]
    pub matcher: MatcherKind,
}

impl SchemaFile {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let reader = BufReader::new(file);
        let schema: SchemaFile = serde_yaml::from_reader(reader).context("Parsing schema YAML")?;
        Ok(schema)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Parsing schema YAML")
    }

    pub fn build(&self) -> Result<LoadedSchema> {
        if self.columns.is_empty() {
            bail!("Schema file declares no columns");
        }
        let slots = self.columns.len();
        let mut builder =
            ColumnSchema::builder().factory(move || DynamicRecord::with_slots(slots));
        for (slot, entry) in self.columns.iter().enumerate() {
            builder = add_column(builder, entry, slot)?;
        }
        let schema = builder.build().context("Building column schema")?;

        let slots = schema
            .columns()
            .iter()
            .map(|column| {
                self.columns
                    .iter()
                    .position(|entry| entry.name == column.name())
                    .ok_or_else(|| anyhow!("Column '{}' lost while building", column.name()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(LoadedSchema {
            schema: Arc::new(schema),
            options: self.options.clone(),
            matcher: self.matcher,
            slots,
        })
    }
}

/// A built schema file, ready to create processors.
#[derive(Debug)]
pub struct LoadedSchema {
    schema: Arc<ColumnSchema<DynamicRecord>>,
    options: CsvOptions,
    matcher: MatcherKind,
    /// Declaration slot of each column, in resolved order.
    slots: Vec<usize>,
}

impl LoadedSchema {
    pub fn load(path: &Path) -> Result<Self> {
        SchemaFile::load(path)?
            .build()
            .with_context(|| format!("Loading schema from {path:?}"))
    }

    pub fn schema(&self) -> &Arc<ColumnSchema<DynamicRecord>> {
        &self.schema
    }

    pub fn options(&self) -> &CsvOptions {
        &self.options
    }

    pub fn processor(&self) -> Result<CsvProcessor<DynamicRecord>> {
        self.processor_with(self.options.clone())
    }

    pub fn processor_with(&self, options: CsvOptions) -> Result<CsvProcessor<DynamicRecord>> {
        let processor = CsvProcessor::new(Arc::clone(&self.schema), options)
            .context("Invalid processor options")?;
        Ok(processor.with_boxed_matcher(self.matcher.matcher()))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema.names().into_iter().map(str::to_string).collect()
    }

    /// Display text of each value in resolved column order.
    pub fn display_row(&self, record: &DynamicRecord) -> Vec<String> {
        self.slots
            .iter()
            .map(|slot| record.get(*slot).map(Value::as_display).unwrap_or_default())
            .collect()
    }
}

fn add_column(
    builder: SchemaBuilder<DynamicRecord>,
    entry: &ColumnEntry,
    slot: usize,
) -> Result<SchemaBuilder<DynamicRecord>> {
    let bits = entry.flag_bits()?;
    let builder = match entry.datatype {
        ColumnType::String => builder.column(bind::<String>(entry, bits, slot, Value::String, |v| {
            match v {
                Value::String(s) => Some(s.clone()),
                _ => None,
            }
        })),
        ColumnType::Integer => builder.column(bind::<i64>(entry, bits, slot, Value::Integer, |v| {
            match v {
                Value::Integer(i) => Some(*i),
                _ => None,
            }
        })),
        ColumnType::Float => builder.column(bind::<f64>(entry, bits, slot, Value::Float, |v| {
            match v {
                Value::Float(f) => Some(*f),
                _ => None,
            }
        })),
        ColumnType::Decimal => builder.column(bind::<Decimal>(entry, bits, slot, Value::Decimal, |v| {
            match v {
                Value::Decimal(d) => Some(*d),
                _ => None,
            }
        })),
        ColumnType::Boolean => builder.column(bind::<bool>(entry, bits, slot, Value::Boolean, |v| {
            match v {
                Value::Boolean(b) => Some(*b),
                _ => None,
            }
        })),
        ColumnType::Date => builder.column(bind::<NaiveDate>(entry, bits, slot, Value::Date, |v| {
            match v {
                Value::Date(d) => Some(*d),
                _ => None,
            }
        })),
        ColumnType::DateTime => {
            builder.column(bind::<NaiveDateTime>(entry, bits, slot, Value::DateTime, |v| {
                match v {
                    Value::DateTime(dt) => Some(*dt),
                    _ => None,
                }
            }))
        }
        ColumnType::Timestamp => {
            builder.column(bind::<DateTime<Utc>>(entry, bits, slot, Value::Timestamp, |v| {
                match v {
                    Value::Timestamp(ts) => Some(*ts),
                    _ => None,
                }
            }))
        }
        ColumnType::Time => builder.column(bind::<NaiveTime>(entry, bits, slot, Value::Time, |v| {
            match v {
                Value::Time(t) => Some(*t),
                _ => None,
            }
        })),
        ColumnType::Guid => builder.column(bind::<Uuid>(entry, bits, slot, Value::Guid, |v| {
            match v {
                Value::Guid(g) => Some(*g),
                _ => None,
            }
        })),
    };
    Ok(builder)
}

fn bind<T: 'static>(
    entry: &ColumnEntry,
    bits: u32,
    slot: usize,
    wrap: fn(T) -> Value,
    unwrap: fn(&Value) -> Option<T>,
) -> Column<DynamicRecord, T> {
    let mut column = Column::new(entry.name.clone())
        .get(move |record: &DynamicRecord| record.get(slot).and_then(unwrap))
        .set(move |record: &mut DynamicRecord, value| record.set(slot, wrap(value)))
        .flags(bits);
    if let Some(format) = &entry.format {
        column = column.format(format.clone());
    }
    if let Some(default) = &entry.default {
        column = column.default_value(default.clone());
    }
    if let Some(after) = &entry.after {
        column = column.after(after.clone());
    }
    if entry.required {
        column = column.required();
    }
    if entry.not_blank {
        column = column.not_blank();
    }
    if entry.trim {
        column = column.trim();
    }
    column
}
