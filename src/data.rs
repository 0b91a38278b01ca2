//! Untyped records for schemas that are only known at run time.
//!
//! Schema files describe columns by data type name instead of by Rust field,
//! so their rows land in a [`DynamicRecord`]: one optional [`Value`] per
//! declared column, indexed by declaration slot.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
    Time(NaiveTime),
    Guid(Uuid),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{f:.0}")
                } else {
                    f.to_string()
                }
            }
            Value::Decimal(d) => d.normalize().to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Value::Timestamp(ts) => ts.to_rfc3339(),
            Value::Time(t) => t.format("%H:%M:%S").to_string(),
            Value::Guid(g) => g.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicRecord {
    values: Vec<Option<Value>>,
}

impl DynamicRecord {
    pub fn with_slots(slots: usize) -> Self {
        Self {
            values: vec![None; slots],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&Value> {
        self.values.get(slot).and_then(Option::as_ref)
    }

    /// Stores `value`, growing the record when `slot` is past its end.
    pub fn set(&mut self, slot: usize, value: Value) {
        if slot >= self.values.len() {
            self.values.resize(slot + 1, None);
        }
        self.values[slot] = Some(value);
    }

    pub fn clear(&mut self, slot: usize) {
        if let Some(entry) = self.values.get_mut(slot) {
            *entry = None;
        }
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }
}
