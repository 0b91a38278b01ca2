//! Header reconciliation: binding header cells to schema columns.
//!
//! [`reconcile`] walks the header names in order and, for each, takes the
//! first still-unmatched column accepted by the [`ColumnNameMatcher`]. The
//! outcome is a [`PositionMap`] telling the row reader which column each cell
//! offset feeds (or that the cell is skipped).
//!
//! A position map depends on the input it was built from. It belongs to the
//! reader of that input and must not be shared with readers of other inputs.

use std::fmt;

use heck::ToSnakeCase;
use log::debug;

use crate::schema::ColumnSchema;

/// Decides whether a header cell names a column.
pub trait ColumnNameMatcher: Send + Sync {
    fn matches(&self, header: &str, column: &str) -> bool;
}

impl<F> ColumnNameMatcher for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn matches(&self, header: &str, column: &str) -> bool {
        self(header, column)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatcher;

impl ColumnNameMatcher for ExactMatcher {
    fn matches(&self, header: &str, column: &str) -> bool {
        header == column
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CaseInsensitiveMatcher;

impl ColumnNameMatcher for CaseInsensitiveMatcher {
    fn matches(&self, header: &str, column: &str) -> bool {
        header.trim().eq_ignore_ascii_case(column)
    }
}

/// Compares snake_case forms, so `orderId`, `Order ID` and `order_id` all
/// name the same column.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedMatcher;

impl ColumnNameMatcher for NormalizedMatcher {
    fn matches(&self, header: &str, column: &str) -> bool {
        header.trim().to_snake_case() == column.to_snake_case()
    }
}

/// Exact matching after removing one of the known prefixes and suffixes from
/// the header, e.g. `src_amount_usd` matching `amount`.
#[derive(Debug, Clone, Default)]
pub struct AffixMatcher {
    prefixes: Vec<String>,
    suffixes: Vec<String>,
}

impl AffixMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffixes.push(suffix.into());
        self
    }
}

impl ColumnNameMatcher for AffixMatcher {
    fn matches(&self, header: &str, column: &str) -> bool {
        if header == column {
            return true;
        }
        let mut stems = std::iter::once(header).chain(
            self.prefixes
                .iter()
                .filter_map(|prefix| header.strip_prefix(prefix.as_str())),
        );
        stems.any(|stem| {
            stem == column
                || self
                    .suffixes
                    .iter()
                    .any(|suffix| stem.strip_suffix(suffix.as_str()) == Some(column))
        })
    }
}

/// Cell offset → column position in the schema's resolved order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionMap {
    slots: Vec<Option<usize>>,
}

impl PositionMap {
    /// Cell `i` feeds column `i`.
    pub fn declaration_order(columns: usize) -> Self {
        Self {
            slots: (0..columns).map(Some).collect(),
        }
    }

    pub fn from_slots(slots: Vec<Option<usize>>) -> Self {
        Self { slots }
    }

    /// Number of cells a row is expected to have.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Column position for cell `cell`; `None` for skipped or extra cells.
    pub fn get(&self, cell: usize) -> Option<usize> {
        self.slots.get(cell).copied().flatten()
    }

    pub fn slots(&self) -> &[Option<usize>] {
        &self.slots
    }

    pub fn is_declaration_order(&self) -> bool {
        self.slots
            .iter()
            .enumerate()
            .all(|(idx, slot)| *slot == Some(idx))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderPolicy {
    pub flexible_order: bool,
    pub ignore_unknown_columns: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMismatch {
    /// Index of the offending header cell, if one is to blame.
    pub cell: Option<usize>,
    pub column: Option<String>,
    pub message: String,
}

impl fmt::Display for HeaderMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

pub fn reconcile<E>(
    schema: &ColumnSchema<E>,
    names: &[String],
    matcher: &dyn ColumnNameMatcher,
    policy: HeaderPolicy,
) -> Result<PositionMap, HeaderMismatch> {
    let mut pending = vec![true; schema.len()];
    let mut slots = Vec::with_capacity(names.len());
    let mut last_position: Option<usize> = None;

    for (cell, name) in names.iter().enumerate() {
        let found = schema
            .columns()
            .iter()
            .position(|column| pending[column.position()] && matcher.matches(name, column.name()));
        let Some(position) = found else {
            if policy.ignore_unknown_columns {
                debug!("Ignoring unknown header column '{name}' at cell {cell}");
                slots.push(None);
                continue;
            }
            return Err(HeaderMismatch {
                cell: Some(cell),
                column: Some(name.clone()),
                message: format!("unknown column '{name}' in header"),
            });
        };

        if !policy.flexible_order
            && let Some(previous) = last_position
            && position <= previous
        {
            let column = schema.columns()[position].name();
            let before = schema.columns()[previous].name();
            return Err(HeaderMismatch {
                cell: Some(cell),
                column: Some(column.to_string()),
                message: format!("column '{column}' must come before '{before}'"),
            });
        }
        last_position = Some(position);
        pending[position] = false;
        slots.push(Some(position));
    }

    let missing = schema
        .columns()
        .iter()
        .filter(|column| pending[column.position()] && column.must_be_supplied())
        .map(|column| column.name())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(HeaderMismatch {
            cell: None,
            column: missing.first().map(|name| name.to_string()),
            message: format!("missing required column(s): {}", missing.join(", ")),
        });
    }

    let map = PositionMap::from_slots(slots);
    debug!("Header mapped to column positions {:?}", map.slots());
    Ok(map)
}
