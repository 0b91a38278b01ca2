//! Column schema: the typed description of one record type.
//!
//! A [`ColumnSchema`] is built once per record type through
//! [`SchemaBuilder`] from a list of [`Column`] declarations. Building binds
//! every column to a configured converter (format patterns and flags are
//! validated here, never per row), checks that names are unique and resolves
//! `after` constraints into the final column order.
//!
//! ## Ordering
//!
//! Columns keep their declaration order, except that a column declared
//! `after("x")` is placed immediately behind `x` (and behind any column that
//! was itself placed after `x` earlier in the declaration). Constraints may
//! chain; a cycle is a [`ConfigError::CyclicOrder`].
//!
//! ## Sharing
//!
//! A built schema is immutable. It is `Send + Sync` and can back any number
//! of processors on any number of threads.

use std::{
    collections::HashSet,
    error::Error as StdError,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use log::debug;

use crate::{
    converter::{CellCodec, CellContext, Converter, panic_message},
    error::{ConfigError, ErrorKind, ParseError},
    registry::{CodecFactory, ConverterRegistry, codec_factory},
};

pub type SetterError = Box<dyn StdError + Send + Sync>;
type Getter<E, T> = Box<dyn Fn(&E) -> Option<T> + Send + Sync>;
type Setter<E, T> = Box<dyn Fn(&mut E, T) -> Result<(), SetterError> + Send + Sync>;
type Factory<E> = Box<dyn Fn() -> E + Send + Sync>;

/// Declaration of one column mapped to a field of type `T` on records `E`.
pub struct Column<E, T> {
    name: String,
    getter: Option<Getter<E, T>>,
    setter: Option<Setter<E, T>>,
    format: Option<String>,
    flags: u32,
    converter: Option<CodecFactory<T>>,
    must_not_be_blank: bool,
    must_be_supplied: bool,
    trim: bool,
    default: Option<String>,
    after: Option<String>,
}

impl<E: 'static, T: 'static> Column<E, T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            getter: None,
            setter: None,
            format: None,
            flags: 0,
            converter: None,
            must_not_be_blank: false,
            must_be_supplied: false,
            trim: false,
            default: None,
            after: None,
        }
    }

    /// Reads the field for writing. Returning `None` writes an empty cell.
    pub fn get(mut self, getter: impl Fn(&E) -> Option<T> + Send + Sync + 'static) -> Self {
        self.getter = Some(Box::new(getter));
        self
    }

    pub fn set(mut self, setter: impl Fn(&mut E, T) + Send + Sync + 'static) -> Self {
        self.setter = Some(Box::new(move |record, value| {
            setter(record, value);
            Ok(())
        }));
        self
    }

    /// Like [`Column::set`]; a returned error is reported as
    /// [`ErrorKind::InternalError`] for the row.
    pub fn try_set(
        mut self,
        setter: impl Fn(&mut E, T) -> Result<(), SetterError> + Send + Sync + 'static,
    ) -> Self {
        self.setter = Some(Box::new(setter));
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Converter flags, see [`crate::converter::flags`].
    pub fn flags(mut self, flags: u32) -> Self {
        self.flags |= flags;
        self
    }

    /// Uses `converter` for this column instead of the registry's.
    pub fn converter<C: Converter<Value = T>>(mut self, converter: C) -> Self {
        self.converter = Some(codec_factory(converter));
        self
    }

    pub fn not_blank(mut self) -> Self {
        self.must_not_be_blank = true;
        self
    }

    /// The column must be present in a header.
    pub fn required(mut self) -> Self {
        self.must_be_supplied = true;
        self
    }

    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    /// Text used in place of an empty cell.
    pub fn default_value(mut self, text: impl Into<String>) -> Self {
        self.default = Some(text.into());
        self
    }

    pub fn after(mut self, column: impl Into<String>) -> Self {
        self.after = Some(column.into());
        self
    }
}

trait PendingColumn<E> {
    fn name(&self) -> &str;
    fn after(&self) -> Option<&str>;
    fn bind(self: Box<Self>, registry: &ConverterRegistry) -> Result<ColumnDescriptor<E>, ConfigError>;
}

impl<E: 'static, T: 'static> PendingColumn<E> for Column<E, T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn after(&self) -> Option<&str> {
        self.after.as_deref()
    }

    fn bind(self: Box<Self>, registry: &ConverterRegistry) -> Result<ColumnDescriptor<E>, ConfigError> {
        let column = *self;
        if column.getter.is_none() && column.setter.is_none() {
            return Err(ConfigError::InvalidOptions(format!(
                "column '{}' has neither a getter nor a setter",
                column.name
            )));
        }
        let format = column.format.as_deref();
        let codec = match &column.converter {
            Some(factory) => factory(format, column.flags),
            None => registry.configure::<T>(format, column.flags),
        }
        .map_err(|err| err.in_column(&column.name))?;

        Ok(ColumnDescriptor {
            name: column.name,
            position: 0,
            must_not_be_blank: column.must_not_be_blank,
            must_be_supplied: column.must_be_supplied,
            trim: column.trim,
            default: column.default,
            after: column.after,
            binding: Box::new(Binding {
                codec,
                getter: column.getter,
                setter: column.setter,
            }),
        })
    }
}

trait BoundColumn<E>: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn needs_quoting(&self) -> bool;
    fn always_trims(&self) -> bool;
    fn read(&self, record: &mut E, cell: &CellContext<'_>, error: &mut ParseError);
    fn write(&self, record: &E) -> Option<String>;
}

struct Binding<E, T> {
    codec: Arc<dyn CellCodec<T>>,
    getter: Option<Getter<E, T>>,
    setter: Option<Setter<E, T>>,
}

impl<E, T> BoundColumn<E> for Binding<E, T> {
    fn type_name(&self) -> &'static str {
        self.codec.type_name()
    }

    fn needs_quoting(&self) -> bool {
        self.codec.needs_quoting()
    }

    fn always_trims(&self) -> bool {
        self.codec.always_trims()
    }

    fn read(&self, record: &mut E, cell: &CellContext<'_>, error: &mut ParseError) {
        let value = self.codec.from_text(cell, error);
        // A recorded error wins over whatever the converter returned.
        if error.is_error() {
            return;
        }
        let (Some(value), Some(setter)) = (value, self.setter.as_ref()) else {
            return;
        };
        let failure = match panic::catch_unwind(AssertUnwindSafe(|| setter(record, value))) {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };
        error
            .set(
                ErrorKind::InternalError,
                format!("assigning value failed: {failure}"),
                cell.line,
                cell.line_number,
                cell.offset,
            )
            .with_cell(cell.text);
    }

    fn write(&self, record: &E) -> Option<String> {
        let getter = self.getter.as_ref()?;
        let value = getter(record)?;
        self.codec.to_text(&value)
    }
}

/// A bound column of a built [`ColumnSchema`].
pub struct ColumnDescriptor<E> {
    name: String,
    position: usize,
    must_not_be_blank: bool,
    must_be_supplied: bool,
    trim: bool,
    default: Option<String>,
    after: Option<String>,
    binding: Box<dyn BoundColumn<E>>,
}

impl<E> ColumnDescriptor<E> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position in the resolved column order.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn type_name(&self) -> &'static str {
        self.binding.type_name()
    }

    pub fn must_not_be_blank(&self) -> bool {
        self.must_not_be_blank
    }

    pub fn must_be_supplied(&self) -> bool {
        self.must_be_supplied
    }

    pub fn trims_input(&self) -> bool {
        self.trim || self.binding.always_trims()
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn after(&self) -> Option<&str> {
        self.after.as_deref()
    }

    pub fn needs_quoting(&self) -> bool {
        self.binding.needs_quoting()
    }

    pub(crate) fn read(&self, record: &mut E, cell: &CellContext<'_>, error: &mut ParseError) {
        self.binding.read(record, cell, error);
    }

    pub(crate) fn write(&self, record: &E) -> Option<String> {
        self.binding.write(record)
    }
}

impl<E> fmt::Debug for ColumnDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("name", &self.name)
            .field("position", &self.position)
            .field("type", &self.type_name())
            .field("must_not_be_blank", &self.must_not_be_blank)
            .field("must_be_supplied", &self.must_be_supplied)
            .field("trim", &self.trim)
            .field("default", &self.default)
            .field("after", &self.after)
            .finish()
    }
}

pub struct ColumnSchema<E> {
    columns: Vec<ColumnDescriptor<E>>,
    factory: Factory<E>,
}

impl<E: 'static> ColumnSchema<E> {
    pub fn builder() -> SchemaBuilder<E> {
        SchemaBuilder::new(ConverterRegistry::with_defaults())
    }

    pub fn builder_with(registry: ConverterRegistry) -> SchemaBuilder<E> {
        SchemaBuilder::new(registry)
    }
}

impl<E> ColumnSchema<E> {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns in resolved order.
    pub fn columns(&self) -> &[ColumnDescriptor<E>] {
        &self.columns
    }

    pub fn column(&self, position: usize) -> Option<&ColumnDescriptor<E>> {
        self.columns.get(position)
    }

    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn new_record(&self) -> E {
        (self.factory)()
    }
}

impl<E> fmt::Debug for ColumnSchema<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnSchema")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

pub struct SchemaBuilder<E> {
    registry: ConverterRegistry,
    columns: Vec<Box<dyn PendingColumn<E>>>,
    factory: Option<Factory<E>>,
}

impl<E: 'static> SchemaBuilder<E> {
    pub fn new(registry: ConverterRegistry) -> Self {
        Self {
            registry,
            columns: Vec::new(),
            factory: None,
        }
    }

    pub fn factory(mut self, factory: impl Fn() -> E + Send + Sync + 'static) -> Self {
        self.factory = Some(Box::new(factory));
        self
    }

    pub fn column<T: 'static>(mut self, column: Column<E, T>) -> Self {
        self.columns.push(Box::new(column));
        self
    }

    pub fn registry_mut(&mut self) -> &mut ConverterRegistry {
        &mut self.registry
    }

    pub fn build(self) -> Result<ColumnSchema<E>, ConfigError> {
        let factory = self.factory.ok_or(ConfigError::MissingFactory)?;

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name().to_string()) {
                return Err(ConfigError::DuplicateColumn(column.name().to_string()));
            }
        }

        let order = resolve_order(&self.columns)?;
        let mut bound = self
            .columns
            .into_iter()
            .map(|column| column.bind(&self.registry).map(Some))
            .collect::<Result<Vec<_>, _>>()?;

        let mut columns = Vec::with_capacity(bound.len());
        for (position, declared) in order.into_iter().enumerate() {
            if let Some(mut column) = bound[declared].take() {
                column.position = position;
                columns.push(column);
            }
        }
        debug!(
            "Resolved column order: {:?}",
            columns.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
        );
        Ok(ColumnSchema { columns, factory })
    }
}

impl<E: Default + 'static> SchemaBuilder<E> {
    pub fn default_factory(self) -> Self {
        self.factory(E::default)
    }
}

/// Declaration indices in resolved order.
fn resolve_order<E>(columns: &[Box<dyn PendingColumn<E>>]) -> Result<Vec<usize>, ConfigError> {
    let mut children = vec![Vec::new(); columns.len()];
    let mut roots = Vec::new();
    for (idx, column) in columns.iter().enumerate() {
        match column.after() {
            None => roots.push(idx),
            Some(anchor) => {
                let parent = columns
                    .iter()
                    .position(|c| c.name() == anchor)
                    .ok_or_else(|| ConfigError::UnknownAfter {
                        column: column.name().to_string(),
                        after: anchor.to_string(),
                    })?;
                children[parent].push(idx);
            }
        }
    }

    let mut order = Vec::with_capacity(columns.len());
    let mut stack = roots.into_iter().rev().collect::<Vec<_>>();
    while let Some(idx) = stack.pop() {
        order.push(idx);
        stack.extend(children[idx].iter().rev().copied());
    }

    if order.len() < columns.len() {
        let placed = order.iter().copied().collect::<HashSet<_>>();
        let stuck = columns
            .iter()
            .enumerate()
            .filter(|(idx, _)| !placed.contains(idx))
            .map(|(_, c)| c.name().to_string())
            .collect();
        return Err(ConfigError::CyclicOrder(stuck));
    }
    Ok(order)
}
