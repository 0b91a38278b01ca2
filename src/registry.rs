//! Value type → converter lookup.
//!
//! A [`ConverterRegistry`] is an explicit value, built before the schema and
//! consulted only while columns are bound. Registering a converter for a type
//! that already has one replaces it, which is how callers override the
//! built-in codecs for every column of that type. Single columns override
//! their converter through [`crate::schema::Column::converter`].

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    sync::Arc,
};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::{
    converter::{
        self, BoolConverter, CellCodec, CharConverter, Converter, CsvEnum, DecimalConverter,
        EnumConverter, FloatConverter, IntegerConverter, StringConverter, TemporalConverter,
        UuidConverter, short_type_name,
    },
    error::ConfigError,
};

/// Configures a converter for one column, erasing its configuration type.
pub type CodecFactory<T> = Arc<
    dyn Fn(Option<&str>, u32) -> Result<Arc<dyn CellCodec<T>>, ConfigError> + Send + Sync,
>;

pub fn codec_factory<C: Converter>(converter: C) -> CodecFactory<C::Value> {
    let converter = Arc::new(converter);
    Arc::new(move |format, flags| {
        let configured = converter::configure(Arc::clone(&converter), format, flags)?;
        Ok(Arc::new(configured) as Arc<dyn CellCodec<C::Value>>)
    })
}

struct Entry {
    type_name: &'static str,
    factory: Box<dyn Any + Send + Sync>,
}

pub struct ConverterRegistry {
    entries: HashMap<TypeId, Entry>,
}

impl ConverterRegistry {
    /// A registry without any converters.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// A registry with converters for strings, `char`, `bool`, every
    /// primitive integer, `f32`/`f64`, `Decimal`, the chrono date/time types
    /// and `Uuid`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry
            .register(StringConverter)
            .register(CharConverter)
            .register(BoolConverter)
            .register(IntegerConverter::<i8>::new())
            .register(IntegerConverter::<i16>::new())
            .register(IntegerConverter::<i32>::new())
            .register(IntegerConverter::<i64>::new())
            .register(IntegerConverter::<i128>::new())
            .register(IntegerConverter::<isize>::new())
            .register(IntegerConverter::<u8>::new())
            .register(IntegerConverter::<u16>::new())
            .register(IntegerConverter::<u32>::new())
            .register(IntegerConverter::<u64>::new())
            .register(IntegerConverter::<u128>::new())
            .register(IntegerConverter::<usize>::new())
            .register(FloatConverter::<f32>::new())
            .register(FloatConverter::<f64>::new())
            .register(DecimalConverter)
            .register(TemporalConverter::<NaiveDate>::new())
            .register(TemporalConverter::<NaiveDateTime>::new())
            .register(TemporalConverter::<NaiveTime>::new())
            .register(TemporalConverter::<DateTime<Utc>>::new())
            .register(UuidConverter);
        registry
    }

    pub fn register<C: Converter>(&mut self, converter: C) -> &mut Self {
        self.insert::<C::Value>(codec_factory(converter))
    }

    pub fn register_enum<T: CsvEnum>(&mut self) -> &mut Self {
        self.register(EnumConverter::<T>::new())
    }

    pub fn insert<T: 'static>(&mut self, factory: CodecFactory<T>) -> &mut Self {
        self.entries.insert(
            TypeId::of::<T>(),
            Entry {
                type_name: short_type_name::<T>(),
                factory: Box::new(factory),
            },
        );
        self
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn factory<T: 'static>(&self) -> Option<CodecFactory<T>> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.factory.downcast_ref::<CodecFactory<T>>())
            .cloned()
    }

    /// Configures the registered converter for `T`.
    pub fn configure<T: 'static>(
        &self,
        format: Option<&str>,
        flags: u32,
    ) -> Result<Arc<dyn CellCodec<T>>, ConfigError> {
        let factory = self
            .factory::<T>()
            .ok_or(ConfigError::MissingConverter(short_type_name::<T>()))?;
        factory(format, flags)
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self
            .entries
            .values()
            .map(|entry| entry.type_name)
            .collect::<Vec<_>>();
        names.sort_unstable();
        f.debug_struct("ConverterRegistry")
            .field("types", &names)
            .finish()
    }
}
