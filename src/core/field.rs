//! Structured key/value fields
//!
//! This module provides:
//! - `FieldValue`: the typed value of a field, with fast-path variants for
//!   numbers, strings, time and errors and a serde fallback for anything else
//! - `Field`: a key plus a value
//! - `Fields`: an insertion-ordered field map with set-or-replace semantics
//! - `KeyValues`: conversion of call-site arguments into fields

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// A value that is rendered through the generic serde marshaler
///
/// Blanket-implemented for every serializable type, so any
/// `Serialize + Debug + Send + Sync` value can be attached to a log call.
pub trait StructuredValue: fmt::Debug + Send + Sync {
    /// Marshal the value as JSON, appending to `out`
    fn write_json(&self, out: &mut Vec<u8>) -> serde_json::Result<()>;

    /// Marshal the value into a JSON tree
    fn to_json_value(&self) -> serde_json::Result<serde_json::Value>;
}

impl<T> StructuredValue for T
where
    T: Serialize + fmt::Debug + Send + Sync,
{
    fn write_json(&self, out: &mut Vec<u8>) -> serde_json::Result<()> {
        serde_json::to_writer(out, self)
    }

    fn to_json_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// Value type for structured logging fields
#[derive(Debug, Clone, Default)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(Cow<'static, str>),
    Bytes(Vec<u8>),
    Error(Arc<dyn std::error::Error + Send + Sync>),
    Time(DateTime<Utc>),
    Duration(Duration),
    Any(Arc<dyn StructuredValue>),
}

impl FieldValue {
    /// Wrap an error; it is rendered through its `Display` impl
    pub fn error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        FieldValue::Error(Arc::new(err))
    }

    /// Wrap an arbitrary serializable value for the fallback marshaler
    pub fn any<T>(value: T) -> Self
    where
        T: Serialize + fmt::Debug + Send + Sync + 'static,
    {
        FieldValue::Any(Arc::new(value))
    }

    /// Copy a borrowed string into an owned value
    pub fn str(s: &str) -> Self {
        FieldValue::Str(Cow::Owned(s.to_owned()))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Convert a parsed JSON value back into the closest fast-path variant
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::I64(i)
                } else if let Some(u) = n.as_u64() {
                    FieldValue::U64(u)
                } else {
                    FieldValue::F64(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => FieldValue::Str(Cow::Owned(s)),
            other => FieldValue::Any(Arc::new(other)),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::I64(i) => write!(f, "{}", i),
            FieldValue::U64(u) => write!(f, "{}", u),
            FieldValue::F32(v) => write!(f, "{}", v),
            FieldValue::F64(v) => write!(f, "{}", v),
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            FieldValue::Error(e) => write!(f, "{}", e),
            FieldValue::Time(t) => write!(f, "{}", t.to_rfc3339()),
            FieldValue::Duration(d) => write!(f, "{:?}", d),
            FieldValue::Any(v) => match v.to_json_value() {
                Ok(json) => write!(f, "{}", json),
                Err(_) => write!(f, "{:?}", v),
            },
        }
    }
}

macro_rules! impl_from_int {
    ($variant:ident, $target:ty: $($t:ty),*) => {
        $(
            impl From<$t> for FieldValue {
                #[inline]
                fn from(v: $t) -> Self {
                    FieldValue::$variant(v as $target)
                }
            }
        )*
    };
}

impl_from_int!(I64, i64: i8, i16, i32, i64, isize);
impl_from_int!(U64, u64: u8, u16, u32, u64, usize);

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::F32(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::F64(v)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<&'static str> for FieldValue {
    fn from(s: &'static str) -> Self {
        FieldValue::Str(Cow::Borrowed(s))
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Str(Cow::Owned(s))
    }
}

impl From<&String> for FieldValue {
    fn from(s: &String) -> Self {
        FieldValue::Str(Cow::Owned(s.clone()))
    }
}

impl From<Cow<'static, str>> for FieldValue {
    fn from(s: Cow<'static, str>) -> Self {
        FieldValue::Str(s)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(b: Vec<u8>) -> Self {
        FieldValue::Bytes(b)
    }
}

impl From<&[u8]> for FieldValue {
    fn from(b: &[u8]) -> Self {
        FieldValue::Bytes(b.to_vec())
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(t: DateTime<Utc>) -> Self {
        FieldValue::Time(t)
    }
}

impl From<SystemTime> for FieldValue {
    fn from(t: SystemTime) -> Self {
        FieldValue::Time(t.into())
    }
}

impl From<Duration> for FieldValue {
    fn from(d: Duration) -> Self {
        FieldValue::Duration(d)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(v: serde_json::Value) -> Self {
        FieldValue::Any(Arc::new(v))
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

/// A single key/value pair attached to a log call
#[derive(Debug, Clone)]
pub struct Field {
    pub key: Cow<'static, str>,
    pub value: FieldValue,
}

impl Field {
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<Cow<'static, str>>,
        V: Into<FieldValue>,
    {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Shorthand for [`Field::new`]
pub fn field<K, V>(key: K, value: V) -> Field
where
    K: Into<Cow<'static, str>>,
    V: Into<FieldValue>,
{
    Field::new(key, value)
}

/// Insertion-ordered field map
///
/// Setting an existing key replaces its value in place, so the key keeps its
/// original position.
#[derive(Debug, Clone, Default)]
pub struct Fields {
    fields: Vec<Field>,
}

impl Fields {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Add a field, builder style
    #[must_use]
    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<Cow<'static, str>>,
        V: Into<FieldValue>,
    {
        self.set(key, value);
        self
    }

    /// Set a field, replacing the value of an existing key
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<Cow<'static, str>>,
        V: Into<FieldValue>,
    {
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.fields.iter_mut().find(|f| f.key == key) {
            existing.value = value;
        } else {
            self.fields.push(Field { key, value });
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.key == key).map(|f| &f.value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    pub fn as_slice(&self) -> &[Field] {
        &self.fields
    }

    /// Format fields as space separated key=value pairs
    pub fn format_fields(&self) -> String {
        self.fields
            .iter()
            .map(|f| format!("{}={}", f.key, f.value))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_fields())
    }
}

impl FromIterator<Field> for Fields {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for f in iter {
            fields.set(f.key, f.value);
        }
        fields
    }
}

impl IntoIterator for Fields {
    type Item = Field;
    type IntoIter = std::vec::IntoIter<Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Call-site arguments that can be turned into fields
///
/// Alternating key/value sequences (`&[FieldValue]`, arrays, `Vec`) drop an
/// odd trailing element silently. A sequence holding exactly one structured
/// value that marshals to a JSON object is expanded as a pre-built field map.
pub trait KeyValues {
    /// Feed every field, in order, to `f`
    fn visit<F: FnMut(Cow<'static, str>, FieldValue)>(self, f: F);

    /// Collect into a vector of fields
    fn into_fields(self) -> Vec<Field>
    where
        Self: Sized,
    {
        let mut out = Vec::new();
        self.visit(|key, value| out.push(Field { key, value }));
        out
    }
}

fn key_from_value(value: FieldValue) -> Cow<'static, str> {
    match value {
        FieldValue::Str(s) => s,
        other => Cow::Owned(other.to_string()),
    }
}

fn expand_map<F: FnMut(Cow<'static, str>, FieldValue)>(value: &dyn StructuredValue, f: &mut F) {
    match value.to_json_value() {
        Ok(serde_json::Value::Object(map)) => {
            for (k, v) in map {
                f(Cow::Owned(k), FieldValue::from_json(v));
            }
        }
        Ok(_) => {}
        Err(e) => eprintln!("[LOGGER WARNING] Failed to expand field map: {}", e),
    }
}

fn visit_pairs<I, F>(mut iter: I, len: usize, mut f: F)
where
    I: Iterator<Item = FieldValue>,
    F: FnMut(Cow<'static, str>, FieldValue),
{
    if len == 1 {
        if let Some(FieldValue::Any(map)) = iter.next() {
            expand_map(map.as_ref(), &mut f);
        }
        return;
    }
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        f(key_from_value(key), value);
    }
}

impl KeyValues for () {
    fn visit<F: FnMut(Cow<'static, str>, FieldValue)>(self, _f: F) {}
}

impl KeyValues for &[FieldValue] {
    fn visit<F: FnMut(Cow<'static, str>, FieldValue)>(self, f: F) {
        visit_pairs(self.iter().cloned(), self.len(), f);
    }
}

impl<const N: usize> KeyValues for [FieldValue; N] {
    fn visit<F: FnMut(Cow<'static, str>, FieldValue)>(self, f: F) {
        visit_pairs(self.into_iter(), N, f);
    }
}

impl<const N: usize> KeyValues for &[FieldValue; N] {
    fn visit<F: FnMut(Cow<'static, str>, FieldValue)>(self, f: F) {
        self.as_slice().visit(f);
    }
}

impl KeyValues for Vec<FieldValue> {
    fn visit<F: FnMut(Cow<'static, str>, FieldValue)>(self, f: F) {
        let len = self.len();
        visit_pairs(self.into_iter(), len, f);
    }
}

impl KeyValues for Field {
    fn visit<F: FnMut(Cow<'static, str>, FieldValue)>(self, mut f: F) {
        f(self.key, self.value);
    }
}

impl KeyValues for &[Field] {
    fn visit<F: FnMut(Cow<'static, str>, FieldValue)>(self, mut f: F) {
        for field in self {
            f(field.key.clone(), field.value.clone());
        }
    }
}

impl<const N: usize> KeyValues for [Field; N] {
    fn visit<F: FnMut(Cow<'static, str>, FieldValue)>(self, mut f: F) {
        for field in self {
            f(field.key, field.value);
        }
    }
}

impl KeyValues for Vec<Field> {
    fn visit<F: FnMut(Cow<'static, str>, FieldValue)>(self, mut f: F) {
        for field in self {
            f(field.key, field.value);
        }
    }
}

impl KeyValues for Fields {
    fn visit<F: FnMut(Cow<'static, str>, FieldValue)>(self, f: F) {
        self.fields.visit(f);
    }
}

impl KeyValues for &Fields {
    fn visit<F: FnMut(Cow<'static, str>, FieldValue)>(self, f: F) {
        self.as_slice().visit(f);
    }
}
