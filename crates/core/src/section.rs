//! Configuration sections - the primitive key/value storage unit.
//!
//! A [`ConfigSection`] is an insertion-ordered mapping from key to
//! [`ConfigValue`]. Values are a scalar, an ordered list of scalars, or a
//! nested section. Lookups never create keys, so a missing key is always
//! distinguishable from a key holding [`Scalar::Null`].

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A single scalar configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Explicit null
    Null,
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Free text
    Str(String),
}

impl Scalar {
    /// Borrow the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer payload, if any.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Boolean payload, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Whether this is [`Scalar::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for Scalar {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// A value stored under a section key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Single scalar
    Scalar(Scalar),
    /// Ordered list of scalars
    List(Vec<Scalar>),
    /// Nested section
    Section(ConfigSection),
}

impl ConfigValue {
    /// Build a list value from anything convertible to scalars.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Scalar>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Whether this value is a nested section.
    pub fn is_section(&self) -> bool {
        matches!(self, Self::Section(_))
    }

    /// Scalar payload, if any.
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// List payload, if any.
    pub fn as_list(&self) -> Option<&[Scalar]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Nested section payload, if any.
    pub fn as_section(&self) -> Option<&ConfigSection> {
        match self {
            Self::Section(s) => Some(s),
            _ => None,
        }
    }
}

macro_rules! scalar_into_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ConfigValue {
                fn from(v: $ty) -> Self {
                    Self::Scalar(Scalar::from(v))
                }
            }
        )*
    };
}

scalar_into_value!(bool, i64, i32, u32, f64, &str, String);

impl From<Scalar> for ConfigValue {
    fn from(v: Scalar) -> Self {
        Self::Scalar(v)
    }
}

impl From<Vec<Scalar>> for ConfigValue {
    fn from(v: Vec<Scalar>) -> Self {
        Self::List(v)
    }
}

impl From<ConfigSection> for ConfigValue {
    fn from(v: ConfigSection) -> Self {
        Self::Section(v)
    }
}

/// Insertion-ordered mapping from key to [`ConfigValue`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSection {
    entries: Vec<(String, ConfigValue)>,
}

impl ConfigSection {
    /// Create an empty section.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or replace a value. A replaced key keeps its position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Look up a value without creating the key.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Look up a value, falling back to `default` when the key is absent.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a ConfigValue) -> &'a ConfigValue {
        self.get(key).unwrap_or(default)
    }

    /// String scalar stored under `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ConfigValue::as_scalar).and_then(Scalar::as_str)
    }

    /// Integer scalar stored under `key`.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(ConfigValue::as_scalar).and_then(Scalar::as_i64)
    }

    /// Boolean scalar stored under `key`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(ConfigValue::as_scalar).and_then(Scalar::as_bool)
    }

    /// List stored under `key`.
    pub fn get_list(&self, key: &str) -> Option<&[Scalar]> {
        self.get(key).and_then(ConfigValue::as_list)
    }

    /// Nested section stored under `key`.
    pub fn section(&self, key: &str) -> Option<&ConfigSection> {
        self.get(key).and_then(ConfigValue::as_section)
    }

    /// Nested section stored under `key`, created empty if absent.
    ///
    /// A non-section value under `key` is replaced.
    pub fn section_mut(&mut self, key: &str) -> &mut ConfigSection {
        let pos = match self.entries.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                if !self.entries[pos].1.is_section() {
                    self.entries[pos].1 = ConfigValue::Section(ConfigSection::new());
                }
                pos
            }
            None => {
                self.entries
                    .push((key.to_string(), ConfigValue::Section(ConfigSection::new())));
                self.entries.len() - 1
            }
        };
        match &mut self.entries[pos].1 {
            ConfigValue::Section(section) => section,
            _ => unreachable!("entry was just made a section"),
        }
    }

    /// Whether `key` holds a nested section.
    pub fn is_section(&self, key: &str) -> bool {
        self.get(key).map(ConfigValue::is_section).unwrap_or(false)
    }

    /// Remove a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Names of the nested sections, in insertion order.
    pub fn list_sections(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, v)| v.is_section())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy every entry of `other` into this section.
    pub fn merge_from(&mut self, other: &ConfigSection) {
        for (k, v) in other.iter() {
            self.set(k, v.clone());
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the section has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ConfigSection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ConfigSection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SectionVisitor;

        impl<'de> Visitor<'de> for SectionVisitor {
            type Value = ConfigSection;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a configuration section object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut section = ConfigSection::new();
                while let Some((key, value)) = access.next_entry::<String, ConfigValue>()? {
                    section.set(key, value);
                }
                Ok(section)
            }
        }

        deserializer.deserialize_map(SectionVisitor)
    }
}
