//! ClassAd records and the long-format text codec.
//!
//! The HTCondor inspection tools print one attribute per line as
//! `Name = Value`, with a blank line between records. This module turns that
//! output into [`ClassAd`] values, either all at once ([`ClassAdReader::read_all`])
//! or incrementally over bounded channels ([`ClassAdReader::stream`] and
//! [`ClassAdReader::stream_blocking`]).

pub mod attribute;
pub mod reader;
pub mod stream;

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

pub use attribute::{Attribute, AttributeKind, NON_FINITE_REAL_KEY, REAL_PRECISION};
pub use reader::{ClassAdReader, ParseError, DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_LINE_BYTES};
pub use stream::BlockingClassAdStream;

/// A single ClassAd: named, typed attributes describing one job, machine,
/// daemon or history entry.
///
/// Keys are unique. Insertion order is kept so a record renders back in the
/// order the tool printed it; it carries no other meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ClassAd {
    attributes: IndexMap<String, Attribute>,
}

impl ClassAd {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from plain strings, typing each value with
    /// [`Attribute::parse`]. A value of `"42"` becomes `Integer(42)`.
    #[must_use]
    pub fn from_strings<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: AsRef<str>,
    {
        values
            .into_iter()
            .map(|(k, v)| (k.into(), Attribute::parse(v.as_ref())))
            .collect()
    }

    /// Insert or replace an attribute, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: Attribute) -> Option<Attribute> {
        self.attributes.insert(name.into(), value)
    }

    /// Look up an attribute by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Whether the record contains `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// True when the record holds no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Iterate attributes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Text rendering of every attribute, keyed by name.
    #[must_use]
    pub fn strings(&self) -> HashMap<String, String> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }
}

impl FromIterator<(String, Attribute)> for ClassAd {
    fn from_iter<I: IntoIterator<Item = (String, Attribute)>>(iter: I) -> Self {
        Self {
            attributes: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ClassAd {
    type Item = (String, Attribute);
    type IntoIter = indexmap::map::IntoIter<String, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.attributes.into_iter()
    }
}

/// Long-format rendering, one `Name = Value` line per attribute.
impl fmt::Display for ClassAd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.attributes {
            writeln!(f, "{name} = {}", value.to_long_value())?;
        }
        Ok(())
    }
}
