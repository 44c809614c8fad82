//! Ordered column → value mapping carried by mirror events.

use crate::values::MirrorValue;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Name of the primary key column on every mirrored table.
pub const PRIMARY_KEY: &str = "id";

/// Ordered mapping from column name to [`MirrorValue`].
///
/// Insertion order is preserved, both in memory and through JSON, so the
/// generated column list and its positional arguments are stable. Setting a
/// column that already exists replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<(String, MirrorValue)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `column` to `value`, keeping the original position if present.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<MirrorValue>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with(mut self, column: impl Into<String>, value: impl Into<MirrorValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&MirrorValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MirrorValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &MirrorValue> {
        self.entries.iter().map(|(_, value)| value)
    }

    /// Iterate over every column except the primary key.
    pub fn without_primary_key(&self) -> impl Iterator<Item = (&str, &MirrorValue)> {
        self.iter().filter(|(name, _)| *name != PRIMARY_KEY)
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<MirrorValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Attributes::new();
        for (column, value) in iter {
            attributes.insert(column, value);
        }
        attributes
    }
}

impl IntoIterator for Attributes {
    type Item = (String, MirrorValue);
    type IntoIter = std::vec::IntoIter<(String, MirrorValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (column, value) in &self.entries {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

struct AttributesVisitor;

impl<'de> Visitor<'de> for AttributesVisitor {
    type Value = Attributes;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of column names to mirror values")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
        let mut attributes = Attributes::new();
        while let Some((column, value)) = access.next_entry::<String, MirrorValue>()? {
            attributes.insert(column, value);
        }
        Ok(attributes)
    }
}

impl<'de> Deserialize<'de> for Attributes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(AttributesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insertion_order_is_preserved() {
        let attrs = Attributes::new()
            .with("zeta", 1)
            .with("alpha", 2)
            .with("mid", 3);
        let columns: Vec<&str> = attrs.columns().collect();
        assert_eq!(columns, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_reinsert_replaces_in_place() {
        let attrs = Attributes::new()
            .with("id", "a")
            .with("name", "first")
            .with("id", "b");
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs.get("id"), Some(&MirrorValue::text("b")));
        assert_eq!(attrs.columns().next(), Some("id"));
    }

    #[test]
    fn test_without_primary_key() {
        let attrs = Attributes::new().with("id", "x").with("name", "n");
        let rest: Vec<&str> = attrs.without_primary_key().map(|(c, _)| c).collect();
        assert_eq!(rest, vec!["name"]);
    }

    #[test]
    fn test_json_roundtrip_keeps_order() {
        let raw = r#"{"name":{"kind":"text","value":"Test"},"id":{"kind":"text","value":"id-1"},"balance":{"kind":"decimal","value":"10.00"}}"#;
        let attrs: Attributes = serde_json::from_str(raw).unwrap();
        let columns: Vec<&str> = attrs.columns().collect();
        assert_eq!(columns, vec!["name", "id", "balance"]);
        assert_eq!(serde_json::to_string(&attrs).unwrap(), raw);
    }

    #[test]
    fn test_rejects_non_map() {
        let parsed: Result<Attributes, _> = serde_json::from_value(json!(["id"]));
        assert!(parsed.is_err());
    }
}
