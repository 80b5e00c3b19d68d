//! Row record decoded from an uploaded CSV file.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One data row of an uploaded file.
///
/// Keys come from the header row and keep its order; lookups are by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowRecord {
    fields: Vec<(String, String)>,
}

impl RowRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from `(column, value)` pairs in header order.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut record = Self::new();
        for (key, value) in pairs {
            record.insert(key, value);
        }
        record
    }

    /// Set a column value. A repeated column name replaces the earlier value
    /// but keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Look up a cell by column name (case-sensitive).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for RowRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RowRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = RowRecord;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object of string cells")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RowRecord, A::Error> {
                let mut record = RowRecord::new();
                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    record.insert(key, value);
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_header_order_in_json() {
        let row = RowRecord::from_pairs([
            ("title", "First"),
            ("description", "Desc"),
            ("price", "10.99"),
            ("count", "5"),
        ]);

        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(
            json,
            r#"{"title":"First","description":"Desc","price":"10.99","count":"5"}"#
        );
    }

    #[test]
    fn test_lookup_is_by_name_and_case_sensitive() {
        let row = RowRecord::from_pairs([("count", "5"), ("Title", "X")]);
        assert_eq!(row.get("count"), Some("5"));
        assert_eq!(row.get("title"), None);
        assert_eq!(row.get("Title"), Some("X"));
    }

    #[test]
    fn test_repeated_column_replaces_value() {
        let row = RowRecord::from_pairs([("a", "1"), ("b", "2"), ("a", "3")]);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("a"), Some("3"));
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_deserialize_preserves_order() {
        let row: RowRecord = serde_json::from_str(r#"{"z":"1","a":"2"}"#).unwrap();
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["z", "a"]);
    }
}
