//! Object locations and the prefix that encodes pipeline stage.

use std::fmt;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// A (bucket, key) pair in object storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Build a location from an object-created notification.
    ///
    /// Keys in storage notifications are form-encoded (`+` for space).
    pub fn from_event(bucket: impl Into<String>, raw_key: &str) -> Result<Self> {
        let spaced = raw_key.replace('+', " ");
        let key = percent_decode_str(&spaced)
            .decode_utf8()
            .map_err(|e| AppError::invalid_input(format!("Object key is not UTF-8: {e}")))?;
        Ok(Self::new(bucket, key))
    }

    pub fn is_under(&self, prefix: &str) -> bool {
        self.key.starts_with(prefix) && self.key.len() > prefix.len()
    }

    /// File name relative to the given stage prefix.
    pub fn name_under<'a>(&'a self, prefix: &str) -> Option<&'a str> {
        self.key.strip_prefix(prefix).filter(|name| !name.is_empty())
    }

    /// Same object name under another stage prefix, e.g.
    /// `uploaded/test.csv` -> `parsed/test.csv`.
    pub fn relocate(&self, from_prefix: &str, to_prefix: &str) -> Result<Self> {
        let name = self.name_under(from_prefix).ok_or_else(|| {
            AppError::invalid_input(format!(
                "Object {} is not under prefix '{}'",
                self, from_prefix
            ))
        })?;
        Ok(Self::new(self.bucket.clone(), format!("{to_prefix}{name}")))
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relocate_uploaded_to_parsed() {
        let source = ObjectLocation::new("imports", "uploaded/test.csv");
        let dest = source.relocate("uploaded/", "parsed/").unwrap();
        assert_eq!(dest, ObjectLocation::new("imports", "parsed/test.csv"));
    }

    #[test]
    fn test_relocate_keeps_nested_names() {
        let source = ObjectLocation::new("imports", "uploaded/2025/q1.csv");
        let dest = source.relocate("uploaded/", "parsed/").unwrap();
        assert_eq!(dest.key, "parsed/2025/q1.csv");
    }

    #[test]
    fn test_relocate_rejects_foreign_prefix() {
        let source = ObjectLocation::new("imports", "parsed/test.csv");
        assert!(source.relocate("uploaded/", "parsed/").is_err());

        let bare_prefix = ObjectLocation::new("imports", "uploaded/");
        assert!(!bare_prefix.is_under("uploaded/"));
        assert!(bare_prefix.relocate("uploaded/", "parsed/").is_err());
    }

    #[test]
    fn test_from_event_decodes_key() {
        let loc = ObjectLocation::from_event("imports", "uploaded/spring+sale%282%29.csv").unwrap();
        assert_eq!(loc.key, "uploaded/spring sale(2).csv");
        assert_eq!(loc.to_string(), "s3://imports/uploaded/spring sale(2).csv");
    }
}
