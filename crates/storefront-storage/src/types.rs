//! Domain types shared by the cache, the record store and the server.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::InvalidProductKey;

/// Identifier of a product category.
///
/// The same key names the record store table and the cache entry, so it is
/// never empty. Everything else about its shape is the record store's concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductKey(String);

impl ProductKey {
    /// Creates a key, rejecting the empty string.
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidProductKey> {
        let value = value.into();
        if value.is_empty() {
            return Err(InvalidProductKey::Empty);
        }
        Ok(Self(value))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProductKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ProductKey {
    type Err = InvalidProductKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ProductKey {
    type Error = InvalidProductKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProductKey> for String {
    fn from(key: ProductKey) -> Self {
        key.0
    }
}

/// The ordered records stored for one product key.
///
/// Records are opaque JSON values; nothing in the read path inspects them.
/// Serializes as a plain JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductRecordSet(Vec<Value>);

impl ProductRecordSet {
    pub fn new(records: Vec<Value>) -> Self {
        Self(records)
    }

    pub fn records(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for ProductRecordSet {
    fn from(records: Vec<Value>) -> Self {
        Self(records)
    }
}

impl FromIterator<Value> for ProductRecordSet {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_product_key_rejects_empty() {
        assert_eq!(ProductKey::new(""), Err(InvalidProductKey::Empty));
        assert_eq!(ProductKey::new("beanies").unwrap().as_str(), "beanies");
        assert!("".parse::<ProductKey>().is_err());
    }

    #[test]
    fn test_product_key_deserialize_validates() {
        let key: ProductKey = serde_json::from_str("\"gloves\"").unwrap();
        assert_eq!(key.to_string(), "gloves");
        assert!(serde_json::from_str::<ProductKey>("\"\"").is_err());
    }

    #[test]
    fn test_record_set_serializes_as_array() {
        let records = ProductRecordSet::new(vec![json!({"id": "a1", "name": "HEMREV"})]);
        let text = serde_json::to_string(&records).unwrap();
        assert_eq!(text, r#"[{"id":"a1","name":"HEMREV"}]"#);

        let back: ProductRecordSet = serde_json::from_str(&text).unwrap();
        assert_eq!(back, records);
    }
}
