//! SQL identifier quoting for product table names.

use storefront_storage::RecordStoreError;

/// PostgreSQL truncates identifiers longer than this (NAMEDATALEN - 1).
const MAX_IDENTIFIER_BYTES: usize = 63;

/// Quotes `name` as a PostgreSQL identifier.
///
/// Embedded double quotes are doubled, so any product key maps to exactly one
/// table name and can never terminate the identifier early. Keys that
/// PostgreSQL would silently truncate or cannot represent are rejected.
pub fn quote_identifier(name: &str) -> Result<String, RecordStoreError> {
    if name.is_empty() {
        return Err(RecordStoreError::invalid_key("empty identifier"));
    }
    if name.len() > MAX_IDENTIFIER_BYTES {
        return Err(RecordStoreError::invalid_key(format!(
            "identifier longer than {MAX_IDENTIFIER_BYTES} bytes"
        )));
    }
    if name.contains('\0') {
        return Err(RecordStoreError::invalid_key("identifier contains NUL"));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_identifier() {
        assert_eq!(quote_identifier("beanies").unwrap(), "\"beanies\"");
        assert_eq!(quote_identifier("Face Masks").unwrap(), "\"Face Masks\"");
    }

    #[test]
    fn test_embedded_quotes_are_doubled() {
        assert_eq!(
            quote_identifier("x\"; DROP TABLE gloves; --").unwrap(),
            "\"x\"\"; DROP TABLE gloves; --\""
        );
    }

    #[test]
    fn test_rejects_unrepresentable_names() {
        assert!(quote_identifier("").is_err());
        assert!(quote_identifier("a\0b").is_err());
        assert!(quote_identifier(&"p".repeat(64)).is_err());
        assert!(quote_identifier(&"p".repeat(63)).is_ok());
    }
}
