//! PostgreSQL schema name validation.
//!
//! Schema names end up in `SET search_path` statements, which cannot take
//! bind parameters, so they are checked before being spliced into SQL.

use teanote_core::{Error, Result};

const RESERVED_SCHEMAS: &[&str] = &[
    "pg_catalog",
    "information_schema",
    "pg_toast",
    "select",
    "insert",
    "update",
    "delete",
    "drop",
    "create",
    "alter",
    "grant",
    "revoke",
    "truncate",
];

/// Validate a PostgreSQL schema name for safety and correctness.
///
/// A valid name is 1–63 ASCII alphanumeric or underscore characters, does
/// not start with a digit, and is not a system schema or SQL keyword.
///
/// ```
/// use teanote_db::validate_schema_name;
///
/// assert!(validate_schema_name("tea_archive").is_ok());
/// assert!(validate_schema_name("123invalid").is_err());
/// ```
pub fn validate_schema_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Config("Schema name cannot be empty".to_string()));
    }

    // PostgreSQL identifier limit
    if name.len() > 63 {
        return Err(Error::Config(format!(
            "Schema name exceeds 63 character limit: {} characters",
            name.len()
        )));
    }

    if let Some(first) = name.chars().next() {
        if !first.is_ascii_alphabetic() && first != '_' {
            return Err(Error::Config(format!(
                "Schema name must start with a letter or underscore, found: '{}'",
                first
            )));
        }
    }

    if let Some(ch) = name.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(Error::Config(format!(
            "Schema name contains invalid character: '{}'",
            ch
        )));
    }

    if RESERVED_SCHEMAS.contains(&name.to_lowercase().as_str()) {
        return Err(Error::Config(format!(
            "Schema name '{}' is reserved",
            name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_schema_name_valid() {
        assert!(validate_schema_name("public").is_ok());
        assert!(validate_schema_name("_private").is_ok());
        assert!(validate_schema_name("test_0f3a").is_ok());
    }

    #[test]
    fn test_validate_schema_name_invalid() {
        assert!(validate_schema_name("").is_err());
        assert!(validate_schema_name(&"a".repeat(64)).is_err());
        assert!(validate_schema_name("9lives").is_err());
        assert!(validate_schema_name("tea-notes").is_err());
        assert!(validate_schema_name("x;DROP").is_err());
        assert!(validate_schema_name("pg_catalog").is_err());
        assert!(validate_schema_name("DROP").is_err());
    }
}
