//! Identifier validation and per-engine quoting.
//!
//! Identifiers cannot be bound as statement parameters, so every DDL and
//! catalog statement builder goes through a [`Quoter`]. Table and column names
//! come from snapshot files that may have been edited by hand; they are
//! validated first and then quoted with the engine's escaping rules.

use crate::error::{Result, SnapshotError};

/// Maximum identifier length (conservative limit across engines).
/// - PostgreSQL: 63 bytes
/// - MySQL: 64 characters
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing null bytes, and
/// identifiers exceeding the maximum length.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SnapshotError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(SnapshotError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(SnapshotError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier.
///
/// ```ignore
/// assert_eq!(quote_pg("users")?, "\"users\"");
/// assert_eq!(quote_pg("table\"name")?, "\"table\"\"name\"");
/// ```
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Quote a MySQL identifier using backticks.
///
/// ```ignore
/// assert_eq!(quote_mysql("users")?, "`users`");
/// assert_eq!(quote_mysql("table`name")?, "`table``name`");
/// ```
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Engine-specific identifier and literal quoting.
///
/// Statement builders never interpolate names or string values directly;
/// they ask the quoter of the engine they target.
pub trait Quoter: Send + Sync {
    /// Quote a table, column, type, or constraint name.
    fn quote_ident(&self, name: &str) -> Result<String>;

    /// Quote a string value as a SQL literal.
    fn quote_literal(&self, value: &str) -> String;

    /// Quote a comma-separated identifier list, as used in key clauses.
    fn quote_list(&self, names: &[&str]) -> Result<String> {
        let quoted = names
            .iter()
            .map(|n| self.quote_ident(n))
            .collect::<Result<Vec<_>>>()?;
        Ok(quoted.join(", "))
    }
}

/// PostgreSQL quoting (standard_conforming_strings on).
#[derive(Debug, Clone, Copy, Default)]
pub struct PgQuoter;

impl Quoter for PgQuoter {
    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_pg(name)
    }

    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }
}

/// MySQL quoting. Backslash is an escape character inside MySQL strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlQuoter;

impl Quoter for MysqlQuoter {
    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_mysql(name)
    }

    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn test_validate_identifier_normal() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("order_items").is_ok());
        assert!(validate_identifier("column with spaces").is_ok());
        assert!(validate_identifier("日本語").is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_empty() {
        let result = validate_identifier("");
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_validate_identifier_rejects_null_byte() {
        let result = validate_identifier("table\0name");
        assert!(result.unwrap_err().to_string().contains("null byte"));
    }

    #[test]
    fn test_validate_identifier_length_limit() {
        let max_name = "a".repeat(MAX_IDENTIFIER_LENGTH);
        assert!(validate_identifier(&max_name).is_ok());
        let long_name = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        assert!(validate_identifier(&long_name)
            .unwrap_err()
            .to_string()
            .contains("maximum length"));
    }

    // =========================================================================
    // PostgreSQL quoting tests
    // =========================================================================

    #[test]
    fn test_quote_pg_escapes_double_quote() {
        assert_eq!(quote_pg("users").unwrap(), "\"users\"");
        assert_eq!(quote_pg("table\"name").unwrap(), "\"table\"\"name\"");
    }

    #[test]
    fn test_pg_quoter_injection_safely_quoted() {
        let q = PgQuoter;
        assert_eq!(
            q.quote_ident("Robert'); DROP TABLE Students;--").unwrap(),
            "\"Robert'); DROP TABLE Students;--\""
        );
        assert_eq!(q.quote_literal("O'Brien"), "'O''Brien'");
        assert_eq!(q.quote_literal("a\\b"), "'a\\b'");
    }

    // =========================================================================
    // MySQL quoting tests
    // =========================================================================

    #[test]
    fn test_quote_mysql_escapes_backtick() {
        assert_eq!(quote_mysql("users").unwrap(), "`users`");
        assert_eq!(quote_mysql("table`name").unwrap(), "`table``name`");
    }

    #[test]
    fn test_mysql_quoter_escapes_backslash_in_literals() {
        let q = MysqlQuoter;
        assert_eq!(q.quote_literal("O'Brien"), "'O''Brien'");
        assert_eq!(q.quote_literal("a\\'b"), "'a\\\\''b'");
        assert!(q.quote_ident("bad\0name").is_err());
    }

    #[test]
    fn test_quote_list() {
        assert_eq!(
            PgQuoter.quote_list(&["id", "tenant"]).unwrap(),
            "\"id\", \"tenant\""
        );
        assert_eq!(MysqlQuoter.quote_list(&["id"]).unwrap(), "`id`");
        assert!(PgQuoter.quote_list(&["id", ""]).is_err());
    }
}
