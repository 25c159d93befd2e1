//! Lease table statements.
//!
//! The table name comes from configuration and is interpolated into SQL
//! text, so it is validated against a strict identifier grammar first;
//! everything else is bound as a parameter.

use crosslock_core::error::{LockError, LockResult};

/// PostgreSQL truncates identifiers beyond this length.
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Validates a table name: one identifier, or `schema.table`. Identifiers
/// are `[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes each.
pub fn validate_table_name(table: &str) -> LockResult<()> {
    let mut segments = table.split('.');
    let invalid = |reason: &str| {
        LockError::InvalidConfig(format!("invalid lock table name '{table}': {reason}"))
    };

    for _ in 0..2 {
        let Some(segment) = segments.next() else {
            return Ok(());
        };
        if segment.is_empty() {
            return Err(invalid("empty identifier"));
        }
        if segment.len() > MAX_IDENTIFIER_LENGTH {
            return Err(invalid("identifier longer than 63 bytes"));
        }
        let mut chars = segment.chars();
        let first = chars.next().unwrap_or('_');
        if !(first.is_ascii_alphabetic() || first == '_') {
            return Err(invalid("identifier must start with a letter or underscore"));
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid(
                "identifier may only contain letters, digits and underscores",
            ));
        }
    }

    if segments.next().is_some() {
        return Err(invalid("at most one schema qualifier is allowed"));
    }
    Ok(())
}

/// SQL statements for one validated table, built once per backend.
#[derive(Clone)]
pub(crate) struct Statements {
    /// Insert the lease, or take over the row when the previous lease has
    /// expired. Row present and unexpired means no row comes back and the
    /// attempt failed. One statement, so concurrent acquirers race inside
    /// the database's own conflict handling rather than in client code.
    pub acquire: String,
    /// Compare-and-delete: removes the row only while the token still owns it.
    pub release: String,
    /// Compare-and-extend: moves the deadline only while the token still
    /// owns it and the lease has not yet expired.
    pub renew: String,
    /// Fetch the current deadline for an advisory held/free answer.
    pub probe: String,
    /// Schema bootstrap for `ensure_table`.
    pub create_table: String,
}

impl Statements {
    pub fn new(table: &str) -> Self {
        Self {
            acquire: format!(
                "INSERT INTO {table} AS held (name, owner_token, expires_at) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (name) DO UPDATE \
                 SET owner_token = EXCLUDED.owner_token, expires_at = EXCLUDED.expires_at \
                 WHERE held.expires_at <= $4 \
                 RETURNING owner_token"
            ),
            release: format!("DELETE FROM {table} WHERE name = $1 AND owner_token = $2"),
            renew: format!(
                "UPDATE {table} SET expires_at = $3 \
                 WHERE name = $1 AND owner_token = $2 AND expires_at > $4"
            ),
            probe: format!("SELECT expires_at FROM {table} WHERE name = $1"),
            create_table: format!(
                "CREATE TABLE IF NOT EXISTS {table} (\
                 name TEXT PRIMARY KEY, \
                 owner_token TEXT NOT NULL, \
                 expires_at BIGINT NOT NULL)"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_qualified_names() {
        assert!(validate_table_name("crosslock_locks").is_ok());
        assert!(validate_table_name("_private").is_ok());
        assert!(validate_table_name("jobs.locks_2024").is_ok());
    }

    #[test]
    fn rejects_injection_shaped_names() {
        assert!(validate_table_name("locks; DROP TABLE users").is_err());
        assert!(validate_table_name("locks--").is_err());
        assert!(validate_table_name("lo cks").is_err());
        assert!(validate_table_name("\"locks\"").is_err());
    }

    #[test]
    fn rejects_malformed_identifiers() {
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("1locks").is_err());
        assert!(validate_table_name("a.b.c").is_err());
        assert!(validate_table_name("a.").is_err());
        assert!(validate_table_name(".b").is_err());
        assert!(validate_table_name(&"x".repeat(64)).is_err());
        assert!(validate_table_name(&"x".repeat(63)).is_ok());
    }

    #[test]
    fn statements_target_the_given_table() {
        let statements = Statements::new("jobs.locks");
        assert!(statements.acquire.starts_with("INSERT INTO jobs.locks"));
        assert!(statements.acquire.contains("ON CONFLICT (name) DO UPDATE"));
        assert!(statements.acquire.contains("held.expires_at <= $4"));
        assert!(statements.release.contains("owner_token = $2"));
        assert!(statements.renew.contains("expires_at > $4"));
        assert!(statements.create_table.contains("IF NOT EXISTS jobs.locks"));
    }
}
