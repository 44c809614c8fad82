//! Identifier quoting.
//!
//! Every table and column name that reaches SQL text goes through
//! [`quote_identifier`]. Values never do; they are bound as parameters.

use crate::error::{MirrorError, Result};

/// Quote an identifier the way PostgreSQL's `quote_ident` does, but always.
///
/// The name is wrapped in double quotes and embedded double quotes are
/// doubled, so the result can never terminate the identifier early. Empty
/// names and names containing NUL are rejected because the server cannot
/// represent them.
pub fn quote_identifier(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(MirrorError::InvalidIdentifier {
            name: name.to_string(),
            reason: "identifier is empty",
        });
    }
    if name.contains('\0') {
        return Err(MirrorError::InvalidIdentifier {
            name: name.to_string(),
            reason: "identifier contains a NUL byte",
        });
    }

    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for ch in name.chars() {
        if ch == '"' {
            quoted.push('"');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    Ok(quoted)
}
