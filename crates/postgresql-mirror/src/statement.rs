//! Statement builder: mirror event → SQL text + positional arguments.
//!
//! Identifiers are quoted with [`quote_identifier`]; values only ever appear
//! as `$n` placeholders.

use crate::error::{MirrorError, Result};
use crate::quote::quote_identifier;
use mirror_core::{Attributes, MirrorValue};

/// A parameterized statement ready to be executed.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<MirrorValue>,
}

/// `INSERT ... ON CONFLICT (id) DO NOTHING`.
///
/// Replaying the same insert is a no-op on the mirror. Returns `None` when
/// there are no attributes.
pub fn build_insert(table: &str, attributes: &Attributes) -> Result<Option<Statement>> {
    if attributes.is_empty() {
        return Ok(None);
    }

    let columns = attributes
        .columns()
        .map(quote_identifier)
        .collect::<Result<Vec<_>>>()?;
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT (id) DO NOTHING",
        quote_identifier(table)?,
        columns.join(", "),
        placeholders.join(", ")
    );

    Ok(Some(Statement {
        sql,
        args: attributes.values().cloned().collect(),
    }))
}

/// `UPDATE ... SET ... WHERE id = $n`, with the record id bound last.
///
/// The primary key column is never part of the SET list. Returns `None` when
/// nothing is left to set.
pub fn build_update(
    table: &str,
    record_id: Option<&MirrorValue>,
    attributes: &Attributes,
) -> Result<Option<Statement>> {
    if attributes.is_empty() {
        return Ok(None);
    }

    let mut set_clauses = Vec::with_capacity(attributes.len());
    let mut args = Vec::with_capacity(attributes.len() + 1);
    for (i, (column, value)) in attributes.without_primary_key().enumerate() {
        set_clauses.push(format!("{} = ${}", quote_identifier(column)?, i + 1));
        args.push(value.clone());
    }
    if set_clauses.is_empty() {
        return Ok(None);
    }

    let quoted_table = quote_identifier(table)?;
    let record_id = require_record_id(record_id, "update", &quoted_table)?;
    args.push(record_id.clone());

    let sql = format!(
        "UPDATE {} SET {} WHERE id = ${}",
        quoted_table,
        set_clauses.join(", "),
        args.len()
    );

    Ok(Some(Statement { sql, args }))
}

/// `DELETE ... WHERE id = $1`.
pub fn build_delete(table: &str, record_id: Option<&MirrorValue>) -> Result<Statement> {
    let quoted_table = quote_identifier(table)?;
    let record_id = require_record_id(record_id, "destroy", &quoted_table)?;

    Ok(Statement {
        sql: format!("DELETE FROM {quoted_table} WHERE id = $1"),
        args: vec![record_id.clone()],
    })
}

// A missing id would otherwise turn into an unbounded WHERE clause.
fn require_record_id<'a>(
    record_id: Option<&'a MirrorValue>,
    operation: &str,
    table: &str,
) -> Result<&'a MirrorValue> {
    match record_id {
        Some(id) if !id.is_null() => Ok(id),
        _ => Err(MirrorError::MissingRecordId {
            operation: operation.to_string(),
            table: table.to_string(),
        }),
    }
}
