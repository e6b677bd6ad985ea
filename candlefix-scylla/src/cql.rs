//! CQL statement text.
//!
//! Keyspace and table names cannot be bound as values, so they are validated
//! and spliced into the statement text.

use candlefix_core::{RepairError, WriteCondition};

const MAX_IDENT_LEN: usize = 48;

/// Reject anything that is not a plain unquoted CQL identifier.
///
/// # Errors
/// Returns `Err(RepairError::InvalidArg)` for empty, overlong or non-alphanumeric names.
pub fn validate_identifier(kind: &str, name: &str) -> Result<(), RepairError> {
    let mut chars = name.chars();
    let valid = name.len() <= MAX_IDENT_LEN
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(RepairError::InvalidArg(format!("invalid {kind} name '{name}'")))
    }
}

pub const KEYSPACE_EXISTS: &str =
    "SELECT keyspace_name FROM system_schema.keyspaces WHERE keyspace_name = ?";

pub const COLUMN_TYPES: &str =
    "SELECT column_name, type FROM system_schema.columns WHERE keyspace_name = ? AND table_name = ?";

pub fn distinct_partitions(keyspace: &str, table: &str) -> String {
    format!("SELECT DISTINCT symbol, interval FROM {keyspace}.{table}")
}

pub fn select_partition(keyspace: &str, table: &str) -> String {
    format!(
        "SELECT symbol, interval, \"createdAt\", \"updatedAt\", open, high, low, close, volume \
         FROM {keyspace}.{table} WHERE symbol = ? AND interval = ?"
    )
}

fn condition_clause(condition: WriteCondition) -> &'static str {
    match condition {
        WriteCondition::Always => "",
        WriteCondition::UpdatedAtEquals(_) => " IF \"updatedAt\" = ?",
    }
}

pub fn update_candle(keyspace: &str, table: &str, condition: WriteCondition) -> String {
    format!(
        "UPDATE {keyspace}.{table} SET open = ?, high = ?, low = ?, close = ?, volume = ?, \
         \"updatedAt\" = ? WHERE symbol = ? AND interval = ? AND \"createdAt\" = ?{}",
        condition_clause(condition)
    )
}

pub fn delete_candle(keyspace: &str, table: &str, condition: WriteCondition) -> String {
    format!(
        "DELETE FROM {keyspace}.{table} WHERE symbol = ? AND interval = ? AND \"createdAt\" = ?{}",
        condition_clause(condition)
    )
}
