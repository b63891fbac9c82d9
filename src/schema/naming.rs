//! Deterministic names for indices and constraints created without one.
//!
//! A name is a prefix plus the first 26 hex chars of SHA-256 over
//! `{table}_{col1}_{col2}...`, so the same table and column list always yields the same
//! name and regenerated down statements match their up statements.

use sha2::{Digest, Sha256};

fn hashed_name(prefix: &str, table: &str, columns: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(table.as_bytes());
    for column in columns {
        hasher.update(b"_");
        hasher.update(column.as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    format!("{prefix}_{}", &digest[..26])
}

pub fn index_name(table: &str, columns: &[String]) -> String {
    hashed_name("IDX", table, columns)
}

pub fn unique_name(table: &str, columns: &[String]) -> String {
    hashed_name("UQ", table, columns)
}

pub fn foreign_key_name(table: &str, columns: &[String]) -> String {
    hashed_name("FK", table, columns)
}
