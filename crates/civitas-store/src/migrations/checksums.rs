//! Migration checksums
//!
//! Generated DDL is compared by checksum on every open. Runs of whitespace
//! collapse to one space first, so only a change to the declared columns,
//! constraints or indexes counts as drift.

use sha2::{Digest, Sha256};

/// SHA256 hex digest of `sql` after whitespace normalization
pub fn compute_checksum(sql: &str) -> String {
    let mut hasher = Sha256::new();
    for (i, token) in sql.split_whitespace().enumerate() {
        if i > 0 {
            hasher.update(b" ");
        }
        hasher.update(token.as_bytes());
    }
    hex::encode(hasher.finalize())
}
