//! Seed digest canonicalization
//!
//! Computes stable SHA256 digests of seeds. Field maps are sorted, so the
//! digest depends on content and record order, not on YAML layout.

use sha2::{Digest, Sha256};

use civitas_core::errors::{ExError, ExErrorKind};

use crate::errors::Result;
use crate::seed::format_v0::SeedV0;

/// Compute a stable digest for a seed
///
/// Returns a SHA256 hex digest of the seed's canonical JSON form
pub fn compute_seed_digest(seed: &SeedV0) -> Result<String> {
    let json = serde_json::to_string(seed).map_err(|e| {
        ExError::new(ExErrorKind::Serialization)
            .with_op("seed_digest")
            .with_message(e.to_string())
    })?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
