//! Deterministic, user-scoped query fingerprints used as cache keys.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{ProviderId, UserId};

/// SHA-256 digest (lowercase hex) of `(user, normalized query, provider set)`.
///
/// Provider order and duplicates do not matter; the user is always part of the
/// digest so cached answers never cross user boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryFingerprint(String);

impl QueryFingerprint {
    /// Computes the fingerprint for one request.
    pub fn compute<'a>(
        user: &UserId,
        query: &str,
        providers: impl IntoIterator<Item = &'a ProviderId>,
    ) -> Self {
        let providers: BTreeSet<&str> = providers.into_iter().map(ProviderId::as_str).collect();

        let mut hasher = Sha256::new();
        update_field(&mut hasher, user.as_str());
        update_field(&mut hasher, &normalize_query(query));
        hasher.update((providers.len() as u64).to_be_bytes());
        for provider in providers {
            update_field(&mut hasher, provider);
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Returns the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueryFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Length-prefixed so that no two distinct field sequences share an encoding.
fn update_field(hasher: &mut Sha256, field: &str) {
    hasher.update((field.len() as u64).to_be_bytes());
    hasher.update(field.as_bytes());
}

/// Trims the query and collapses whitespace runs to single spaces.
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}
