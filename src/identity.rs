// src/identity.rs

//! Stable identifiers for configured artefact slots
//!
//! An identifier is the SHA-256 of `platform-directory/name/architecture`.
//! It never includes the resolved URL or version, so a new upstream
//! release shows up as a hash change under the same identifier rather
//! than as a new inventory entry.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Join key between a configured artefact and the persisted run-state
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Derive the identifier of an artefact slot
pub fn identify(platform_directory: &str, artefact_name: &str, architecture: &str) -> Identifier {
    let mut hasher = Sha256::new();
    hasher.update(platform_directory.as_bytes());
    hasher.update(b"/");
    hasher.update(artefact_name.as_bytes());
    hasher.update(b"/");
    hasher.update(architecture.as_bytes());

    Identifier(format!("{:x}", hasher.finalize()))
}
