//! Artifact key type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a stored artifact: the object key under which the
/// upload landed in storage (e.g. `videos/5e1f….mp4`).
///
/// Unique per upload; scheduling a deletion for a key that is already
/// pending supersedes the earlier job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    /// Create a key from any string-like value.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key, returning the underlying string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ArtifactKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ArtifactKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ArtifactKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
