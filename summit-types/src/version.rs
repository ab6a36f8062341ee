//! Local sequence numbers for cached entities.
//!
//! Versions are assigned by the client, never by the backend. Every accepted
//! write to an id carries a version strictly greater than the one before it,
//! which is the only ordering the cache trusts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A per-id monotonic version.
///
/// `Version::ZERO` is the version of an id the cache has never seen; the
/// first accepted write is therefore always `Version(1)` or later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// The version of an id with no history.
    pub const ZERO: Version = Version(0);

    /// Creates a version from a raw counter value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Returns the version that immediately follows this one.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Returns true if a write carrying this version may replace `current`.
    #[must_use]
    pub fn supersedes(&self, current: Version) -> bool {
        *self > current
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
