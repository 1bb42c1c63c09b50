//! Type-safe farm identifier.
//!
//! [`FarmId`] is a newtype wrapper around the farm's string identifier
//! (usually a UUID) so that farm ids cannot be confused with owner, item
//! or event ids that travel in the same envelopes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a farm and of its analytics record.
///
/// Producers mint farm ids, so no format is enforced beyond being
/// non-blank. Used as the key of the read-model and as the `aggregate_id`
/// of farm-scoped events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FarmId(String);

impl FarmId {
    /// Parses a farm id, returning `None` for empty or whitespace-only input.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Generates a fresh random farm id (UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<uuid::Uuid> for FarmId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid.to_string())
    }
}

impl From<FarmId> for String {
    fn from(id: FarmId) -> Self {
        id.0
    }
}
