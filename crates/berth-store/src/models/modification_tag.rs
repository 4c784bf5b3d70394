//! Update identity for persisted records.

use serde::{Deserialize, Serialize};

/// A globally-consistent update identity for a record.
///
/// The `epoch` is a fresh UUID assigned when the record is created and never
/// changes afterwards; the `index` increments on every successful update.
/// Together they let observers order the versions of one record and detect
/// a delete-and-recreate (same guid, different epoch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationTag {
    /// Immutable identity of this record incarnation.
    pub epoch: String,
    /// Strictly increasing update counter within the epoch.
    pub index: u64,
}

impl ModificationTag {
    /// Creates a tag for a freshly created record.
    #[must_use]
    pub fn new(epoch: impl Into<String>) -> Self {
        Self {
            epoch: epoch.into(),
            index: 0,
        }
    }

    /// Creates a tag with a freshly generated epoch.
    #[must_use]
    pub fn fresh() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    /// Records one successful update.
    pub fn increment(&mut self) {
        self.index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tag_starts_at_zero() {
        let tag = ModificationTag::new("epoch-1");
        assert_eq!(tag.epoch, "epoch-1");
        assert_eq!(tag.index, 0);
    }

    #[test]
    fn increment_bumps_index_only() {
        let mut tag = ModificationTag::new("epoch-1");
        tag.increment();
        tag.increment();
        assert_eq!(tag.index, 2);
        assert_eq!(tag.epoch, "epoch-1");
    }

    #[test]
    fn fresh_tags_have_distinct_epochs() {
        assert_ne!(ModificationTag::fresh().epoch, ModificationTag::fresh().epoch);
    }
}
