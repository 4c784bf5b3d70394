//! Actual-LRP records: one replica's runtime presence, one per index.

use berth_core::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{validation_result, ModificationTag};

/// Identity of one replica slot of a desired LRP.
///
/// Every actual LRP references a desired LRP whose `process_guid` matches
/// and whose declared instance count exceeds `index`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActualLrpKey {
    /// The owning process.
    pub process_guid: String,
    /// The replica slot, in `[0, instances)`.
    pub index: i32,
    /// The owning process's domain.
    pub domain: String,
}

impl ActualLrpKey {
    /// Creates a key for one replica slot.
    #[must_use]
    pub fn new(process_guid: impl Into<String>, index: i32, domain: impl Into<String>) -> Self {
        Self {
            process_guid: process_guid.into(),
            index,
            domain: domain.into(),
        }
    }

    /// Validates the key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` naming every invalid field.
    pub fn validate(&self) -> Result<()> {
        let mut invalid = Vec::new();

        if self.process_guid.is_empty() {
            invalid.push("process_guid");
        }
        if self.index < 0 {
            invalid.push("index");
        }
        if self.domain.is_empty() {
            invalid.push("domain");
        }

        validation_result(invalid)
    }
}

/// The cell assignment of a claimed replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualLrpInstanceKey {
    /// The container instance on the cell.
    pub instance_guid: String,
    /// The cell the replica is placed on.
    pub cell_id: String,
}

/// The state of one replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActualLrpState {
    /// Awaiting placement by the auctioneer.
    Unclaimed,
    /// A cell has claimed the slot but the instance is not yet running.
    Claimed,
    /// The instance is running on its cell.
    Running,
    /// The instance crashed and awaits restart policy.
    Crashed,
}

impl std::fmt::Display for ActualLrpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unclaimed => "Unclaimed",
            Self::Claimed => "Claimed",
            Self::Running => "Running",
            Self::Crashed => "Crashed",
        };
        write!(f, "{name}")
    }
}

/// One replica's runtime presence record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualLrp {
    /// Which replica slot this record describes.
    pub key: ActualLrpKey,
    /// Cell assignment; `None` until claimed.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub instance_key: Option<ActualLrpInstanceKey>,
    /// Current lifecycle state.
    pub state: ActualLrpState,
    /// When the record entered its current state.
    pub since: DateTime<Utc>,
    /// How many times the instance has crashed.
    #[serde(default)]
    pub crash_count: i32,
    /// Update identity.
    pub modification_tag: ModificationTag,
}

impl ActualLrp {
    /// Creates a freshly unclaimed replica record.
    #[must_use]
    pub fn unclaimed(key: ActualLrpKey) -> Self {
        Self {
            key,
            instance_key: None,
            state: ActualLrpState::Unclaimed,
            since: Utc::now(),
            crash_count: 0,
            modification_tag: ModificationTag::fresh(),
        }
    }

    /// Returns the cell this replica is placed on, if any.
    #[must_use]
    pub fn cell_id(&self) -> Option<&str> {
        self.instance_key.as_ref().map(|k| k.cell_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unclaimed_record_has_no_cell() {
        let lrp = ActualLrp::unclaimed(ActualLrpKey::new("p", 0, "d"));
        assert_eq!(lrp.state, ActualLrpState::Unclaimed);
        assert!(lrp.instance_key.is_none());
        assert!(lrp.cell_id().is_none());
        assert_eq!(lrp.crash_count, 0);
    }

    #[test]
    fn key_validation_names_bad_fields() {
        let key = ActualLrpKey::new("", -2, "");
        let msg = key.validate().expect_err("should fail").to_string();
        assert!(msg.contains("process_guid"));
        assert!(msg.contains("index"));
        assert!(msg.contains("domain"));

        assert!(ActualLrpKey::new("p", 0, "d").validate().is_ok());
    }

    #[test]
    fn cell_id_reads_through_instance_key() {
        let mut lrp = ActualLrp::unclaimed(ActualLrpKey::new("p", 1, "d"));
        lrp.instance_key = Some(ActualLrpInstanceKey {
            instance_guid: "ig-1".into(),
            cell_id: "cell-a".into(),
        });
        lrp.state = ActualLrpState::Claimed;

        assert_eq!(lrp.cell_id(), Some("cell-a"));
    }

    #[test]
    fn record_roundtrips_through_codec() {
        let lrp = ActualLrp::unclaimed(ActualLrpKey::new("p", 2, "d"));
        let bytes = berth_core::codec::encode(&lrp).expect("encode");
        let decoded: ActualLrp = berth_core::codec::decode(&bytes).expect("decode");
        assert_eq!(decoded, lrp);
    }
}
