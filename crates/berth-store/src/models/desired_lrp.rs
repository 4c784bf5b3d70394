//! Desired-LRP records: the declared spec of a long-running process.

use berth_core::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{validation_result, EnvironmentVariable, ModificationTag};

/// How a long-running process should run, opaque to the state store.
///
/// Validated for well-formedness but never interpreted; cells own the
/// meaning of `action` and `ports`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LrpDefinition {
    /// Root filesystem the instance containers start from.
    pub root_fs: String,
    /// Memory limit per instance in megabytes.
    pub memory_mb: i32,
    /// Disk limit per instance in megabytes.
    pub disk_mb: i32,
    /// The action each instance executes, interpreted by the cell.
    pub action: serde_json::Value,
    /// Ports each instance exposes.
    #[serde(default)]
    pub ports: Vec<u32>,
    /// Environment passed to the action.
    #[serde(default)]
    pub environment: Vec<EnvironmentVariable>,
}

impl LrpDefinition {
    /// Validates the definition.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` naming every invalid field.
    pub fn validate(&self) -> Result<()> {
        let mut invalid = Vec::new();

        if self.root_fs.is_empty() {
            invalid.push("root_fs");
        }
        if self.memory_mb < 0 {
            invalid.push("memory_mb");
        }
        if self.disk_mb < 0 {
            invalid.push("disk_mb");
        }
        if self.action.is_null() {
            invalid.push("action");
        }

        validation_result(invalid)
    }
}

/// The declared spec for a long-running process, including replica count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredLrp {
    /// Unique, immutable process identifier.
    pub process_guid: String,
    /// The domain the process belongs to.
    pub domain: String,
    /// Declared replica count; never negative.
    pub instances: i32,
    /// What each instance runs.
    pub definition: LrpDefinition,
    /// Free-form operator note, updatable.
    #[serde(default)]
    pub annotation: String,
    /// Routing data, opaque to the store, updatable.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub routes: Option<serde_json::Value>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// Update identity: fresh epoch on create, index bumped per update.
    pub modification_tag: ModificationTag,
}

impl DesiredLrp {
    /// Creates a new desired-LRP record with a fresh modification tag.
    #[must_use]
    pub fn new(
        process_guid: impl Into<String>,
        domain: impl Into<String>,
        instances: i32,
        definition: LrpDefinition,
    ) -> Self {
        Self {
            process_guid: process_guid.into(),
            domain: domain.into(),
            instances,
            definition,
            annotation: String::new(),
            routes: None,
            created_at: Utc::now(),
            modification_tag: ModificationTag::fresh(),
        }
    }

    /// Validates the record for creation.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` naming every invalid field.
    pub fn validate(&self) -> Result<()> {
        let mut invalid = Vec::new();

        if self.process_guid.is_empty() {
            invalid.push("process_guid");
        }
        if self.domain.is_empty() {
            invalid.push("domain");
        }
        if self.instances < 0 {
            invalid.push("instances");
        }
        if let Err(e) = self.definition.validate() {
            tracing::debug!(error = %e, "invalid lrp definition");
            invalid.push("definition");
        }

        validation_result(invalid)
    }

    /// Applies an update in place.
    ///
    /// Only the fields present in `update` change; the modification tag is
    /// the caller's responsibility (the store bumps it when the write
    /// commits).
    pub fn apply_update(&mut self, update: &DesiredLrpUpdate) {
        if let Some(instances) = update.instances {
            self.instances = instances;
        }
        if let Some(annotation) = &update.annotation {
            self.annotation.clone_from(annotation);
        }
        if let Some(routes) = &update.routes {
            self.routes = Some(routes.clone());
        }
    }
}

/// A partial update to a desired-LRP record.
///
/// Unset fields leave the record untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredLrpUpdate {
    /// New replica count.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub instances: Option<i32>,
    /// New annotation.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub annotation: Option<String>,
    /// New routing data.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub routes: Option<serde_json::Value>,
}

impl DesiredLrpUpdate {
    /// Validates the update.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` when the new replica count is negative.
    pub fn validate(&self) -> Result<()> {
        let mut invalid = Vec::new();

        if self.instances.is_some_and(|i| i < 0) {
            invalid.push("instances");
        }

        validation_result(invalid)
    }
}

/// Restricts a desired-LRP listing.
///
/// An unset or empty domain places no restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredLrpFilter {
    /// Only processes in this domain.
    pub domain: Option<String>,
}

impl DesiredLrpFilter {
    /// Returns true when the record passes the filter.
    #[must_use]
    pub fn matches(&self, lrp: &DesiredLrp) -> bool {
        self.domain
            .as_deref()
            .is_none_or(|d| d.is_empty() || lrp.domain == d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_definition() -> LrpDefinition {
        LrpDefinition {
            root_fs: "preloaded:trusty".into(),
            memory_mb: 128,
            disk_mb: 512,
            action: serde_json::json!({"run": {"path": "/bin/server"}}),
            ports: vec![8080],
            environment: Vec::new(),
        }
    }

    #[test]
    fn new_record_has_fresh_tag() {
        let lrp = DesiredLrp::new("p", "d", 2, valid_definition());
        assert_eq!(lrp.instances, 2);
        assert_eq!(lrp.modification_tag.index, 0);
        assert!(!lrp.modification_tag.epoch.is_empty());
    }

    #[test]
    fn validate_rejects_negative_instances() {
        let lrp = DesiredLrp::new("p", "d", -1, valid_definition());
        let msg = lrp.validate().expect_err("should fail").to_string();
        assert!(msg.contains("instances"));
    }

    #[test]
    fn validate_rejects_empty_identifiers() {
        let lrp = DesiredLrp::new("", "", 1, valid_definition());
        let msg = lrp.validate().expect_err("should fail").to_string();
        assert!(msg.contains("process_guid"));
        assert!(msg.contains("domain"));
    }

    #[test]
    fn apply_update_changes_only_present_fields() {
        let mut lrp = DesiredLrp::new("p", "d", 2, valid_definition());
        lrp.annotation = "before".into();

        lrp.apply_update(&DesiredLrpUpdate {
            instances: Some(5),
            annotation: None,
            routes: Some(serde_json::json!({"http": ["example.com"]})),
        });

        assert_eq!(lrp.instances, 5);
        assert_eq!(lrp.annotation, "before");
        assert!(lrp.routes.is_some());
    }

    #[test]
    fn update_validate_rejects_negative_instances() {
        let update = DesiredLrpUpdate {
            instances: Some(-3),
            ..DesiredLrpUpdate::default()
        };
        assert!(update.validate().is_err());
        assert!(DesiredLrpUpdate::default().validate().is_ok());
    }

    #[test]
    fn filter_empty_domain_matches_everything() {
        let lrp = DesiredLrp::new("p", "domain-a", 1, valid_definition());

        assert!(DesiredLrpFilter::default().matches(&lrp));
        assert!(DesiredLrpFilter {
            domain: Some(String::new()),
        }
        .matches(&lrp));
        assert!(DesiredLrpFilter {
            domain: Some("domain-a".into()),
        }
        .matches(&lrp));
        assert!(!DesiredLrpFilter {
            domain: Some("domain-b".into()),
        }
        .matches(&lrp));
    }

    #[test]
    fn record_roundtrips_through_codec() {
        let lrp = DesiredLrp::new("p", "d", 3, valid_definition());
        let bytes = berth_core::codec::encode(&lrp).expect("encode");
        let decoded: DesiredLrp = berth_core::codec::decode(&bytes).expect("decode");
        assert_eq!(decoded, lrp);
    }
}
