//! Core data types shared by the driver, the catalog and the provider.
//!
//! These types bridge the declarative side (JSON attribute maps) and the
//! remote side (API responses carrying an OCID and a lifecycle state).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::lifecycle::LifecycleState;

/// Attribute holding the resource identifier in declarative state.
pub const ID_ATTRIBUTE: &str = "id";

/// Attribute holding the lifecycle state in declarative state.
pub const STATE_ATTRIBUTE: &str = "state";

/// An opaque remote identifier (OCID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Wrap an identifier. Empty identifiers are rejected.
    pub fn new(id: impl Into<String>) -> Result<Self, ProviderError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ProviderError::Validation(
                "resource identifier must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One response from a Create, Get or Update call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResource {
    /// The resource identifier.
    pub id: ResourceId,
    /// The lifecycle state reported by the service.
    pub state: LifecycleState,
    /// All other attributes, keyed by declarative attribute name.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl RemoteResource {
    /// Create a snapshot with no attributes.
    pub fn new(id: ResourceId, state: impl Into<LifecycleState>) -> Self {
        Self {
            id,
            state: state.into(),
            attributes: Map::new(),
        }
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Render the snapshot as a flat declarative object including `id` and `state`.
    pub fn to_value(&self) -> Value {
        let mut map = self.attributes.clone();
        map.insert(ID_ATTRIBUTE.to_string(), Value::String(self.id.to_string()));
        map.insert(
            STATE_ATTRIBUTE.to_string(),
            Value::String(self.state.to_string()),
        );
        Value::Object(map)
    }
}

/// Local view of one managed resource.
///
/// The identifier can be assigned once; any later attempt to assign a
/// different identifier fails.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceDescriptor {
    id: Option<ResourceId>,
    /// Desired or last observed attributes, excluding `id` and `state`.
    pub attributes: Map<String, Value>,
    /// Last observed lifecycle state.
    pub state: Option<LifecycleState>,
}

impl ResourceDescriptor {
    /// A descriptor for a resource that does not exist yet.
    pub fn planned(attributes: Map<String, Value>) -> Self {
        Self {
            id: None,
            attributes,
            state: None,
        }
    }

    /// Parse a descriptor from declarative state.
    ///
    /// `id` and `state` are lifted out of the attribute map.
    pub fn from_value(value: &Value) -> Result<Self, ProviderError> {
        let obj = match value {
            Value::Object(map) => map,
            other => {
                return Err(ProviderError::Validation(format!(
                    "expected an object for resource state, got {}",
                    other
                )))
            },
        };

        let mut attributes = obj.clone();
        let id = match attributes.remove(ID_ATTRIBUTE) {
            Some(Value::String(s)) if !s.is_empty() => Some(ResourceId::new(s)?),
            _ => None,
        };
        let state = match attributes.remove(STATE_ATTRIBUTE) {
            Some(Value::String(s)) if !s.is_empty() => Some(LifecycleState::new(s)),
            _ => None,
        };

        Ok(Self {
            id,
            attributes,
            state,
        })
    }

    /// The identifier, if one has been assigned.
    pub fn id(&self) -> Option<&ResourceId> {
        self.id.as_ref()
    }

    /// The identifier, or a validation error when none has been assigned.
    pub fn require_id(&self) -> Result<&ResourceId, ProviderError> {
        self.id.as_ref().ok_or_else(|| {
            ProviderError::Validation("resource has no identifier in state".to_string())
        })
    }

    /// Assign the identifier. Re-assigning the same value is a no-op.
    pub fn assign_id(&mut self, id: ResourceId) -> Result<(), ProviderError> {
        match &self.id {
            None => {
                self.id = Some(id);
                Ok(())
            },
            Some(existing) if *existing == id => Ok(()),
            Some(existing) => Err(ProviderError::Validation(format!(
                "resource identifier is immutable: {} cannot become {}",
                existing, id
            ))),
        }
    }

    /// Merge a remote snapshot into this descriptor.
    pub fn absorb(&mut self, remote: &RemoteResource) -> Result<(), ProviderError> {
        self.assign_id(remote.id.clone())?;
        for (k, v) in &remote.attributes {
            self.attributes.insert(k.clone(), v.clone());
        }
        self.state = Some(remote.state.clone());
        Ok(())
    }

    /// Render as declarative state.
    pub fn to_value(&self) -> Value {
        let mut map = self.attributes.clone();
        if let Some(id) = &self.id {
            map.insert(ID_ATTRIBUTE.to_string(), Value::String(id.to_string()));
        }
        if let Some(state) = &self.state {
            map.insert(STATE_ATTRIBUTE.to_string(), Value::String(state.to_string()));
        }
        Value::Object(map)
    }
}

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The attribute name.
    pub path: String,
    /// The value before the change (None if creating).
    pub before: Option<Value>,
    /// The value after the change (None if deleting).
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Create a change for a new attribute.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            before: None,
            after: Some(value),
        }
    }

    /// Create a change for a removed attribute.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(value),
            after: None,
        }
    }

    /// Create a change for a modified attribute.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(before),
            after: Some(after),
        }
    }
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation.
    pub planned_state: Value,
    /// The list of attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource must be destroyed and recreated.
    pub requires_replace: bool,
}

impl PlanResult {
    /// A plan result with no changes.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// A plan result with changes.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether the plan changes anything.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// A resource brought under management by import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Names of everything a provider serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names, sorted.
    pub resources: Vec<String>,
    /// Data source type names, sorted.
    pub data_sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(s: &str) -> ResourceId {
        ResourceId::new(s).unwrap()
    }

    #[test]
    fn test_resource_id_rejects_empty() {
        assert!(ResourceId::new("").is_err());
        assert!(ResourceId::new("   ").is_err());
        assert_eq!(id("ocid1.x").as_str(), "ocid1.x");
    }

    #[test]
    fn test_descriptor_id_is_immutable() {
        let mut desc = ResourceDescriptor::default();
        desc.assign_id(id("ocid1.a")).unwrap();
        desc.assign_id(id("ocid1.a")).unwrap();

        let err = desc.assign_id(id("ocid1.b")).unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
        assert_eq!(desc.id().unwrap().as_str(), "ocid1.a");
    }

    #[test]
    fn test_descriptor_round_trips_through_state() {
        let state = json!({"id": "ocid1.a", "state": "available", "name": "snap"});
        let desc = ResourceDescriptor::from_value(&state).unwrap();
        assert_eq!(desc.id().unwrap().as_str(), "ocid1.a");
        assert_eq!(desc.state.as_ref().unwrap().as_str(), "AVAILABLE");
        assert_eq!(desc.attributes.get("name"), Some(&json!("snap")));
        assert!(!desc.attributes.contains_key("id"));

        assert_eq!(
            desc.to_value(),
            json!({"id": "ocid1.a", "state": "AVAILABLE", "name": "snap"})
        );
    }

    #[test]
    fn test_descriptor_from_non_object() {
        assert!(ResourceDescriptor::from_value(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_absorb_remote_snapshot() {
        let mut desc = ResourceDescriptor::planned(
            json!({"name": "snap"}).as_object().cloned().unwrap(),
        );
        let remote = RemoteResource::new(id("ocid1.a"), "PROVISIONING")
            .with_attribute("time_created", json!("2024-01-01T00:00:00Z"));

        desc.absorb(&remote).unwrap();
        assert_eq!(desc.id().unwrap().as_str(), "ocid1.a");
        assert_eq!(desc.state.as_ref().unwrap().as_str(), "PROVISIONING");
        assert_eq!(desc.attributes["name"], "snap");
        assert_eq!(desc.attributes["time_created"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_remote_to_value() {
        let remote = RemoteResource::new(id("ocid1.a"), "AVAILABLE").with_attribute("n", json!(1));
        assert_eq!(
            remote.to_value(),
            json!({"id": "ocid1.a", "state": "AVAILABLE", "n": 1})
        );
    }

    #[test]
    fn test_attribute_change_constructors() {
        let added = AttributeChange::added("name", json!("test"));
        assert!(added.before.is_none());
        assert_eq!(added.after, Some(json!("test")));

        let removed = AttributeChange::removed("name", json!("old"));
        assert_eq!(removed.before, Some(json!("old")));
        assert!(removed.after.is_none());

        let modified = AttributeChange::modified("count", json!(1), json!(2));
        assert_eq!(modified.before, Some(json!(1)));
        assert_eq!(modified.after, Some(json!(2)));
    }

    #[test]
    fn test_plan_result() {
        let no_change = PlanResult::no_change(json!({"id": "123"}));
        assert!(!no_change.has_changes());
        assert!(!no_change.requires_replace);

        let with_changes = PlanResult::with_changes(
            json!({"id": "123", "name": "new"}),
            vec![AttributeChange::modified("name", json!("old"), json!("new"))],
            false,
        );
        assert!(with_changes.has_changes());
    }
}
