//! Attribute diffing against a declarative plan.
//!
//! Planning merges the user's proposed configuration into the prior state
//! according to the schema: configured values win, provider-computed values
//! are carried over, and changes to force-new attributes mark the plan as a
//! replacement.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::schema::Schema;
use crate::types::{AttributeChange, PlanResult, ID_ATTRIBUTE, STATE_ATTRIBUTE};

/// Compute the plan for one resource instance.
///
/// - `proposed` null: destroy plan
/// - `prior` none: create plan
/// - otherwise: in-place update or replacement
pub fn plan(schema: &Schema, prior: Option<&Value>, proposed: &Value) -> Result<PlanResult, ProviderError> {
    if proposed.is_null() {
        let changes = match prior {
            Some(Value::Object(prior)) => sorted_keys(prior)
                .into_iter()
                .map(|k| AttributeChange::removed(k.clone(), prior[&k].clone()))
                .collect(),
            _ => Vec::new(),
        };
        return Ok(PlanResult::with_changes(Value::Null, changes, false));
    }

    let proposed = as_object(proposed, "proposed state")?;

    let prior = match prior {
        None | Some(Value::Null) => return Ok(plan_create(schema, proposed)),
        Some(prior) => as_object(prior, "prior state")?,
    };

    let planned = merge(schema, prior, proposed);
    let changes = diff_attributes(schema, prior, &planned);
    let requires_replace = changes.iter().any(|c| schema.is_force_new(&c.path));

    if changes.is_empty() {
        Ok(PlanResult::no_change(Value::Object(planned)))
    } else {
        Ok(PlanResult::with_changes(
            Value::Object(planned),
            changes,
            requires_replace,
        ))
    }
}

fn plan_create(schema: &Schema, proposed: &Map<String, Value>) -> PlanResult {
    let planned: Map<String, Value> = proposed
        .iter()
        .filter(|(k, v)| !v.is_null() && !is_computed_only(schema, k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let changes = sorted_keys(&planned)
        .into_iter()
        .map(|k| AttributeChange::added(k.clone(), planned[&k].clone()))
        .collect();

    PlanResult::with_changes(Value::Object(planned), changes, false)
}

/// Merge proposed configuration into prior state.
pub fn merge(schema: &Schema, prior: &Map<String, Value>, proposed: &Map<String, Value>) -> Map<String, Value> {
    let mut planned = prior.clone();

    for (name, attr) in &schema.block.attributes {
        if attr.flags.is_computed_only() {
            continue;
        }
        match proposed.get(name) {
            Some(v) if !v.is_null() => {
                planned.insert(name.clone(), v.clone());
            },
            _ if attr.flags.computed => {},
            _ => {
                planned.remove(name);
            },
        }
    }

    for name in schema.block.blocks.keys() {
        match proposed.get(name) {
            Some(v) if !v.is_null() => {
                planned.insert(name.clone(), v.clone());
            },
            _ => {
                planned.remove(name);
            },
        }
    }

    planned
}

/// Attribute-level differences between two states.
///
/// Only attributes the user can configure are compared; `id`, `state` and
/// computed-only attributes never produce a change.
pub fn diff_attributes(
    schema: &Schema,
    before: &Map<String, Value>,
    after: &Map<String, Value>,
) -> Vec<AttributeChange> {
    let names: BTreeSet<&String> = before.keys().chain(after.keys()).collect();

    names
        .into_iter()
        .filter(|name| name.as_str() != ID_ATTRIBUTE && name.as_str() != STATE_ATTRIBUTE)
        .filter(|name| !is_computed_only(schema, name))
        .filter_map(|name| {
            let b = before.get(name.as_str()).filter(|v| !v.is_null());
            let a = after.get(name.as_str()).filter(|v| !v.is_null());
            match (b, a) {
                (Some(b), Some(a)) if b != a => {
                    Some(AttributeChange::modified(name.clone(), b.clone(), a.clone()))
                },
                (None, Some(a)) => Some(AttributeChange::added(name.clone(), a.clone())),
                (Some(b), None) => Some(AttributeChange::removed(name.clone(), b.clone())),
                _ => None,
            }
        })
        .collect()
}

/// The changed attributes as a map, suitable for an Update call.
///
/// Removed attributes are sent as explicit nulls.
pub fn changed_values(changes: &[AttributeChange]) -> Map<String, Value> {
    changes
        .iter()
        .map(|c| (c.path.clone(), c.after.clone().unwrap_or(Value::Null)))
        .collect()
}

fn is_computed_only(schema: &Schema, name: &str) -> bool {
    schema
        .attribute(name)
        .map(|a| a.flags.is_computed_only())
        .unwrap_or(false)
}

fn sorted_keys(map: &Map<String, Value>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>, ProviderError> {
    value
        .as_object()
        .ok_or_else(|| ProviderError::Validation(format!("{} must be an object", what)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::v0()
            .with_attribute("file_system_id", Attribute::required_string().with_force_new())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("freeform_tags", Attribute::tags())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("time_created", Attribute::computed_string())
            .with_lifecycle()
    }

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_create_plan() {
        let result = plan(
            &schema(),
            None,
            &json!({"file_system_id": "fs", "name": "snap", "description": null}),
        )
        .unwrap();
        assert_eq!(result.planned_state, json!({"file_system_id": "fs", "name": "snap"}));
        let paths: Vec<_> = result.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, ["file_system_id", "name"]);
        assert!(!result.requires_replace);
    }

    #[test]
    fn test_no_change_keeps_computed_values() {
        let prior = json!({
            "id": "ocid1.snap", "state": "AVAILABLE", "file_system_id": "fs",
            "name": "snap", "freeform_tags": {"a": "b"}, "time_created": "t0"
        });
        let result = plan(&schema(), Some(&prior), &json!({"file_system_id": "fs", "name": "snap"})).unwrap();
        assert!(!result.has_changes());
        assert_eq!(result.planned_state, prior);
    }

    #[test]
    fn test_in_place_update() {
        let prior = json!({"id": "ocid1.snap", "file_system_id": "fs", "name": "snap", "freeform_tags": {"Department": "Finance"}});
        let proposed = json!({"file_system_id": "fs", "name": "snap", "freeform_tags": {"Department": "Accounting"}});
        let result = plan(&schema(), Some(&prior), &proposed).unwrap();
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].path, "freeform_tags");
        assert!(!result.requires_replace);
        assert_eq!(result.planned_state["id"], "ocid1.snap");
    }

    #[test]
    fn test_force_new_requires_replace() {
        let prior = json!({"id": "ocid1.snap", "file_system_id": "fs1", "name": "snap"});
        let proposed = json!({"file_system_id": "fs2", "name": "snap"});
        let result = plan(&schema(), Some(&prior), &proposed).unwrap();
        assert!(result.requires_replace);
    }

    #[test]
    fn test_optional_attribute_removed() {
        let prior = json!({"id": "x", "file_system_id": "fs", "name": "snap", "description": "d"});
        let result = plan(&schema(), Some(&prior), &json!({"file_system_id": "fs", "name": "snap"})).unwrap();
        assert_eq!(result.changes, vec![AttributeChange::removed("description", json!("d"))]);
        assert!(result.planned_state.get("description").is_none());
    }

    #[test]
    fn test_destroy_plan() {
        let prior = json!({"name": "snap", "file_system_id": "fs"});
        let result = plan(&schema(), Some(&prior), &Value::Null).unwrap();
        assert!(result.planned_state.is_null());
        assert_eq!(result.changes.len(), 2);
    }

    #[test]
    fn test_diff_ignores_id_state_and_computed() {
        let before = obj(json!({"id": "a", "state": "AVAILABLE", "time_created": "t0", "name": "x"}));
        let after = obj(json!({"id": "b", "state": "UPDATING", "time_created": "t1", "name": "x"}));
        assert!(diff_attributes(&schema(), &before, &after).is_empty());
    }

    #[test]
    fn test_changed_values() {
        let changes = vec![
            AttributeChange::modified("name", json!("a"), json!("b")),
            AttributeChange::removed("description", json!("d")),
        ];
        assert_eq!(
            Value::Object(changed_values(&changes)),
            json!({"name": "b", "description": null})
        );
    }

    #[test]
    fn test_non_object_state_rejected() {
        assert!(plan(&schema(), None, &json!("x")).is_err());
        assert!(plan(&schema(), Some(&json!(3)), &json!({})).is_err());
    }
}
