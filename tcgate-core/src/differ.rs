//! Differ - Compare desired state with current state to generate a Plan
//!
//! Compares the "desired state" declared in the manifest with the "current state"
//! fetched from the Provider, and generates a list of required Effects (Plan).

use std::collections::HashMap;

use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::ResourceSchema;

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// A ForceNew attribute changed -> needs delete and create
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
    /// Resource exists but not in desired state -> needs deletion
    Delete(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State, schema: Option<&ResourceSchema>) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes);

    if changed.is_empty() {
        return Diff::NoChange(desired.id.clone());
    }

    let replace = schema.is_some_and(|s| {
        changed
            .iter()
            .any(|name| s.attributes.get(name).is_some_and(|a| a.force_new))
    });

    if replace {
        Diff::Replace {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state
fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        // Skip internal attributes (starting with _)
        if key.starts_with('_') {
            continue;
        }

        match current.get(key) {
            Some(current_value) if values_equal(desired_value, current_value) => {}
            _ => changed.push(key.clone()),
        }
    }

    changed.sort();
    changed
}

/// Lists compare as sets: the cloud does not preserve ordering for set-like fields.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::List(xs), Value::List(ys)) => {
            if xs.len() != ys.len() {
                return false;
            }
            let mut matched = vec![false; ys.len()];
            xs.iter().all(|x| {
                match ys
                    .iter()
                    .enumerate()
                    .find(|(i, y)| !matched[*i] && values_equal(x, y))
                {
                    Some((i, _)) => {
                        matched[i] = true;
                        true
                    }
                    None => false,
                }
            })
        }
        (Value::Map(xm), Value::Map(ym)) => xm
            .iter()
            .all(|(k, xv)| ym.get(k).is_some_and(|yv| values_equal(xv, yv))),
        _ => a == b,
    }
}

/// Compute Diff for multiple resources and generate a Plan
///
/// Data sources become `Read` effects. Resources tracked in `current_states`
/// but no longer desired are deleted after everything else.
pub fn create_plan(
    desired: &[Resource],
    current_states: &HashMap<ResourceId, State>,
    schemas: &HashMap<String, ResourceSchema>,
) -> Plan {
    let mut plan = Plan::new();

    for resource in desired {
        if resource.is_data_source() {
            plan.add(Effect::Read {
                resource: resource.clone(),
            });
            continue;
        }

        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        let d = diff(
            resource,
            &current,
            schemas.get(&resource.id.resource_type),
        );

        match d {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update { id, from, to, .. } => {
                plan.add(Effect::Update { id, from, to });
            }
            Diff::Replace {
                id,
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Replace {
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::NoChange(_) => {}
            Diff::Delete(id) => {
                if let Some(identifier) = current.identifier.clone() {
                    plan.add(Effect::Delete { id, identifier });
                }
            }
        }
    }

    let mut orphans: Vec<&State> = current_states
        .values()
        .filter(|s| s.exists && !desired.iter().any(|r| r.id == s.id))
        .collect();
    orphans.sort_by(|a, b| a.id.to_string().cmp(&b.id.to_string()));
    for state in orphans {
        if let Some(identifier) = &state.identifier {
            plan.add(Effect::Delete {
                id: state.id.clone(),
                identifier: identifier.clone(),
            });
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeSchema, AttributeType};

    fn key_schema() -> ResourceSchema {
        ResourceSchema::new("api_key")
            .attribute(AttributeSchema::new("secret_name", AttributeType::String).force_new())
            .attribute(AttributeSchema::new("status", AttributeType::String))
    }

    #[test]
    fn diff_create_when_not_exists() {
        let desired = Resource::new("api_key", "test");
        let current = State::not_found(ResourceId::new("api_key", "test"));

        let result = diff(&desired, &current, None);
        assert!(matches!(result, Diff::Create(_)));
    }

    #[test]
    fn diff_no_change_when_same() {
        let desired = Resource::new("api_key", "test")
            .with_attribute("status", Value::String("on".to_string()));

        let mut attrs = HashMap::new();
        attrs.insert("status".to_string(), Value::String("on".to_string()));
        attrs.insert("create_time".to_string(), Value::String("t".to_string()));
        let current = State::existing(ResourceId::new("api_key", "test"), attrs);

        let result = diff(&desired, &current, None);
        assert!(matches!(result, Diff::NoChange(_)));
    }

    #[test]
    fn diff_update_when_different() {
        let desired = Resource::new("api_key", "test")
            .with_attribute("status", Value::String("off".to_string()));

        let mut attrs = HashMap::new();
        attrs.insert("status".to_string(), Value::String("on".to_string()));
        let current = State::existing(ResourceId::new("api_key", "test"), attrs);

        let result = diff(&desired, &current, Some(&key_schema()));
        match result {
            Diff::Update {
                changed_attributes, ..
            } => {
                assert!(changed_attributes.contains(&"status".to_string()));
            }
            _ => panic!("Expected Update"),
        }
    }

    #[test]
    fn diff_replace_when_force_new_changes() {
        let desired = Resource::new("api_key", "test")
            .with_attribute("secret_name", Value::String("new".to_string()));

        let mut attrs = HashMap::new();
        attrs.insert("secret_name".to_string(), Value::String("old".to_string()));
        let current = State::existing(ResourceId::new("api_key", "test"), attrs);

        let result = diff(&desired, &current, Some(&key_schema()));
        assert!(matches!(result, Diff::Replace { .. }));
    }

    #[test]
    fn lists_compare_without_order() {
        let desired = Resource::new("service", "test").with_attribute(
            "net_type",
            Value::List(vec![
                Value::String("INNER".to_string()),
                Value::String("OUTER".to_string()),
            ]),
        );
        let mut attrs = HashMap::new();
        attrs.insert(
            "net_type".to_string(),
            Value::List(vec![
                Value::String("OUTER".to_string()),
                Value::String("INNER".to_string()),
            ]),
        );
        let current = State::existing(ResourceId::new("service", "test"), attrs);

        assert!(matches!(diff(&desired, &current, None), Diff::NoChange(_)));
    }

    #[test]
    fn create_plan_from_resources() {
        let resources = vec![
            Resource::new("api_key", "new-key"),
            Resource::new("api_key", "existing-key")
                .with_attribute("status", Value::String("off".to_string())),
            Resource::new("api_keys", "all").with_read_only(true),
        ];

        let mut current_states = HashMap::new();
        let mut attrs = HashMap::new();
        attrs.insert("status".to_string(), Value::String("on".to_string()));
        current_states.insert(
            ResourceId::new("api_key", "existing-key"),
            State::existing(ResourceId::new("api_key", "existing-key"), attrs),
        );

        let plan = create_plan(&resources, &current_states, &HashMap::new());

        assert_eq!(plan.effects().len(), 3);
        assert!(matches!(plan.effects()[0], Effect::Create(_)));
        assert!(matches!(plan.effects()[1], Effect::Update { .. }));
        assert!(matches!(plan.effects()[2], Effect::Read { .. }));
    }

    #[test]
    fn create_plan_deletes_orphans() {
        let mut current_states = HashMap::new();
        current_states.insert(
            ResourceId::new("api_key", "gone"),
            State::existing(ResourceId::new("api_key", "gone"), HashMap::new())
                .with_identifier("AKID-gone"),
        );

        let plan = create_plan(&[], &current_states, &HashMap::new());

        assert_eq!(
            plan.effects(),
            &[Effect::Delete {
                id: ResourceId::new("api_key", "gone"),
                identifier: "AKID-gone".to_string(),
            }]
        );
    }
}
