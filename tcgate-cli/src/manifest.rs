//! Manifest loading
//!
//! A manifest is a JSON document:
//!
//! ```json
//! {
//!   "provider": { "region": "ap-guangzhou" },
//!   "backend": { "type": "local", "path": "tcgate.state.json" },
//!   "resources": [
//!     { "type": "tencentcloud_api_gateway_service", "name": "svc", "attributes": { ... } }
//!   ],
//!   "data": [
//!     { "type": "tencentcloud_api_gateway_services", "name": "all", "attributes": { ... } }
//!   ]
//! }
//! ```
//!
//! A string of the exact form `${name.attr}` refers to an attribute of another
//! entry (resource or data source) and is resolved at apply time.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use tcgate_core::resource::{Resource, ResourceId, State, Value};
use tcgate_state::BackendConfig;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    #[serde(default)]
    provider: ProviderBlock,
    #[serde(default)]
    backend: Option<BackendBlock>,
    #[serde(default)]
    resources: Vec<EntryBlock>,
    #[serde(default)]
    data: Vec<EntryBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderBlock {
    #[serde(default)]
    region: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BackendBlock {
    #[serde(rename = "type", default)]
    backend_type: String,
    #[serde(flatten)]
    attributes: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct EntryBlock {
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    #[serde(default)]
    attributes: serde_json::Map<String, serde_json::Value>,
}

/// Parsed manifest
#[derive(Debug, Clone)]
pub struct Manifest {
    pub region: Option<String>,
    pub backend: BackendConfig,
    /// Managed resources and data sources, dependencies first
    pub resources: Vec<Resource>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::parse(&content).map_err(|e| format!("{}: {}", path.display(), e))
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        let file: ManifestFile =
            serde_json::from_str(content).map_err(|e| format!("Parse error: {}", e))?;

        let backend = match file.backend {
            Some(block) => BackendConfig {
                backend_type: block.backend_type,
                attributes: convert_map(&block.attributes),
            },
            None => BackendConfig::local(),
        };

        let managed = file.resources.iter().map(|e| (e, false));
        let data = file.data.iter().map(|e| (e, true));
        let mut resources = Vec::new();
        let mut names = HashSet::new();
        for (entry, read_only) in managed.chain(data) {
            if entry.name.is_empty() {
                return Err(format!("{}: name must not be empty", entry.resource_type));
            }
            if !names.insert(entry.name.clone()) {
                return Err(format!("Duplicate name '{}'", entry.name));
            }
            let mut resource =
                Resource::new(&entry.resource_type, &entry.name).with_read_only(read_only);
            resource.attributes = convert_map(&entry.attributes);
            resources.push(resource);
        }

        for resource in &resources {
            for dep in dependencies(resource) {
                if !names.contains(&dep) {
                    return Err(format!(
                        "{}: reference to unknown entry '{}'",
                        resource.id, dep
                    ));
                }
            }
        }

        Ok(Self {
            region: file.provider.region.filter(|r| !r.is_empty()),
            backend,
            resources: sort_by_dependencies(&resources)?,
        })
    }

    pub fn managed(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(|r| !r.is_data_source())
    }

    pub fn data_sources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(|r| r.is_data_source())
    }

    pub fn find(&self, id: &ResourceId) -> Option<&Resource> {
        self.resources.iter().find(|r| &r.id == id)
    }
}

fn convert_map(map: &serde_json::Map<String, serde_json::Value>) -> HashMap<String, Value> {
    map.iter()
        .filter_map(|(k, v)| convert(v).map(|v| (k.clone(), v)))
        .collect()
}

/// JSON to attribute value, turning `${name.attr}` into a reference
fn convert(value: &serde_json::Value) -> Option<Value> {
    match value {
        serde_json::Value::String(s) => {
            Some(parse_reference(s).unwrap_or_else(|| Value::String(s.clone())))
        }
        serde_json::Value::Array(items) => {
            Some(Value::List(items.iter().filter_map(convert).collect()))
        }
        serde_json::Value::Object(map) => Some(Value::Map(convert_map(map))),
        other => Value::from_json(other),
    }
}

fn parse_reference(s: &str) -> Option<Value> {
    let inner = s.strip_prefix("${")?.strip_suffix('}')?;
    let (name, attr) = inner.split_once('.')?;
    if name.is_empty() || attr.is_empty() || attr.contains('.') {
        return None;
    }
    Some(Value::ResourceRef(name.to_string(), attr.to_string()))
}

/// Names of the entries a resource refers to
pub fn dependencies(resource: &Resource) -> HashSet<String> {
    let mut deps = HashSet::new();
    for value in resource.attributes.values() {
        collect_dependencies(value, &mut deps);
    }
    deps
}

fn collect_dependencies(value: &Value, deps: &mut HashSet<String>) {
    match value {
        Value::ResourceRef(name, _) => {
            deps.insert(name.clone());
        }
        Value::List(items) => {
            for item in items {
                collect_dependencies(item, deps);
            }
        }
        Value::Map(map) => {
            for v in map.values() {
                collect_dependencies(v, deps);
            }
        }
        _ => {}
    }
}

/// Topological order, declaration order among independent entries
pub fn sort_by_dependencies(resources: &[Resource]) -> Result<Vec<Resource>, String> {
    let by_name: HashMap<&str, &Resource> = resources
        .iter()
        .map(|r| (r.id.name.as_str(), r))
        .collect();

    fn visit<'a>(
        resource: &'a Resource,
        by_name: &HashMap<&str, &'a Resource>,
        visited: &mut HashSet<&'a str>,
        visiting: &mut Vec<&'a str>,
        sorted: &mut Vec<Resource>,
    ) -> Result<(), String> {
        let name = resource.id.name.as_str();
        if visited.contains(name) {
            return Ok(());
        }
        if visiting.contains(&name) {
            visiting.push(name);
            return Err(format!("Circular reference: {}", visiting.join(" -> ")));
        }
        visiting.push(name);

        let mut deps: Vec<String> = dependencies(resource).into_iter().collect();
        deps.sort();
        for dep in deps {
            if let Some(&dep_resource) = by_name.get(dep.as_str()) {
                visit(dep_resource, by_name, visited, visiting, sorted)?;
            }
        }

        visiting.pop();
        visited.insert(name);
        sorted.push(resource.clone());
        Ok(())
    }

    let mut sorted = Vec::with_capacity(resources.len());
    let mut visited = HashSet::new();
    for resource in resources {
        visit(resource, &by_name, &mut visited, &mut Vec::new(), &mut sorted)?;
    }
    Ok(sorted)
}

/// Attributes each entry exposes to references, keyed by entry name
#[derive(Debug, Default)]
pub struct Bindings {
    by_name: HashMap<String, HashMap<String, Value>>,
}

impl Bindings {
    /// Record the known state of an entry; `id` resolves to its identifier
    pub fn insert(&mut self, resource: &Resource, state: &State) {
        if !state.exists {
            return;
        }
        let mut attrs = resource.attributes.clone();
        for (k, v) in &state.attributes {
            attrs.insert(k.clone(), v.clone());
        }
        if let Some(identifier) = &state.identifier {
            attrs
                .entry("id".to_string())
                .or_insert_with(|| Value::String(identifier.clone()));
        }
        self.by_name.insert(resource.id.name.clone(), attrs);
    }

    pub fn resolve(&self, value: &Value) -> Value {
        match value {
            Value::ResourceRef(name, attr) => self
                .by_name
                .get(name)
                .and_then(|attrs| attrs.get(attr))
                .map(|v| self.resolve(v))
                .unwrap_or_else(|| value.clone()),
            Value::List(items) => Value::List(items.iter().map(|v| self.resolve(v)).collect()),
            Value::Map(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve(v)))
                    .collect(),
            ),
            _ => value.clone(),
        }
    }

    pub fn resolve_resource(&self, resource: &Resource) -> Resource {
        let mut resolved = resource.clone();
        resolved.attributes = resource
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), self.resolve(v)))
            .collect();
        resolved
    }
}

/// References left after resolution
pub fn unresolved(resource: &Resource) -> Vec<String> {
    let mut names: Vec<String> = dependencies(resource).into_iter().collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "provider": {"region": "ap-shanghai"},
        "resources": [
            {
                "type": "tencentcloud_api_gateway_api_key_attachment",
                "name": "attach",
                "attributes": {
                    "api_key_id": "${key.id}",
                    "usage_plan_id": "${plan.id}"
                }
            },
            {
                "type": "tencentcloud_api_gateway_api_key",
                "name": "key",
                "attributes": {"secret_name": "my_api_key", "status": "on"}
            },
            {
                "type": "tencentcloud_api_gateway_usage_plan",
                "name": "plan",
                "attributes": {"usage_plan_name": "plan", "max_request_num": 100}
            }
        ],
        "data": [
            {"type": "tencentcloud_api_gateway_api_keys", "name": "keys",
             "attributes": {"secret_name": "my_api_key"}}
        ]
    }"#;

    fn names(manifest: &Manifest) -> Vec<&str> {
        manifest
            .resources
            .iter()
            .map(|r| r.id.name.as_str())
            .collect()
    }

    #[test]
    fn parses_entries_and_sorts_dependencies_first() {
        let manifest = Manifest::parse(MANIFEST).unwrap();

        assert_eq!(manifest.region.as_deref(), Some("ap-shanghai"));
        assert_eq!(manifest.backend.backend_type, "local");
        assert_eq!(names(&manifest), vec!["key", "plan", "attach", "keys"]);
        assert_eq!(manifest.managed().count(), 3);
        assert_eq!(manifest.data_sources().count(), 1);

        let attach = manifest
            .find(&ResourceId::new(
                "tencentcloud_api_gateway_api_key_attachment",
                "attach",
            ))
            .unwrap();
        assert_eq!(
            attach.attributes["api_key_id"],
            Value::ResourceRef("key".to_string(), "id".to_string())
        );
        let plan = &manifest.resources[1];
        assert_eq!(plan.attributes["max_request_num"], Value::Int(100));
    }

    #[test]
    fn backend_block_is_read() {
        let manifest = Manifest::parse(
            r#"{"backend": {"type": "local", "path": "states/prod.json"}, "resources": []}"#,
        )
        .unwrap();
        assert_eq!(manifest.backend.get_string("path"), Some("states/prod.json"));
        assert!(manifest.region.is_none());
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Manifest::parse(
            r#"{"resources": [
                {"type": "a", "name": "x"},
                {"type": "b", "name": "x"}
            ]}"#,
        )
        .unwrap_err();
        assert!(err.contains("Duplicate name 'x'"));
    }

    #[test]
    fn rejects_unknown_reference() {
        let err = Manifest::parse(
            r#"{"resources": [{"type": "a", "name": "x", "attributes": {"v": "${y.id}"}}]}"#,
        )
        .unwrap_err();
        assert!(err.contains("unknown entry 'y'"));
    }

    #[test]
    fn rejects_cycles() {
        let err = Manifest::parse(
            r#"{"resources": [
                {"type": "a", "name": "x", "attributes": {"v": "${y.id}"}},
                {"type": "a", "name": "y", "attributes": {"v": "${x.id}"}}
            ]}"#,
        )
        .unwrap_err();
        assert!(err.starts_with("Circular reference"));
    }

    #[test]
    fn only_whole_strings_are_references() {
        assert!(parse_reference("${a.b}").is_some());
        assert!(parse_reference("prefix ${a.b}").is_none());
        assert!(parse_reference("${a}").is_none());
        assert!(parse_reference("${a.b.c}").is_none());
    }

    #[test]
    fn bindings_resolve_identifier_and_outputs() {
        let key = Resource::new("tencentcloud_api_gateway_api_key", "key");
        let state = State::existing(
            key.id.clone(),
            HashMap::from([("access_key_secret".to_string(), Value::String("s3".to_string()))]),
        )
        .with_identifier("AKID1");
        let mut bindings = Bindings::default();
        bindings.insert(&key, &state);

        let attach = Resource::new("tencentcloud_api_gateway_api_key_attachment", "attach")
            .with_attribute("api_key_id", Value::ResourceRef("key".into(), "id".into()))
            .with_attribute(
                "usage_plan_id",
                Value::ResourceRef("plan".into(), "id".into()),
            );
        let resolved = bindings.resolve_resource(&attach);

        assert_eq!(resolved.attributes["api_key_id"], Value::String("AKID1".into()));
        assert_eq!(unresolved(&resolved), vec!["plan".to_string()]);
    }

    #[test]
    fn missing_state_is_not_bound() {
        let key = Resource::new("tencentcloud_api_gateway_api_key", "key");
        let mut bindings = Bindings::default();
        bindings.insert(&key, &State::not_found(key.id.clone()));

        let value = Value::ResourceRef("key".into(), "id".into());
        assert_eq!(bindings.resolve(&value), value);
    }
}
