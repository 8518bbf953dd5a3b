//! Terminal rendering of plans and states

use std::collections::HashMap;

use colored::Colorize;

use tcgate_core::effect::Effect;
use tcgate_core::plan::Plan;
use tcgate_core::resource::Value;

/// Attributes never shown in full
const SENSITIVE: &[&str] = &["access_key_secret"];

pub fn print_plan(plan: &Plan) {
    if plan.is_empty() {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();

    for effect in plan.effects() {
        let symbol = match effect {
            Effect::Create(_) => "+".green().bold(),
            Effect::Update { .. } => "~".yellow().bold(),
            Effect::Replace { .. } => "-/+".magenta().bold(),
            Effect::Delete { .. } => "-".red().bold(),
            Effect::Read { .. } => "<=".normal(),
        };
        let id = effect.resource_id();
        println!(
            "  {} {}.{}",
            symbol,
            id.resource_type.cyan().bold(),
            id.name
        );

        match effect {
            Effect::Create(r) | Effect::Read { resource: r } => {
                for (key, value) in sorted(&r.attributes) {
                    println!("      {}: {}", key, format_attribute(key, value).green());
                }
            }
            Effect::Update { from, to, .. } => {
                for (key, value) in sorted(&to.attributes) {
                    let old = from.attributes.get(key.as_str());
                    if old == Some(value) {
                        continue;
                    }
                    let old = old
                        .map(|v| format_attribute(key, v))
                        .unwrap_or_else(|| "(none)".to_string());
                    println!(
                        "      {}: {} → {}",
                        key,
                        old.red(),
                        format_attribute(key, value).green()
                    );
                }
            }
            Effect::Replace {
                from,
                to,
                changed_attributes,
                ..
            } => {
                for key in changed_attributes {
                    let old = from
                        .attributes
                        .get(key)
                        .map(|v| format_attribute(key, v))
                        .unwrap_or_else(|| "(none)".to_string());
                    let new = to
                        .attributes
                        .get(key)
                        .map(|v| format_attribute(key, v))
                        .unwrap_or_else(|| "(none)".to_string());
                    println!(
                        "      {}: {} → {} {}",
                        key,
                        old.red(),
                        new.green(),
                        "(forces replacement)".magenta()
                    );
                }
            }
            Effect::Delete { identifier, .. } => {
                println!("      {}", identifier.dimmed());
            }
        }
    }

    println!();
    let summary = plan.summary();
    println!(
        "Plan: {} to add, {} to change, {} to replace, {} to destroy.",
        summary.create.to_string().green(),
        summary.update.to_string().yellow(),
        summary.replace.to_string().magenta(),
        summary.delete.to_string().red()
    );
}

fn sorted(attributes: &HashMap<String, Value>) -> Vec<(&String, &Value)> {
    let mut entries: Vec<_> = attributes.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

pub fn format_effect(effect: &Effect) -> String {
    let id = effect.resource_id();
    let verb = match effect {
        Effect::Read { .. } => "Read",
        Effect::Create(_) => "Create",
        Effect::Update { .. } => "Update",
        Effect::Replace { .. } => "Replace",
        Effect::Delete { .. } => "Delete",
    };
    format!("{} {}.{}", verb, id.resource_type, id.name)
}

pub fn format_attribute(key: &str, value: &Value) -> String {
    if SENSITIVE.contains(&key) {
        return "(sensitive)".to_string();
    }
    format_value(value)
}

pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(map) => {
            let strs: Vec<_> = sorted(map)
                .into_iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            format!("{{{}}}", strs.join(", "))
        }
        Value::ResourceRef(name, attr) => format!("${{{}.{}}}", name, attr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tcgate_core::resource::{Resource, ResourceId};

    #[test]
    fn formats_nested_values() {
        let value = Value::Map(HashMap::from([
            ("b".to_string(), Value::List(vec![Value::Int(1), Value::Bool(true)])),
            ("a".to_string(), Value::String("x".to_string())),
        ]));
        assert_eq!(format_value(&value), r#"{a: "x", b: [1, true]}"#);
    }

    #[test]
    fn references_render_as_written() {
        let value = Value::ResourceRef("svc".to_string(), "id".to_string());
        assert_eq!(format_value(&value), "${svc.id}");
    }

    #[test]
    fn secrets_are_masked() {
        let value = Value::String("abc".to_string());
        assert_eq!(format_attribute("access_key_secret", &value), "(sensitive)");
        assert_eq!(format_attribute("secret_name", &value), "\"abc\"");
    }

    #[test]
    fn effect_labels() {
        let create = Effect::Create(Resource::new("tencentcloud_api_gateway_api_key", "key"));
        assert_eq!(
            format_effect(&create),
            "Create tencentcloud_api_gateway_api_key.key"
        );
        let delete = Effect::Delete {
            id: ResourceId::new("tencentcloud_api_gateway_service", "svc"),
            identifier: "service-1".to_string(),
        };
        assert_eq!(
            format_effect(&delete),
            "Delete tencentcloud_api_gateway_service.svc"
        );
    }
}
