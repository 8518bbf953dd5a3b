//! Read-only lookups
//!
//! Each data source takes optional filters, returns its matches as a list
//! attribute and, when `result_output_file` is set, also writes that list to
//! disk as pretty JSON.

pub mod api_keys;
pub mod audits;
pub mod customer_domains;
pub mod ip_strategies;
pub mod services;
pub mod throttling_apis;
pub mod throttling_services;
pub mod usage_plan_environments;
pub mod usage_plans;

use sha2::{Digest, Sha256};
use tcgate_core::poll::retry;
use tcgate_core::provider::{ProviderError, ProviderResult};
use tcgate_core::resource::{Resource, State, Value};
use tcgate_core::schema::{AttributeSchema, AttributeType};

use crate::resources::{Context, fail};

pub(crate) fn result_output_file() -> AttributeSchema {
    AttributeSchema::new("result_output_file", AttributeType::String)
        .with_description("Used to save results.")
}

/// Write `items` as pretty JSON; no-op without a path
pub async fn write_result_file(path: Option<&str>, items: &[Value]) -> ProviderResult<()> {
    let Some(path) = path.filter(|p| !p.is_empty()) else {
        return Ok(());
    };
    let json = serde_json::Value::Array(items.iter().map(Value::to_json).collect());
    let body = serde_json::to_string_pretty(&json).map_err(ProviderError::from_error)?;
    tokio::fs::write(path, body)
        .await
        .map_err(|e| ProviderError::new(format!("write {path}: {e}")).with_cause(e))?;
    log::debug!("wrote {} item(s) to {path}", items.len());
    Ok(())
}

/// Stable identifier for a result set
pub(crate) fn ids_hash(ids: &[String]) -> String {
    let digest = Sha256::digest(ids.join("-").as_bytes());
    hex::encode(&digest[..8])
}

/// Attach the result list to the inputs and honour `result_output_file`
pub(crate) async fn finish(
    resource: &Resource,
    field: &str,
    items: Vec<Value>,
    ids: &[String],
) -> ProviderResult<State> {
    let path = resource
        .attributes
        .get("result_output_file")
        .and_then(Value::as_str);
    write_result_file(path, &items)
        .await
        .map_err(|e| e.for_resource(resource.id.clone()))?;

    let mut attributes = resource.attributes.clone();
    attributes.insert(field.to_string(), Value::List(items));
    Ok(State::existing(resource.id.clone(), attributes).with_identifier(ids_hash(ids)))
}

/// Service ids to scan: the given one, or every service of the account
pub(crate) async fn service_ids(
    ctx: &Context,
    resource: &Resource,
    service_id: Option<&str>,
) -> ProviderResult<Vec<String>> {
    if let Some(service_id) = service_id.filter(|s| !s.is_empty()) {
        return Ok(vec![service_id.to_string()]);
    }
    let services = retry("DescribeServicesStatus", ctx.read_policy, move || {
        ctx.apigateway.describe_services_status("", "")
    })
    .await
    .map_err(fail(&resource.id))?;
    Ok(services.into_iter().filter_map(|s| s.service_id).collect())
}
