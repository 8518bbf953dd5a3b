//! tencentcloud_api_gateway_service

use std::collections::HashSet;

use tcgate_core::poll::{poll_until, retry};
use tcgate_core::provider::ProviderResult;
use tcgate_core::resource::{Resource, ResourceId, State, Value};
use tcgate_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{Attributes, Context, Outputs, fail, gone_is_ok};
use crate::client::ApiError;
use crate::services::apigateway::{
    ApiStatus, BIND_TYPE_API, BIND_TYPE_SERVICE, ENVIRONMENTS, Service, ServiceSpec,
};

pub const TYPE: &str = "tencentcloud_api_gateway_service";

pub const NET_TYPE_INNER: &str = "INNER";
pub const NET_TYPE_OUTER: &str = "OUTER";
pub const IP_VERSION_IPV4: &str = "IPv4";

const PROTOCOLS: [&str; 3] = ["http", "https", "http&https"];

fn string_fields(names: &[&str]) -> Vec<AttributeSchema> {
    names
        .iter()
        .map(|name| AttributeSchema::new(*name, AttributeType::String))
        .collect()
}

/// Computed attributes shared with the services data source
pub(crate) fn computed_attributes() -> Vec<AttributeSchema> {
    vec![
        AttributeSchema::new("internal_sub_domain", AttributeType::String).computed(),
        AttributeSchema::new("outer_sub_domain", AttributeType::String).computed(),
        AttributeSchema::new("inner_http_port", AttributeType::Int).computed(),
        AttributeSchema::new("inner_https_port", AttributeType::Int).computed(),
        AttributeSchema::new("modify_time", AttributeType::String).computed(),
        AttributeSchema::new("create_time", AttributeType::String).computed(),
        AttributeSchema::new(
            "usage_plan_list",
            types::block_list(string_fields(&[
                "usage_plan_id",
                "usage_plan_name",
                "bind_type",
                "api_id",
            ])),
        )
        .computed(),
        AttributeSchema::new(
            "api_list",
            types::block_list(string_fields(&["api_id", "api_name", "api_desc", "path", "method"])),
        )
        .computed(),
    ]
}

pub fn schema() -> ResourceSchema {
    let schema = ResourceSchema::new(TYPE)
        .with_description("API gateway service grouping apis under one domain")
        .attribute(
            AttributeSchema::new("service_name", types::non_empty_string())
                .required()
                .with_description("Custom service name."),
        )
        .attribute(
            AttributeSchema::new("protocol", types::string_enum(&PROTOCOLS))
                .required()
                .with_description("Service frontend request type, like `http`, `https`, `http&https`."),
        )
        .attribute(AttributeSchema::new("service_desc", AttributeType::String))
        .attribute(AttributeSchema::new("exclusive_set_name", AttributeType::String).force_new())
        .attribute(
            AttributeSchema::new(
                "net_type",
                AttributeType::List(Box::new(types::string_enum(&[NET_TYPE_INNER, NET_TYPE_OUTER]))),
            )
            .required()
            .with_description("Network type list: `INNER` or `OUTER`."),
        )
        .attribute(
            AttributeSchema::new("ip_version", AttributeType::String)
                .with_default(Value::String(IP_VERSION_IPV4.to_string()))
                .force_new(),
        )
        .attribute(AttributeSchema::new("set_server_name", AttributeType::String).force_new())
        .attribute(AttributeSchema::new("appid_type", AttributeType::String).force_new());

    computed_attributes()
        .into_iter()
        .fold(schema, ResourceSchema::attribute)
        .importable()
}

/// Net types, deduplicated in order; at least one of `INNER`/`OUTER`
fn net_types(attrs: &Attributes<'_>) -> ProviderResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut types = Vec::new();
    for net_type in attrs.string_list("net_type") {
        if net_type != NET_TYPE_INNER && net_type != NET_TYPE_OUTER {
            return Err(attrs.error(format!("not support net_type {net_type}")));
        }
        if seen.insert(net_type.clone()) {
            types.push(net_type);
        }
    }
    if types.is_empty() {
        return Err(attrs.error("`net_type` needs at least one of `INNER`, `OUTER`"));
    }
    Ok(types)
}

fn api_value(api: ApiStatus) -> Value {
    Value::Map(
        Outputs::new()
            .set("api_id", api.api_id)
            .set("api_name", api.api_name)
            .set("api_desc", api.api_desc)
            .set("path", api.path)
            .set("method", api.method)
            .into_map(),
    )
}

/// Service-level plans, deduplicated, followed by api-level plans
pub(crate) async fn usage_plan_list(ctx: &Context, service_id: &str) -> Result<Vec<Value>, ApiError> {
    let mut list = Vec::new();

    let mut seen = HashSet::new();
    for plan in ctx.apigateway.describe_service_usage_plans(service_id).await? {
        let plan_id = plan.usage_plan_id.unwrap_or_default();
        if !seen.insert(plan_id.clone()) {
            continue;
        }
        list.push(Value::Map(
            Outputs::new()
                .set("usage_plan_id", plan_id)
                .set("usage_plan_name", plan.usage_plan_name)
                .set("bind_type", BIND_TYPE_SERVICE)
                .set("api_id", "")
                .into_map(),
        ));
    }

    for plan in ctx.apigateway.describe_api_usage_plans(service_id).await? {
        list.push(Value::Map(
            Outputs::new()
                .set("usage_plan_id", plan.usage_plan_id)
                .set("usage_plan_name", plan.usage_plan_name)
                .set("bind_type", BIND_TYPE_API)
                .set("api_id", plan.api_id)
                .into_map(),
        ));
    }

    Ok(list)
}

/// Attributes reported by DescribeService, minus the plan list
pub(crate) fn outputs(service: Service) -> Outputs {
    let apis: Vec<Value> = service
        .api_id_status_set
        .unwrap_or_default()
        .into_iter()
        .map(api_value)
        .collect();

    Outputs::new()
        .set("service_name", service.service_name)
        .set("protocol", service.protocol)
        .set("service_desc", service.service_desc)
        .set("exclusive_set_name", service.exclusive_set_name)
        .set("ip_version", service.ip_version)
        .set("net_type", service.net_types)
        .set("internal_sub_domain", service.internal_sub_domain)
        .set("outer_sub_domain", service.outer_sub_domain)
        .set("inner_http_port", service.inner_http_port)
        .set("inner_https_port", service.inner_https_port)
        .set("modify_time", service.modified_time)
        .set("create_time", service.created_time)
        .set("api_list", apis)
}

pub async fn create(ctx: &Context, resource: &Resource) -> ProviderResult<State> {
    let attrs = Attributes::of(resource);
    let spec = ServiceSpec {
        service_name: attrs.required_str("service_name")?.to_string(),
        protocol: attrs.required_str("protocol")?.to_string(),
        service_desc: attrs.string("service_desc"),
        exclusive_set_name: attrs.string("exclusive_set_name"),
        ip_version: Some(attrs.str_or("ip_version", IP_VERSION_IPV4).to_string()),
        app_id_type: attrs.string("appid_type"),
        set_server_name: attrs.string("set_server_name"),
        net_types: net_types(&attrs)?,
    };
    let spec = &spec;

    let service_id = retry("CreateService", ctx.write_policy, move || {
        ctx.apigateway.create_service(spec)
    })
    .await
    .map_err(fail(&resource.id))?;
    let service_id = service_id.as_str();

    poll_until(&format!("service {service_id}"), ctx.read_policy, move || {
        ctx.apigateway.describe_service(service_id)
    })
    .await
    .map_err(fail(&resource.id))?;

    read(ctx, &resource.id, service_id).await
}

pub async fn read(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
    let service = retry("DescribeService", ctx.read_policy, move || {
        ctx.apigateway.describe_service(identifier)
    })
    .await
    .map_err(fail(id))?;
    let Some(service) = service else {
        return Ok(State::not_found(id.clone()));
    };

    let plans = retry("DescribeServiceUsagePlan", ctx.read_policy, move || {
        usage_plan_list(ctx, identifier)
    })
    .await
    .map_err(fail(id))?;

    Ok(outputs(service)
        .set("usage_plan_list", plans)
        .into_state(id, identifier))
}

pub async fn update(
    ctx: &Context,
    id: &ResourceId,
    identifier: &str,
    _from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let attrs = Attributes::of(to);
    let service_name = attrs.required_str("service_name")?;
    let protocol = attrs.required_str("protocol")?;
    let service_desc = attrs.str_or("service_desc", "");
    let net_types = net_types(&attrs)?;
    let net_types = net_types.as_slice();

    retry("ModifyService", ctx.write_policy, move || {
        ctx.apigateway
            .modify_service(identifier, service_name, protocol, service_desc, net_types)
    })
    .await
    .map_err(fail(id))?;

    read(ctx, id, identifier).await
}

/// Takes the service offline in every environment before deleting it
pub async fn delete(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
    for env in ENVIRONMENTS {
        let result = retry("UnReleaseService", ctx.write_policy, move || {
            ctx.apigateway.unrelease_service(identifier, env)
        })
        .await;
        gone_is_ok("UnReleaseService", result).map_err(fail(id))?;
    }

    let result = retry("DeleteService", ctx.write_policy, move || {
        ctx.apigateway.delete_service(identifier)
    })
    .await;
    gone_is_ok("DeleteService", result).map_err(fail(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, context, not_found, resource, s};
    use serde_json::json;
    use std::sync::Mutex;

    fn service_backend() -> std::sync::Arc<MockTransport> {
        let service = Mutex::new(None::<serde_json::Value>);
        MockTransport::new(move |action, payload| {
            let mut service = service.lock().unwrap();
            match action {
                "CreateService" => {
                    let mut stored = payload.clone();
                    stored["ServiceId"] = json!("service-1");
                    stored["InternalSubDomain"] = json!("service-1.internal");
                    stored["InnerHttpPort"] = json!(8080);
                    stored["ApiIdStatusSet"] = json!([
                        {"ApiId": "api-1", "ApiName": "hello", "Path": "/hello", "Method": "GET"}
                    ]);
                    *service = Some(stored);
                    Ok(json!({"ServiceId": "service-1"}))
                }
                "ModifyService" => {
                    if let Some(stored) = service.as_mut() {
                        stored["ServiceName"] = payload["ServiceName"].clone();
                        stored["NetTypes"] = payload["NetTypes"].clone();
                    }
                    Ok(json!({}))
                }
                "DescribeService" => service
                    .clone()
                    .ok_or_else(|| not_found("ResourceNotFound.InvalidService")),
                "DescribeServiceUsagePlan" => Ok(json!({"Result": {"ServiceUsagePlanList": [
                    {"UsagePlanId": "usagePlan-1", "UsagePlanName": "p1", "Environment": "test"},
                    {"UsagePlanId": "usagePlan-1", "UsagePlanName": "p1", "Environment": "release"}
                ]}})),
                "DescribeApiUsagePlan" => Ok(json!({"Result": {"ApiUsagePlanList": [
                    {"UsagePlanId": "usagePlan-2", "UsagePlanName": "p2", "ApiId": "api-1"}
                ]}})),
                "UnReleaseService" => Ok(json!({"Result": true})),
                "DeleteService" => {
                    *service = None;
                    Ok(json!({"Result": true}))
                }
                other => panic!("unexpected action {other}"),
            }
        })
    }

    fn desired(name: &str, net: &[&str]) -> Resource {
        resource(
            TYPE,
            &[
                ("service_name", s(name)),
                ("protocol", s("http&https")),
                ("net_type", Value::List(net.iter().map(|n| s(n)).collect())),
            ],
        )
    }

    #[tokio::test]
    async fn create_reads_back_computed_fields() {
        let mock = service_backend();
        let ctx = context(&mock);

        let state = create(&ctx, &desired("niceservice", &["INNER", "OUTER", "INNER"]))
            .await
            .unwrap();

        assert_eq!(state.identifier.as_deref(), Some("service-1"));
        let sent = &mock.payloads("CreateService")[0];
        assert_eq!(sent["NetTypes"], json!(["INNER", "OUTER"]));
        assert_eq!(sent["IpVersion"], json!("IPv4"));
        assert_eq!(state.attributes["internal_sub_domain"], s("service-1.internal"));
        assert_eq!(state.attributes["inner_http_port"], Value::Int(8080));
        assert_eq!(state.attributes["api_list"].as_list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn usage_plan_list_dedups_service_plans() {
        let mock = service_backend();
        let ctx = context(&mock);

        let state = create(&ctx, &desired("niceservice", &["OUTER"])).await.unwrap();

        let plans = state.attributes["usage_plan_list"].as_list().unwrap();
        assert_eq!(plans.len(), 2);
        let service_plan = plans[0].as_map().unwrap();
        assert_eq!(service_plan["bind_type"], s("SERVICE"));
        assert_eq!(service_plan["api_id"], s(""));
        let api_plan = plans[1].as_map().unwrap();
        assert_eq!(api_plan["bind_type"], s("API"));
        assert_eq!(api_plan["api_id"], s("api-1"));
    }

    #[tokio::test]
    async fn net_type_is_validated() {
        let mock = MockTransport::new(|_, _| panic!("no call expected"));
        let ctx = context(&mock);

        let err = create(&ctx, &desired("svc", &["PUBLIC"])).await.unwrap_err();
        assert!(err.to_string().ends_with("not support net_type PUBLIC"));
        assert!(create(&ctx, &desired("svc", &[])).await.is_err());
    }

    #[tokio::test]
    async fn update_modifies_service() {
        let mock = service_backend();
        let ctx = context(&mock);
        let current = create(&ctx, &desired("niceservice", &["OUTER"])).await.unwrap();

        let state = update(
            &ctx,
            &current.id,
            "service-1",
            &current,
            &desired("renamed", &["INNER"]),
        )
        .await
        .unwrap();

        assert_eq!(state.attributes["service_name"], s("renamed"));
        assert_eq!(state.attributes["net_type"], Value::List(vec![s("INNER")]));
    }

    #[tokio::test]
    async fn delete_unreleases_every_environment_first() {
        let mock = service_backend();
        let ctx = context(&mock);
        let state = create(&ctx, &desired("niceservice", &["OUTER"])).await.unwrap();
        let before = mock.calls().len();

        delete(&ctx, &state.id, "service-1").await.unwrap();

        let calls = &mock.calls()[before..];
        let sequence: Vec<_> = calls
            .iter()
            .map(|c| {
                let env = c.payload["EnvironmentName"].as_str().unwrap_or("");
                format!("{}{}", c.action, if env.is_empty() { String::new() } else { format!(":{env}") })
            })
            .collect();
        assert_eq!(
            sequence,
            vec![
                "UnReleaseService:test",
                "UnReleaseService:release",
                "UnReleaseService:prepub",
                "DeleteService",
            ]
        );
    }
}
