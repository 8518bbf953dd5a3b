//! tencentcloud_api_gateway_usage_plan

use tcgate_core::poll::{poll_until, retry};
use tcgate_core::provider::ProviderResult;
use tcgate_core::resource::{Resource, ResourceId, State, Value};
use tcgate_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{Attributes, Context, Outputs, fail, gone_is_ok};
use crate::client::ApiError;
use crate::services::apigateway::{BIND_TYPES, UsagePlan, UsagePlanEnvironment, UsagePlanSpec};

pub const TYPE: &str = "tencentcloud_api_gateway_usage_plan";

/// Quota value meaning "no limit"
pub const UNLIMITED: i64 = -1;

pub(crate) fn environment_fields() -> Vec<AttributeSchema> {
    [
        "service_id",
        "service_name",
        "api_id",
        "api_name",
        "path",
        "method",
        "environment",
        "modify_time",
        "create_time",
    ]
    .into_iter()
    .map(|name| AttributeSchema::new(name, AttributeType::String))
    .collect()
}

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(TYPE)
        .with_description("Request quota shared by the services and apis bound to it")
        .attribute(
            AttributeSchema::new("usage_plan_name", types::non_empty_string())
                .required()
                .with_description("Custom usage plan name."),
        )
        .attribute(AttributeSchema::new("usage_plan_desc", AttributeType::String))
        .attribute(
            AttributeSchema::new("max_request_num", AttributeType::Int)
                .with_default(Value::Int(UNLIMITED))
                .with_description("Total number of requests allowed. -1 disables the limit."),
        )
        .attribute(
            AttributeSchema::new("max_request_num_pre_sec", AttributeType::Int)
                .with_default(Value::Int(UNLIMITED))
                .with_description("Requests allowed per second. -1 disables the limit."),
        )
        .attribute(AttributeSchema::new("modify_time", AttributeType::String).computed())
        .attribute(AttributeSchema::new("create_time", AttributeType::String).computed())
        .attribute(AttributeSchema::new("attach_api_keys", types::string_list()).computed())
        .attribute(
            AttributeSchema::new("attach_list", types::block_list(environment_fields())).computed(),
        )
        .importable()
}

fn spec(attrs: &Attributes<'_>) -> ProviderResult<UsagePlanSpec> {
    Ok(UsagePlanSpec {
        usage_plan_name: attrs.required_str("usage_plan_name")?.to_string(),
        usage_plan_desc: attrs.string("usage_plan_desc"),
        max_request_num: attrs.int_or("max_request_num", UNLIMITED),
        max_request_num_pre_sec: attrs.int_or("max_request_num_pre_sec", UNLIMITED),
    })
}

pub(crate) fn environment_value(env: UsagePlanEnvironment) -> Value {
    let fields = Outputs::new()
        .set("service_id", env.service_id)
        .set("service_name", env.service_name)
        .set("api_id", env.api_id)
        .set("api_name", env.api_name)
        .set("path", env.path)
        .set("method", env.method)
        .set("environment", env.environment)
        .set("modify_time", env.modified_time)
        .set("create_time", env.created_time)
        .into_map();
    Value::Map(fields)
}

/// Service and api bindings of a plan, across both bind types
pub(crate) async fn attach_list(
    ctx: &Context,
    usage_plan_id: &str,
) -> Result<Vec<Value>, ApiError> {
    let mut list = Vec::new();
    for bind_type in BIND_TYPES {
        let envs = ctx
            .apigateway
            .describe_usage_plan_environments(usage_plan_id, bind_type)
            .await?;
        list.extend(envs.into_iter().map(environment_value));
    }
    Ok(list)
}

pub(crate) fn outputs(plan: UsagePlan) -> Outputs {
    Outputs::new()
        .set("usage_plan_name", plan.usage_plan_name)
        .set("usage_plan_desc", plan.usage_plan_desc)
        .set("max_request_num", plan.max_request_num)
        .set("max_request_num_pre_sec", plan.max_request_num_pre_sec)
        .set("modify_time", plan.modified_time)
        .set("create_time", plan.created_time)
        .set("attach_api_keys", plan.bind_secret_ids.unwrap_or_default())
}

pub async fn create(ctx: &Context, resource: &Resource) -> ProviderResult<State> {
    let attrs = Attributes::of(resource);
    let spec = spec(&attrs)?;
    let spec = &spec;

    let plan_id = retry("CreateUsagePlan", ctx.write_policy, move || {
        ctx.apigateway.create_usage_plan(spec)
    })
    .await
    .map_err(fail(&resource.id))?;
    let plan_id = plan_id.as_str();

    poll_until(&format!("usage plan {plan_id}"), ctx.read_policy, move || {
        ctx.apigateway.describe_usage_plan(plan_id)
    })
    .await
    .map_err(fail(&resource.id))?;

    read(ctx, &resource.id, plan_id).await
}

pub async fn read(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
    let plan = retry("DescribeUsagePlan", ctx.read_policy, move || {
        ctx.apigateway.describe_usage_plan(identifier)
    })
    .await
    .map_err(fail(id))?;
    let Some(plan) = plan else {
        return Ok(State::not_found(id.clone()));
    };

    let attached = retry("DescribeUsagePlanEnvironments", ctx.read_policy, move || {
        attach_list(ctx, identifier)
    })
    .await
    .map_err(fail(id))?;

    Ok(outputs(plan)
        .set("attach_list", attached)
        .into_state(id, identifier))
}

pub async fn update(
    ctx: &Context,
    id: &ResourceId,
    identifier: &str,
    _from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let spec = spec(&Attributes::of(to))?;
    let spec = &spec;

    retry("ModifyUsagePlan", ctx.write_policy, move || {
        ctx.apigateway.modify_usage_plan(identifier, spec)
    })
    .await
    .map_err(fail(id))?;

    read(ctx, id, identifier).await
}

pub async fn delete(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
    let result = retry("DeleteUsagePlan", ctx.write_policy, move || {
        ctx.apigateway.delete_usage_plan(identifier)
    })
    .await;
    gone_is_ok("DeleteUsagePlan", result).map_err(fail(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, context, not_found, resource, s};
    use serde_json::json;
    use std::sync::Mutex;

    fn plan_backend() -> std::sync::Arc<MockTransport> {
        let plan = Mutex::new(None::<serde_json::Value>);
        MockTransport::new(move |action, payload| {
            let mut plan = plan.lock().unwrap();
            match action {
                "CreateUsagePlan" | "ModifyUsagePlan" => {
                    let mut stored = payload.clone();
                    stored["UsagePlanId"] = json!("usagePlan-1");
                    stored["CreatedTime"] = json!("2020-09-22T00:00:00Z");
                    stored["ModifiedTime"] = json!("2020-09-22T00:00:00Z");
                    stored["BindSecretIds"] = json!(["AKID1"]);
                    *plan = Some(stored.clone());
                    Ok(json!({"Result": stored}))
                }
                "DescribeUsagePlan" => match plan.as_ref() {
                    Some(p) => Ok(json!({"Result": p})),
                    None => Err(not_found("ResourceNotFound.InvalidUsagePlan")),
                },
                "DescribeUsagePlanEnvironments" => {
                    let list = if payload["BindType"] == json!("SERVICE") {
                        json!([{"ServiceId": "service-1", "ServiceName": "svc", "Environment": "release"}])
                    } else {
                        json!([{"ServiceId": "service-1", "ApiId": "api-1", "Environment": "test"}])
                    };
                    Ok(json!({"Result": {"EnvironmentList": list}}))
                }
                "DeleteUsagePlan" => match plan.take() {
                    Some(_) => Ok(json!({"Result": true})),
                    None => Err(not_found("ResourceNotFound.InvalidUsagePlan")),
                },
                other => panic!("unexpected action {other}"),
            }
        })
    }

    #[tokio::test]
    async fn create_applies_unlimited_defaults() {
        let mock = plan_backend();
        let ctx = context(&mock);

        let state = create(&ctx, &resource(TYPE, &[("usage_plan_name", s("my_plan"))]))
            .await
            .unwrap();

        assert_eq!(state.identifier.as_deref(), Some("usagePlan-1"));
        let sent = &mock.payloads("CreateUsagePlan")[0];
        assert_eq!(sent["MaxRequestNum"], json!(-1));
        assert_eq!(sent["MaxRequestNumPreSec"], json!(-1));
        assert!(sent.get("UsagePlanDesc").is_none());
        assert_eq!(state.attributes["max_request_num"], Value::Int(-1));
        assert_eq!(state.attributes["attach_api_keys"], Value::List(vec![s("AKID1")]));
    }

    #[tokio::test]
    async fn attach_list_covers_both_bind_types() {
        let mock = plan_backend();
        let ctx = context(&mock);

        let state = create(&ctx, &resource(TYPE, &[("usage_plan_name", s("my_plan"))]))
            .await
            .unwrap();

        let list = state.attributes["attach_list"].as_list().unwrap();
        assert_eq!(list.len(), 2);
        let envs: Vec<_> = list
            .iter()
            .map(|v| v.as_map().unwrap()["environment"].clone())
            .collect();
        assert_eq!(envs, vec![s("release"), s("test")]);
    }

    #[tokio::test]
    async fn update_then_delete() {
        let mock = plan_backend();
        let ctx = context(&mock);
        let current = create(&ctx, &resource(TYPE, &[("usage_plan_name", s("my_plan"))]))
            .await
            .unwrap();
        let id = current.id.clone();

        let desired = resource(
            TYPE,
            &[
                ("usage_plan_name", s("renamed")),
                ("max_request_num", Value::Int(100)),
            ],
        );
        let state = update(&ctx, &id, "usagePlan-1", &current, &desired).await.unwrap();
        assert_eq!(state.attributes["usage_plan_name"], s("renamed"));
        assert_eq!(mock.payloads("ModifyUsagePlan")[0]["UsagePlanId"], json!("usagePlan-1"));

        delete(&ctx, &id, "usagePlan-1").await.unwrap();
        assert!(!read(&ctx, &id, "usagePlan-1").await.unwrap().exists);
        // already gone
        delete(&ctx, &id, "usagePlan-1").await.unwrap();
    }
}
