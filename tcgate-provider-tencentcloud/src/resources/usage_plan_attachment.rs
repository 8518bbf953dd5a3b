//! tencentcloud_api_gateway_usage_plan_attachment
//!
//! Binds a usage plan to a whole service or to one api of it, in one
//! environment. The identifier is the JSON encoding of [`UsagePlanAttachmentKey`].

use serde::{Deserialize, Serialize};
use tcgate_core::composite_id::{IdError, parse_json_id, to_json_id};
use tcgate_core::poll::retry;
use tcgate_core::provider::ProviderResult;
use tcgate_core::resource::{Resource, ResourceId, State, Value};
use tcgate_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{Attributes, Context, Outputs, fail, gone_is_ok};
use crate::client::ApiError;
use crate::services::apigateway::{BIND_TYPE_API, BIND_TYPE_SERVICE, BIND_TYPES, ENVIRONMENTS};

pub const TYPE: &str = "tencentcloud_api_gateway_usage_plan_attachment";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsagePlanAttachmentKey {
    #[serde(default)]
    pub api_id: String,
    pub bind_type: String,
    pub environment: String,
    pub service_id: String,
    pub usage_plan_id: String,
}

impl UsagePlanAttachmentKey {
    pub fn to_id(&self) -> Result<String, IdError> {
        to_json_id(self)
    }

    pub fn parse_id(id: &str) -> Result<Self, IdError> {
        let key: Self = parse_json_id(id)?;
        let complete = !key.usage_plan_id.is_empty()
            && !key.service_id.is_empty()
            && !key.environment.is_empty()
            && BIND_TYPES.contains(&key.bind_type.as_str())
            && (key.bind_type != BIND_TYPE_API || !key.api_id.is_empty());
        if !complete {
            return Err(IdError::InvalidJson {
                id: id.to_string(),
                message: "incomplete usage plan attachment".to_string(),
            });
        }
        Ok(key)
    }
}

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(TYPE)
        .with_description("Binding of a usage plan to a service or api environment")
        .attribute(
            AttributeSchema::new("usage_plan_id", types::non_empty_string())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("service_id", types::non_empty_string())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("environment", types::string_enum(&ENVIRONMENTS))
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("bind_type", types::string_enum(&BIND_TYPES))
                .with_default(Value::String(BIND_TYPE_SERVICE.to_string()))
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("api_id", AttributeType::String)
                .force_new()
                .with_description("Required when `bind_type` is `API`."),
        )
        .importable()
}

fn key_of(attrs: &Attributes<'_>) -> ProviderResult<UsagePlanAttachmentKey> {
    let bind_type = attrs.str_or("bind_type", BIND_TYPE_SERVICE);
    let api_id = attrs.str("api_id").unwrap_or_default();
    if bind_type == BIND_TYPE_API && api_id.is_empty() {
        return Err(attrs.error("parameter `api_ids` is required when `bind_type` is `API`"));
    }
    Ok(UsagePlanAttachmentKey {
        api_id: api_id.to_string(),
        bind_type: bind_type.to_string(),
        environment: attrs.required_str("environment")?.to_string(),
        service_id: attrs.required_str("service_id")?.to_string(),
        usage_plan_id: attrs.required_str("usage_plan_id")?.to_string(),
    })
}

/// `None` when either end of the binding is gone
async fn ends_exist(ctx: &Context, key: &UsagePlanAttachmentKey) -> Result<Option<()>, ApiError> {
    if ctx.apigateway.describe_usage_plan(&key.usage_plan_id).await?.is_none() {
        log::debug!("usage plan {} not found", key.usage_plan_id);
        return Ok(None);
    }
    if ctx.apigateway.describe_service(&key.service_id).await?.is_none() {
        log::debug!("service {} not found", key.service_id);
        return Ok(None);
    }
    Ok(Some(()))
}

async fn is_bound(ctx: &Context, key: &UsagePlanAttachmentKey) -> Result<bool, ApiError> {
    let bindings = if key.bind_type == BIND_TYPE_API {
        ctx.apigateway.describe_api_usage_plans(&key.service_id).await?
    } else {
        ctx.apigateway.describe_service_usage_plans(&key.service_id).await?
    };
    Ok(bindings.iter().any(|b| {
        b.usage_plan_id.as_deref() == Some(key.usage_plan_id.as_str())
            && b.environment.as_deref() == Some(key.environment.as_str())
            && (key.bind_type != BIND_TYPE_API || b.api_id.as_deref() == Some(key.api_id.as_str()))
    }))
}

pub async fn create(ctx: &Context, resource: &Resource) -> ProviderResult<State> {
    let attrs = Attributes::of(resource);
    let key = key_of(&attrs)?;
    let k = &key;

    let plan = retry("DescribeUsagePlan", ctx.read_policy, move || {
        ctx.apigateway.describe_usage_plan(&k.usage_plan_id)
    })
    .await
    .map_err(fail(&resource.id))?;
    if plan.is_none() {
        return Err(attrs.error(format!("usage plan {} is not exist", key.usage_plan_id)));
    }

    let service = retry("DescribeService", ctx.read_policy, move || {
        ctx.apigateway.describe_service(&k.service_id)
    })
    .await
    .map_err(fail(&resource.id))?;
    if service.is_none() {
        return Err(attrs.error(format!("service {} is not exist", key.service_id)));
    }

    retry("BindEnvironment", ctx.write_policy, move || {
        ctx.apigateway.bind_environment(
            &k.usage_plan_id,
            &k.service_id,
            &k.environment,
            &k.bind_type,
            &k.api_id,
        )
    })
    .await
    .map_err(fail(&resource.id))?;

    read(ctx, &resource.id, &key.to_id()?).await
}

pub async fn read(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
    let key = match UsagePlanAttachmentKey::parse_id(identifier) {
        Ok(key) => key,
        Err(e) => {
            log::warn!("{id}: {e}");
            return Ok(State::not_found(id.clone()));
        }
    };
    let k = &key;

    let ends = retry("DescribeUsagePlan", ctx.read_policy, move || ends_exist(ctx, k))
        .await
        .map_err(fail(id))?;
    if ends.is_none() {
        return Ok(State::not_found(id.clone()));
    }

    let bound = retry("DescribeUsagePlanBindings", ctx.read_policy, move || is_bound(ctx, k))
        .await
        .map_err(fail(id))?;
    if !bound {
        return Ok(State::not_found(id.clone()));
    }

    let api_id = (key.bind_type == BIND_TYPE_API).then_some(key.api_id.as_str());
    Ok(Outputs::new()
        .set("usage_plan_id", key.usage_plan_id.as_str())
        .set("service_id", key.service_id.as_str())
        .set("environment", key.environment.as_str())
        .set("bind_type", key.bind_type.as_str())
        .set("api_id", api_id)
        .into_state(id, identifier))
}

pub async fn delete(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
    let Ok(key) = UsagePlanAttachmentKey::parse_id(identifier) else {
        return Ok(());
    };
    let k = &key;

    let result = retry("UnBindEnvironment", ctx.write_policy, move || {
        ctx.apigateway.unbind_environment(
            &k.usage_plan_id,
            &k.service_id,
            &k.environment,
            &k.bind_type,
            &k.api_id,
        )
    })
    .await;
    gone_is_ok("UnBindEnvironment", result).map_err(fail(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, context, not_found, resource, s};
    use serde_json::json;
    use std::sync::Mutex;

    /// Plan and service exist; bindings are recorded per bind type
    fn binding_backend() -> std::sync::Arc<MockTransport> {
        let bindings = Mutex::new(Vec::<serde_json::Value>::new());
        MockTransport::new(move |action, payload| {
            let mut bindings = bindings.lock().unwrap();
            match action {
                "DescribeUsagePlan" => Ok(json!({"Result": {"UsagePlanId": "usagePlan-1"}})),
                "DescribeService" => Ok(json!({"ServiceId": "service-1"})),
                "BindEnvironment" => {
                    bindings.push(payload.clone());
                    Ok(json!({"Result": true}))
                }
                "UnBindEnvironment" => {
                    bindings.clear();
                    Ok(json!({"Result": true}))
                }
                "DescribeServiceUsagePlan" | "DescribeApiUsagePlan" => {
                    let want = if action == "DescribeApiUsagePlan" { "API" } else { "SERVICE" };
                    let list: Vec<_> = bindings
                        .iter()
                        .filter(|b| b["BindType"] == json!(want))
                        .map(|b| {
                            json!({
                                "UsagePlanId": b["UsagePlanIds"][0],
                                "Environment": b["Environment"],
                                "ApiId": b["ApiIds"].get(0).cloned().unwrap_or(json!("")),
                            })
                        })
                        .collect();
                    let field = if want == "API" { "ApiUsagePlanList" } else { "ServiceUsagePlanList" };
                    Ok(json!({"Result": {field: list}}))
                }
                other => panic!("unexpected action {other}"),
            }
        })
    }

    #[tokio::test]
    async fn service_binding_round_trip() {
        let mock = binding_backend();
        let ctx = context(&mock);
        let desired = resource(
            TYPE,
            &[
                ("usage_plan_id", s("usagePlan-1")),
                ("service_id", s("service-1")),
                ("environment", s("release")),
            ],
        );

        let state = create(&ctx, &desired).await.unwrap();
        let identifier = state.identifier.clone().unwrap();
        assert_eq!(
            identifier,
            r#"{"api_id":"","bind_type":"SERVICE","environment":"release","service_id":"service-1","usage_plan_id":"usagePlan-1"}"#
        );
        assert_eq!(state.attributes["bind_type"], s("SERVICE"));
        assert!(!state.attributes.contains_key("api_id"));
        assert!(mock.payloads("BindEnvironment")[0].get("ApiIds").is_none());

        delete(&ctx, &state.id, &identifier).await.unwrap();
        assert!(!read(&ctx, &state.id, &identifier).await.unwrap().exists);
    }

    #[tokio::test]
    async fn api_binding_matches_api_id() {
        let mock = binding_backend();
        let ctx = context(&mock);
        let desired = resource(
            TYPE,
            &[
                ("usage_plan_id", s("usagePlan-1")),
                ("service_id", s("service-1")),
                ("environment", s("test")),
                ("bind_type", s("API")),
                ("api_id", s("api-1")),
            ],
        );

        let state = create(&ctx, &desired).await.unwrap();
        assert!(state.exists);
        assert_eq!(state.attributes["api_id"], s("api-1"));

        let other = UsagePlanAttachmentKey {
            api_id: "api-2".to_string(),
            bind_type: "API".to_string(),
            environment: "test".to_string(),
            service_id: "service-1".to_string(),
            usage_plan_id: "usagePlan-1".to_string(),
        };
        assert!(!read(&ctx, &state.id, &other.to_id().unwrap()).await.unwrap().exists);
    }

    #[tokio::test]
    async fn api_bind_type_needs_api_id() {
        let mock = MockTransport::new(|_, _| panic!("no call expected"));
        let ctx = context(&mock);
        let desired = resource(
            TYPE,
            &[
                ("usage_plan_id", s("usagePlan-1")),
                ("service_id", s("service-1")),
                ("environment", s("test")),
                ("bind_type", s("API")),
            ],
        );

        let err = create(&ctx, &desired).await.unwrap_err();
        assert!(err
            .to_string()
            .ends_with("parameter `api_ids` is required when `bind_type` is `API`"));
    }

    #[tokio::test]
    async fn vanished_service_clears_state() {
        let mock = MockTransport::new(|action, _| match action {
            "DescribeUsagePlan" => Ok(json!({"Result": {"UsagePlanId": "usagePlan-1"}})),
            _ => Err(not_found("ResourceNotFound.InvalidService")),
        });
        let ctx = context(&mock);
        let key = UsagePlanAttachmentKey {
            api_id: String::new(),
            bind_type: "SERVICE".to_string(),
            environment: "release".to_string(),
            service_id: "service-1".to_string(),
            usage_plan_id: "usagePlan-1".to_string(),
        };

        let state = read(&ctx, &ResourceId::new(TYPE, "test"), &key.to_id().unwrap()).await.unwrap();
        assert!(!state.exists);
    }
}
