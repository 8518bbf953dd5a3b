//! tencentcloud_api_gateway_api_key_attachment
//!
//! Identifier: `{"api_key_id": "...", "usage_plan_id": "..."}`.

use serde::{Deserialize, Serialize};
use tcgate_core::composite_id::{IdError, parse_json_id, to_json_id};
use tcgate_core::poll::{poll_until, retry};
use tcgate_core::provider::ProviderResult;
use tcgate_core::resource::{Resource, ResourceId, State};
use tcgate_core::schema::{AttributeSchema, ResourceSchema, types};

use super::{Attributes, Context, Outputs, fail, gone_is_ok};
use crate::client::ApiError;

pub const TYPE: &str = "tencentcloud_api_gateway_api_key_attachment";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyAttachmentKey {
    pub api_key_id: String,
    pub usage_plan_id: String,
}

impl ApiKeyAttachmentKey {
    pub fn to_id(&self) -> Result<String, IdError> {
        to_json_id(self)
    }

    pub fn parse_id(id: &str) -> Result<Self, IdError> {
        let key: Self = parse_json_id(id)?;
        if key.api_key_id.is_empty() || key.usage_plan_id.is_empty() {
            return Err(IdError::InvalidJson {
                id: id.to_string(),
                message: "api_key_id and usage_plan_id must not be empty".to_string(),
            });
        }
        Ok(key)
    }
}

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(TYPE)
        .with_description("Binding of an api key to a usage plan")
        .attribute(
            AttributeSchema::new("api_key_id", types::non_empty_string())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("usage_plan_id", types::non_empty_string())
                .required()
                .force_new(),
        )
        .importable()
}

/// `Some(bound)` while the plan exists
async fn is_bound(ctx: &Context, key: &ApiKeyAttachmentKey) -> Result<Option<bool>, ApiError> {
    let keys = ctx
        .apigateway
        .describe_usage_plan_secret_ids(&key.usage_plan_id)
        .await?;
    Ok(keys.map(|keys| {
        keys.iter()
            .any(|k| k.access_key_id.as_deref() == Some(key.api_key_id.as_str()))
    }))
}

pub async fn create(ctx: &Context, resource: &Resource) -> ProviderResult<State> {
    let attrs = Attributes::of(resource);
    let key = ApiKeyAttachmentKey {
        api_key_id: attrs.required_str("api_key_id")?.to_string(),
        usage_plan_id: attrs.required_str("usage_plan_id")?.to_string(),
    };
    let k = &key;

    let plan = retry("DescribeUsagePlan", ctx.read_policy, move || {
        ctx.apigateway.describe_usage_plan(&k.usage_plan_id)
    })
    .await
    .map_err(fail(&resource.id))?;
    if plan.is_none() {
        return Err(attrs.error(format!("usage plan {} is not exist", key.usage_plan_id)));
    }

    let api_key = retry("DescribeApiKeysStatus", ctx.read_policy, move || {
        ctx.apigateway.describe_api_key(&k.api_key_id)
    })
    .await
    .map_err(fail(&resource.id))?;
    if api_key.is_none() {
        return Err(attrs.error(format!("api key {} is not exist", key.api_key_id)));
    }

    retry("BindSecretIds", ctx.write_policy, move || {
        ctx.apigateway.bind_secret_id(&k.usage_plan_id, &k.api_key_id)
    })
    .await
    .map_err(fail(&resource.id))?;

    let what = format!("api key {} bound to {}", key.api_key_id, key.usage_plan_id);
    poll_until(&what, ctx.read_policy, move || async move {
        match is_bound(ctx, k).await? {
            Some(true) => Ok(Some(())),
            Some(false) => Ok(None),
            None => Err(ApiError::Operation(format!(
                "usage plan {} has been deleted",
                k.usage_plan_id
            ))),
        }
    })
    .await
    .map_err(fail(&resource.id))?;

    read(ctx, &resource.id, &key.to_id()?).await
}

pub async fn read(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
    let key = match ApiKeyAttachmentKey::parse_id(identifier) {
        Ok(key) => key,
        Err(e) => {
            log::warn!("{id}: {e}");
            return Ok(State::not_found(id.clone()));
        }
    };

    let k = &key;
    let bound = retry("DescribeUsagePlanSecretIds", ctx.read_policy, move || is_bound(ctx, k))
        .await
        .map_err(fail(id))?;
    if bound != Some(true) {
        return Ok(State::not_found(id.clone()));
    }

    Ok(Outputs::new()
        .set("api_key_id", key.api_key_id.as_str())
        .set("usage_plan_id", key.usage_plan_id.as_str())
        .into_state(id, identifier))
}

pub async fn delete(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
    let Ok(key) = ApiKeyAttachmentKey::parse_id(identifier) else {
        return Ok(());
    };
    let k = &key;

    let result = retry("UnBindSecretIds", ctx.write_policy, move || {
        ctx.apigateway.unbind_secret_id(&k.usage_plan_id, &k.api_key_id)
    })
    .await;
    gone_is_ok("UnBindSecretIds", result).map_err(fail(id))?;

    let what = format!("api key {} unbound from {}", key.api_key_id, key.usage_plan_id);
    poll_until(&what, ctx.read_policy, move || async move {
        Ok::<_, ApiError>(match is_bound(ctx, k).await? {
            Some(true) => None,
            _ => Some(()),
        })
    })
    .await
    .map_err(fail(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockTransport, context, not_found, resource, s};
    use serde_json::json;
    use std::sync::Mutex;

    fn desired() -> Resource {
        resource(
            TYPE,
            &[("api_key_id", s("AKID1")), ("usage_plan_id", s("usagePlan-1"))],
        )
    }

    #[tokio::test]
    async fn bind_and_unbind() {
        let bound = Mutex::new(false);
        let mock = MockTransport::new(move |action, _| {
            let mut bound = bound.lock().unwrap();
            match action {
                "DescribeUsagePlan" => Ok(json!({"Result": {"UsagePlanId": "usagePlan-1"}})),
                "DescribeApiKeysStatus" => {
                    Ok(json!({"Result": {"ApiKeySet": [{"AccessKeyId": "AKID1", "Status": 1}]}}))
                }
                "BindSecretIds" => {
                    *bound = true;
                    Ok(json!({"Result": true}))
                }
                "UnBindSecretIds" => {
                    *bound = false;
                    Ok(json!({"Result": true}))
                }
                "DescribeUsagePlanSecretIds" => {
                    let list: Vec<_> = bound
                        .then(|| json!({"AccessKeyId": "AKID1"}))
                        .into_iter()
                        .collect();
                    Ok(json!({"Result": {"AccessKeyList": list}}))
                }
                other => panic!("unexpected action {other}"),
            }
        });
        let ctx = context(&mock);

        let state = create(&ctx, &desired()).await.unwrap();
        let identifier = state.identifier.unwrap();
        assert_eq!(identifier, r#"{"api_key_id":"AKID1","usage_plan_id":"usagePlan-1"}"#);

        delete(&ctx, &state.id, &identifier).await.unwrap();
        assert!(!read(&ctx, &state.id, &identifier).await.unwrap().exists);
    }

    #[tokio::test]
    async fn missing_plan_fails_create() {
        let mock = MockTransport::new(|_, _| Err(not_found("ResourceNotFound.InvalidUsagePlan")));
        let ctx = context(&mock);

        let err = create(&ctx, &desired()).await.unwrap_err();
        assert!(err.to_string().ends_with("usage plan usagePlan-1 is not exist"));
        assert_eq!(mock.actions(), vec!["DescribeUsagePlan".to_string()]);
    }

    #[tokio::test]
    async fn plan_deleted_while_binding() {
        let mock = MockTransport::new(|action, _| match action {
            "DescribeUsagePlan" => Ok(json!({"Result": {"UsagePlanId": "usagePlan-1"}})),
            "DescribeApiKeysStatus" => Ok(json!({"Result": {"ApiKeySet": [{"AccessKeyId": "AKID1"}]}})),
            "BindSecretIds" => Ok(json!({"Result": true})),
            _ => Err(not_found("ResourceNotFound.InvalidUsagePlan")),
        });
        let ctx = context(&mock);

        let err = create(&ctx, &desired()).await.unwrap_err();
        assert!(err.to_string().ends_with("usage plan usagePlan-1 has been deleted"));
    }

    #[tokio::test]
    async fn invalid_ids_read_as_not_found() {
        let mock = MockTransport::new(|_, _| panic!("no call expected"));
        let ctx = context(&mock);
        let id = ResourceId::new(TYPE, "test");

        assert!(!read(&ctx, &id, "not json").await.unwrap().exists);
        assert!(!read(&ctx, &id, r#"{"api_key_id":"","usage_plan_id":"p"}"#)
            .await
            .unwrap()
            .exists);
    }
}
