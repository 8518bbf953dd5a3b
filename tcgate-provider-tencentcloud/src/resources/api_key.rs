//! tencentcloud_api_gateway_api_key

use tcgate_core::poll::{poll_until, retry};
use tcgate_core::provider::ProviderResult;
use tcgate_core::resource::{Resource, ResourceId, State, Value};
use tcgate_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{Attributes, Context, Outputs, fail};
use crate::services::apigateway::{ApiKey, KEY_STATUS_OFF, KEY_STATUS_ON};

pub const TYPE: &str = "tencentcloud_api_gateway_api_key";

pub const STATUS_ON: &str = "on";
pub const STATUS_OFF: &str = "off";

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(TYPE)
        .with_description("API key pair for apis using SECRET authentication")
        .attribute(
            AttributeSchema::new("secret_name", types::non_empty_string())
                .required()
                .force_new()
                .with_provider_name("SecretName")
                .with_description("Custom key name."),
        )
        .attribute(
            AttributeSchema::new("status", types::string_enum(&[STATUS_ON, STATUS_OFF]))
                .with_default(Value::String(STATUS_ON.to_string()))
                .with_description("Key status."),
        )
        .attribute(AttributeSchema::new("access_key_id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("access_key_secret", AttributeType::String).computed())
        .attribute(AttributeSchema::new("modify_time", AttributeType::String).computed())
        .attribute(AttributeSchema::new("create_time", AttributeType::String).computed())
        .importable()
}

pub(crate) fn status_label(status: Option<i64>) -> Option<&'static str> {
    match status? {
        KEY_STATUS_ON => Some(STATUS_ON),
        KEY_STATUS_OFF => Some(STATUS_OFF),
        _ => None,
    }
}

fn outputs(key: ApiKey) -> Outputs {
    Outputs::new()
        .set("secret_name", key.secret_name)
        .set("status", status_label(key.status))
        .set("access_key_id", key.access_key_id)
        .set("access_key_secret", key.access_key_secret)
        .set("modify_time", key.modified_time)
        .set("create_time", key.created_time)
}

async fn describe(ctx: &Context, id: &ResourceId, key_id: &str) -> ProviderResult<Option<ApiKey>> {
    retry("DescribeApiKeysStatus", ctx.read_policy, move || {
        ctx.apigateway.describe_api_key(key_id)
    })
    .await
    .map_err(fail(id))
}

pub async fn create(ctx: &Context, resource: &Resource) -> ProviderResult<State> {
    let attrs = Attributes::of(resource);
    let secret_name = attrs.required_str("secret_name")?;
    let status = attrs.str_or("status", STATUS_ON);

    let key_id = retry("CreateApiKey", ctx.write_policy, move || {
        ctx.apigateway.create_api_key(secret_name)
    })
    .await
    .map_err(fail(&resource.id))?;
    let key_id = key_id.as_str();

    poll_until(&format!("api key {key_id}"), ctx.read_policy, move || {
        ctx.apigateway.describe_api_key(key_id)
    })
    .await
    .map_err(fail(&resource.id))?;

    if status == STATUS_OFF {
        retry("DisableApiKey", ctx.write_policy, move || {
            ctx.apigateway.disable_api_key(key_id)
        })
        .await
        .map_err(fail(&resource.id))?;
    }

    let state = read(ctx, &resource.id, key_id).await?;
    if state.exists {
        Ok(state)
    } else {
        Err(attrs.error(format!("api key {key_id} disappeared after create")))
    }
}

pub async fn read(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<State> {
    match describe(ctx, id, identifier).await? {
        Some(key) => Ok(outputs(key).into_state(id, identifier)),
        None => Ok(State::not_found(id.clone())),
    }
}

pub async fn update(
    ctx: &Context,
    id: &ResourceId,
    identifier: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let desired = Attributes::of(to).str_or("status", STATUS_ON);
    let current = Attributes::new(id, &from.attributes).str("status");

    if current != Some(desired) {
        if desired == STATUS_ON {
            retry("EnableApiKey", ctx.write_policy, move || {
                ctx.apigateway.enable_api_key(identifier)
            })
            .await
            .map_err(fail(id))?;
        } else {
            retry("DisableApiKey", ctx.write_policy, move || {
                ctx.apigateway.disable_api_key(identifier)
            })
            .await
            .map_err(fail(id))?;
        }
    }

    read(ctx, id, identifier).await
}

/// Keys must be disabled before they can be deleted
pub async fn delete(ctx: &Context, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
    let Some(key) = describe(ctx, id, identifier).await? else {
        return Ok(());
    };

    if key.status == Some(KEY_STATUS_ON) {
        retry("DisableApiKey", ctx.write_policy, move || {
            ctx.apigateway.disable_api_key(identifier)
        })
        .await
        .map_err(fail(id))?;
    }

    retry("DeleteApiKey", ctx.write_policy, move || {
        ctx.apigateway.delete_api_key(identifier)
    })
    .await
    .map_err(fail(id))
}
