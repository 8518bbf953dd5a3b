//! tencentcloud_api_gateway_api_keys

use tcgate_core::poll::retry;
use tcgate_core::provider::ProviderResult;
use tcgate_core::resource::{Resource, State, Value};
use tcgate_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{finish, result_output_file};
use crate::resources::api_key::status_label;
use crate::resources::{Attributes, Context, Outputs, fail};
use crate::services::apigateway::ApiKey;

pub const TYPE: &str = "tencentcloud_api_gateway_api_keys";

pub fn schema() -> ResourceSchema {
    let item = [
        "api_key_id",
        "access_key_id",
        "secret_name",
        "status",
        "access_key_secret",
        "modify_time",
        "create_time",
    ]
    .into_iter()
    .map(|name| AttributeSchema::new(name, AttributeType::String))
    .collect();

    ResourceSchema::new(TYPE)
        .with_description("API keys filtered by name or id")
        .attribute(AttributeSchema::new("secret_name", AttributeType::String))
        .attribute(AttributeSchema::new("access_key_id", AttributeType::String))
        .attribute(result_output_file())
        .attribute(AttributeSchema::new("list", types::block_list(item)).computed())
        .data_source()
}

fn item(key: ApiKey) -> Value {
    Value::Map(
        Outputs::new()
            .set("status", status_label(key.status))
            .set("api_key_id", key.access_key_id.clone())
            .set("access_key_id", key.access_key_id)
            .set("secret_name", key.secret_name)
            .set("access_key_secret", key.access_key_secret)
            .set("modify_time", key.modified_time)
            .set("create_time", key.created_time)
            .into_map(),
    )
}

pub async fn read(ctx: &Context, resource: &Resource) -> ProviderResult<State> {
    let attrs = Attributes::of(resource);
    let secret_name = attrs.str_or("secret_name", "");
    let key_id = attrs.str_or("access_key_id", "");

    let keys = retry("DescribeApiKeysStatus", ctx.read_policy, move || {
        ctx.apigateway.describe_api_keys_status(secret_name, key_id)
    })
    .await
    .map_err(fail(&resource.id))?;

    let ids: Vec<String> = keys.iter().filter_map(|k| k.access_key_id.clone()).collect();
    let items = keys.into_iter().map(item).collect();
    finish(resource, "list", items, &ids).await
}
