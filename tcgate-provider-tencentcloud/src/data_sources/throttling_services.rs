//! tencentcloud_api_gateway_throttling_services

use tcgate_core::poll::retry;
use tcgate_core::provider::ProviderResult;
use tcgate_core::resource::{Resource, State, Value};
use tcgate_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{finish, result_output_file, service_ids};
use crate::resources::throttling_service::{environment_fields, environment_value};
use crate::resources::{Attributes, Context, Outputs, fail};

pub const TYPE: &str = "tencentcloud_api_gateway_throttling_services";

pub fn schema() -> ResourceSchema {
    let item = vec![
        AttributeSchema::new("service_id", AttributeType::String),
        AttributeSchema::new("environments", types::block_list(environment_fields())),
    ];

    ResourceSchema::new(TYPE)
        .with_description("Service throttling per environment; every service when no id is given")
        .attribute(AttributeSchema::new("service_id", AttributeType::String))
        .attribute(result_output_file())
        .attribute(AttributeSchema::new("list", types::block_list(item)).computed())
        .data_source()
}

pub async fn read(ctx: &Context, resource: &Resource) -> ProviderResult<State> {
    let attrs = Attributes::of(resource);
    let ids = service_ids(ctx, resource, attrs.str("service_id")).await?;

    let mut items = Vec::new();
    for service_id in &ids {
        let sid = service_id.as_str();
        let envs = retry("DescribeServiceEnvironmentStrategy", ctx.read_policy, move || {
            ctx.apigateway.describe_service_environment_strategies(sid)
        })
        .await
        .map_err(fail(&resource.id))?;
        let envs: Vec<Value> = envs.into_iter().map(environment_value).collect();
        items.push(Value::Map(
            Outputs::new()
                .set("service_id", sid)
                .set("environments", envs)
                .into_map(),
        ));
    }

    finish(resource, "list", items, &ids).await
}
