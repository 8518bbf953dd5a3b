//! tencentcloud_api_gateway_usage_plan_environments

use tcgate_core::poll::retry;
use tcgate_core::provider::ProviderResult;
use tcgate_core::resource::{Resource, State, Value};
use tcgate_core::schema::{AttributeSchema, ResourceSchema, types};

use super::{finish, result_output_file};
use crate::resources::usage_plan::{environment_fields, environment_value};
use crate::resources::{Attributes, Context, fail};
use crate::services::apigateway::{BIND_TYPE_SERVICE, BIND_TYPES};

pub const TYPE: &str = "tencentcloud_api_gateway_usage_plan_environments";

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(TYPE)
        .with_description("Services or apis a usage plan is bound to")
        .attribute(AttributeSchema::new("usage_plan_id", types::non_empty_string()).required())
        .attribute(
            AttributeSchema::new("bind_type", types::string_enum(&BIND_TYPES))
                .with_default(Value::String(BIND_TYPE_SERVICE.to_string())),
        )
        .attribute(result_output_file())
        .attribute(AttributeSchema::new("list", types::block_list(environment_fields())).computed())
        .data_source()
}

pub async fn read(ctx: &Context, resource: &Resource) -> ProviderResult<State> {
    let attrs = Attributes::of(resource);
    let plan_id = attrs.required_str("usage_plan_id")?;
    let bind_type = attrs.str_or("bind_type", BIND_TYPE_SERVICE);

    let envs = retry("DescribeUsagePlanEnvironments", ctx.read_policy, move || {
        ctx.apigateway
            .describe_usage_plan_environments(plan_id, bind_type)
    })
    .await
    .map_err(fail(&resource.id))?;

    let ids: Vec<String> = envs
        .iter()
        .map(|e| {
            format!(
                "{}-{}-{}",
                e.service_id.as_deref().unwrap_or_default(),
                e.api_id.as_deref().unwrap_or_default(),
                e.environment.as_deref().unwrap_or_default()
            )
        })
        .collect();
    let items = envs.into_iter().map(environment_value).collect();
    finish(resource, "list", items, &ids).await
}
